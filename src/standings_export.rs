use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::leaderboard::StandingsRow;

const HEADER: [&str; 5] = ["#", "Name", "Matches", "Top 4", "Total"];

pub fn export_standings(path: &Path, rows: &[StandingsRow]) -> Result<usize> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Standings")?;
        write_standings(sheet, rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(rows.len())
}

fn write_standings(sheet: &mut Worksheet, rows: &[StandingsRow]) -> Result<()> {
    for (col, title) in HEADER.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *title)
            .with_context(|| format!("write header cell {col}"))?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        sheet
            .write_number(r, 0, (idx + 1) as f64)
            .and_then(|s| s.write_string(r, 1, &row.display_name))
            .and_then(|s| s.write_number(r, 2, f64::from(row.match_points)))
            .and_then(|s| s.write_number(r, 3, f64::from(row.top4_points)))
            .and_then(|s| s.write_number(r, 4, f64::from(row.total)))
            .with_context(|| format!("write standings row {r}"))?;
    }
    Ok(())
}
