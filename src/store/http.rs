use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use super::{Collection, Filter, Query, Record, RecordStore};

const PAGE_SIZE: u32 = 500;

/// Client for a PocketBase server's records API.
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(rename = "totalPages", default)]
    total_pages: i64,
    #[serde(default)]
    items: Vec<Record>,
}

impl HttpStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(anyhow!("empty PocketBase url"));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn records_url(&self, collection: Collection) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.base_url,
            collection.name()
        )
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header(USER_AGENT, "wc26_pool");
        match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => req.header(AUTHORIZATION, token),
            _ => req,
        }
    }

    fn fetch_page(
        &self,
        collection: Collection,
        query: &Query,
        page: u32,
        per_page: u32,
        skip_total: bool,
    ) -> Result<ListPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
        ];
        if skip_total {
            params.push(("skipTotal", "1".to_string()));
        }
        if let Some(filter) = query.filter.as_ref().filter(|f| !f.is_empty()) {
            params.push(("filter", filter.to_pocketbase()));
        }
        if let Some(sort) = query.sort_param() {
            params.push(("sort", sort));
        }
        if !query.expand.is_empty() {
            params.push(("expand", query.expand.join(",")));
        }

        let url = self.records_url(collection);
        let resp = self
            .authorized(self.client.get(&url))
            .query(&params)
            .send()
            .with_context(|| format!("list {} request failed", collection.name()))?;
        let body = success_body(resp)?;
        serde_json::from_str::<ListPage>(&body)
            .with_context(|| format!("invalid {} list json", collection.name()))
    }
}

impl RecordStore for HttpStore {
    fn list_all(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        let mut page = 1u32;
        loop {
            let batch = self.fetch_page(collection, query, page, PAGE_SIZE, false)?;
            let received = batch.items.len();
            out.extend(batch.items);
            if received == 0 || i64::from(page) >= batch.total_pages {
                break;
            }
            page = page.saturating_add(1);
        }
        debug!("listed {} {} records", out.len(), collection.name());
        Ok(out)
    }

    fn get_first(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>> {
        let query = Query::new().filter(filter.clone());
        let page = self.fetch_page(collection, &query, 1, 1, true)?;
        Ok(page.items.into_iter().next())
    }

    fn create(&self, collection: Collection, data: Record) -> Result<Record> {
        let url = self.records_url(collection);
        let resp = self
            .authorized(self.client.post(&url))
            .json(&data)
            .send()
            .with_context(|| format!("create {} request failed", collection.name()))?;
        let body = success_body(resp)?;
        serde_json::from_str(&body)
            .with_context(|| format!("invalid {} record json", collection.name()))
    }

    fn update(&self, collection: Collection, id: &str, data: Record) -> Result<Record> {
        let url = format!("{}/{id}", self.records_url(collection));
        let resp = self
            .authorized(self.client.patch(&url))
            .json(&data)
            .send()
            .with_context(|| format!("update {} request failed", collection.name()))?;
        let body = success_body(resp)?;
        serde_json::from_str(&body)
            .with_context(|| format!("invalid {} record json", collection.name()))
    }
}

fn success_body(resp: Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {}: {}", status, body));
    }
    Ok(body)
}
