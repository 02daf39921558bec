//! Implements the `Store` trait against a PostgREST endpoint, e.g. a hosted Postgres project.

use crate::api::{Filter, Query, Store, Table};
use crate::Result;
use anyhow::{bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

const REST_PATH: &str = "rest/v1/";

/// Talks HTTP/JSON to `{store_url}/rest/v1/{table}`.
///
/// Every request carries the project's API key. When a user is signed in their id token is sent as
/// the bearer so that row-level security applies to them, otherwise the API key is the bearer.
pub(crate) struct RestStore {
    client: Client,
    base: Url,
}

impl RestStore {
    pub(crate) fn new(store_url: &Url, api_key: &str, bearer: Option<&str>) -> Result<Self> {
        let base = rest_base(store_url)?;
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).context("The store API key is not valid")?;
        key.set_sensitive(true);
        headers.insert("apikey", key);
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", bearer.unwrap_or(api_key)))
            .context("The bearer token is not valid")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self { client, base })
    }

    fn table_url(&self, table: Table) -> Result<Url> {
        self.base
            .join(&table.to_string())
            .with_context(|| format!("Unable to build the URL for table '{table}'"))
    }
}

#[async_trait::async_trait]
impl Store for RestStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        let url = self.table_url(table)?;
        let params = select_params(query);
        debug!("GET {table}");
        trace!("{params:?}");
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("Failed to fetch rows from '{table}'"))?;
        rows(table, response).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value> {
        let url = self.table_url(table)?;
        debug!("POST {table}");
        let request = self.client.post(url).json(&Value::Array(vec![row]));
        let response = returning(request)
            .send()
            .await
            .with_context(|| format!("Failed to insert a row into '{table}'"))?;
        let inserted = rows(table, response).await?;
        match inserted.into_iter().next() {
            Some(row) => Ok(row),
            None => bail!("Inserting into '{table}' returned no row"),
        }
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        let url = self.table_url(table)?;
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        debug!("PATCH {table}");
        trace!("{params:?}");
        let request = self.client.patch(url).query(&params).json(&patch);
        let response = returning(request)
            .send()
            .await
            .with_context(|| format!("Failed to update rows in '{table}'"))?;
        rows(table, response).await
    }
}

/// Asks the server to echo the written rows back.
fn returning(request: RequestBuilder) -> RequestBuilder {
    request.header("Prefer", "return=representation")
}

async fn rows(table: Table, response: Response) -> Result<Vec<Value>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("The data store answered {status} for '{table}': {}", error_message(&body));
    }
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("The response for '{table}' was not JSON"))?;
    match body {
        Value::Array(rows) => Ok(rows),
        other => bail!("Expected a list of rows from '{table}' but got {other}"),
    }
}

/// Pulls `message` out of a PostgREST error body, or returns the body as-is.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn rest_base(store_url: &Url) -> Result<Url> {
    let mut base = store_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(REST_PATH)
        .with_context(|| format!("Unable to build the REST URL from '{store_url}'"))
}

fn select_params(query: &Query) -> Vec<(String, String)> {
    let columns = match query.selected_columns() {
        Some(columns) => columns.join(","),
        None => "*".to_string(),
    };
    let mut params = vec![("select".to_string(), columns)];
    params.extend(query.filters().iter().map(filter_param));
    if !query.orders().is_empty() {
        let order: Vec<String> = query.orders().iter().map(|o| o.to_string()).collect();
        params.push(("order".to_string(), order.join(",")));
    }
    params
}

fn filter_param(filter: &Filter) -> (String, String) {
    let value = match filter.value() {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let op = match filter {
        Filter::Eq(..) => "eq",
        Filter::Is(..) => "is",
    };
    (filter.column().to_string(), format!("{op}.{value}"))
}
