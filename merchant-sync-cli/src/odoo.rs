//! Odoo product source over JSON-RPC (`POST <url>/jsonrpc`).

use std::collections::HashMap;
use std::time::Duration;

use merchant_sync_core::{OdooSettings, SourceId, SourceRecord};
use merchant_sync_engine::{FilterCriteria, RecordSource, Sleeper, SourceError, ThreadSleeper};
use serde_json::{json, Value};

use crate::images::ImageResolver;

const MODEL: &str = "product.template";
const IMAGE_FIELD: &str = "image_1920";
const FIELDS: &[&str] = &[
    "id",
    "name",
    "website_description",
    "compare_list_price",
    "list_price",
    "default_code",
    "active",
    "barcode",
    "website_url",
    "weight",
    "public_categ_ids",
    "website_published",
];
const TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// 1. RPC client
// ---------------------------------------------------------------------------

/// An authenticated JSON-RPC session.
pub struct OdooClient {
    agent: ureq::Agent,
    endpoint: String,
    database: String,
    uid: i64,
    secret: String,
    next_id: u64,
}

impl OdooClient {
    /// Authenticate against `common.authenticate`. A `false` uid means the
    /// credentials were refused.
    pub fn connect(settings: &OdooSettings) -> Result<Self, SourceError> {
        let mut client = Self {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            endpoint: format!("{}/jsonrpc", settings.url.trim_end_matches('/')),
            database: settings.database.clone(),
            uid: 0,
            secret: settings.secret.clone(),
            next_id: 0,
        };
        let uid = client.call(
            "common",
            "authenticate",
            json!([settings.database, settings.username, settings.secret, {}]),
        )?;
        client.uid = uid.as_i64().ok_or_else(|| {
            SourceError::Auth(format!(
                "Odoo refused user '{}' on database '{}'",
                settings.username, settings.database
            ))
        })?;
        tracing::info!("connected to Odoo at {} as uid {}", settings.url, client.uid);
        Ok(client)
    }

    /// `object.execute_kw(db, uid, secret, model, method, args, kwargs)`.
    pub fn execute_kw(
        &mut self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, SourceError> {
        let params = json!([self.database, self.uid, self.secret, model, method, args, kwargs]);
        self.call("object", "execute_kw", params)
    }

    fn call(&mut self, service: &str, method: &str, args: Value) -> Result<Value, SourceError> {
        self.next_id += 1;
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": self.next_id,
        });
        let response: Value = self
            .agent
            .post(&self.endpoint)
            .send_json(body)
            .map_err(|e| SourceError::Transport(e.to_string()))?
            .into_json()
            .map_err(|e| SourceError::Protocol(format!("invalid JSON-RPC body: {e}")))?;

        if let Some(err) = response.get("error") {
            let message = err
                .pointer("/data/message")
                .or_else(|| err.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(SourceError::Protocol(format!("{service}.{method}: {message}")));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| SourceError::Protocol(format!("{service}.{method}: no result")))
    }
}

// ---------------------------------------------------------------------------
// 2. Record source
// ---------------------------------------------------------------------------

pub struct OdooSource {
    client: OdooClient,
    batch_size: usize,
    batch_pause: Duration,
    images: Box<dyn ImageResolver>,
    sleeper: Box<dyn Sleeper>,
}

impl OdooSource {
    pub fn connect(
        settings: &OdooSettings,
        images: Box<dyn ImageResolver>,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: OdooClient::connect(settings)?,
            batch_size: settings.batch_size.max(1),
            batch_pause: settings.batch_pause,
            images,
            sleeper: Box::new(ThreadSleeper),
        })
    }

    fn to_record(&mut self, raw: &Value) -> Result<SourceRecord, SourceError> {
        let id = raw
            .get("id")
            .and_then(Value::as_u64)
            .map(SourceId)
            .ok_or_else(|| SourceError::Protocol(format!("record without id: {raw}")))?;

        let blob = text(raw, IMAGE_FIELD);
        let image_link = if self.images.needs_blob() && blob.is_none() {
            None
        } else {
            match self.images.resolve(id, blob.as_deref()) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("product {id}: image not usable: {e}");
                    None
                }
            }
        };

        Ok(SourceRecord {
            id,
            name: text(raw, "name"),
            description: text(raw, "website_description"),
            image_link,
            list_price: number(raw, "list_price"),
            compare_price: number(raw, "compare_list_price"),
            website_url: text(raw, "website_url"),
            published: raw
                .get("website_published")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            barcode: text(raw, "barcode"),
            default_code: text(raw, "default_code"),
            weight: number(raw, "weight"),
            public_category_ids: raw
                .get("public_categ_ids")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
                .unwrap_or_default(),
        })
    }
}

impl RecordSource for OdooSource {
    fn fetch_all(&mut self, criteria: &FilterCriteria) -> Result<Vec<SourceRecord>, SourceError> {
        let ids: Vec<u64> = serde_json::from_value(self.client.execute_kw(
            MODEL,
            "search",
            json!([domain(criteria)]),
            json!({ "order": "id asc" }),
        )?)
        .map_err(|e| SourceError::Protocol(format!("search returned non-ids: {e}")))?;
        tracing::info!("{} products match the feed filter", ids.len());

        let mut fields: Vec<&str> = FIELDS.to_vec();
        if self.images.needs_blob() {
            fields.push(IMAGE_FIELD);
        }

        let mut records = Vec::with_capacity(ids.len());
        for (n, chunk) in ids.chunks(self.batch_size).enumerate() {
            if n > 0 && !self.batch_pause.is_zero() {
                self.sleeper.sleep(self.batch_pause);
            }
            let rows = self.client.execute_kw(
                MODEL,
                "read",
                json!([chunk]),
                json!({ "fields": fields }),
            )?;
            let rows = rows
                .as_array()
                .ok_or_else(|| SourceError::Protocol("read did not return a list".into()))?;

            // `read` does not promise the requested order.
            let mut by_id: HashMap<u64, &Value> = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(Value::as_u64).map(|id| (id, row)))
                .collect();
            for id in chunk {
                match by_id.remove(id) {
                    Some(row) => records.push(self.to_record(row)?),
                    None => tracing::warn!("product {id} vanished between search and read"),
                }
            }
            tracing::debug!("read batch {} ({} products)", n + 1, chunk.len());
        }
        Ok(records)
    }
}

/// Odoo search domain for `criteria`.
pub fn domain(criteria: &FilterCriteria) -> Value {
    let mut terms = Vec::new();
    if criteria.published_only {
        terms.push(json!(["website_published", "=", true]));
    }
    if criteria.require_image {
        terms.push(json!([IMAGE_FIELD, "!=", false]));
    }
    if criteria.require_description {
        terms.push(json!(["website_description", "!=", false]));
    }
    terms.push(json!(["list_price", ">", criteria.min_price]));
    Value::Array(terms)
}

/// Odoo sends `false` for empty fields.
fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn number(raw: &Value, key: &str) -> Option<f64> {
    raw.get(key).and_then(Value::as_f64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
