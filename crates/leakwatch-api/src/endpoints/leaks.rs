// Leak endpoints
//
// Listing, the investigating and history views, and resolution.

use serde_json::json;
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{Ack, LeakQuery, LeakRecord, Page};

impl ApiClient {
    /// List leaks matching the query.
    ///
    /// `GET leaks/?status=...&province=...&district=...&page=N`
    pub async fn list_leaks(&self, query: &LeakQuery) -> Result<Page<LeakRecord>, Error> {
        debug!(?query, "listing leaks");
        self.get_with_query("leaks/", query).await
    }

    /// Leaks currently under investigation.
    ///
    /// `GET leaks/investigating/`
    pub async fn investigating_leaks(&self, page: Option<u32>) -> Result<Page<LeakRecord>, Error> {
        debug!(?page, "listing leaks under investigation");
        self.get_paged("leaks/investigating/", page).await
    }

    /// Resolved and historical leaks.
    ///
    /// `GET leaks/history/`
    pub async fn leak_history(&self, page: Option<u32>) -> Result<Page<LeakRecord>, Error> {
        debug!(?page, "listing leak history");
        self.get_paged("leaks/history/", page).await
    }

    /// Mark a leak as resolved.
    ///
    /// `POST leaks/{id}/resolve/` with an optional note.
    pub async fn resolve_leak(&self, leak_id: &str, note: Option<&str>) -> Result<Ack, Error> {
        let url = self.resource_url("leak_id", "leaks/", leak_id, "resolve")?;
        info!(leak_id = leak_id.trim(), "resolving leak");
        let body = match note {
            Some(note) => json!({ "note": note }),
            None => json!({}),
        };
        self.post_url(url, &body).await
    }

    async fn get_paged(&self, path: &str, page: Option<u32>) -> Result<Page<LeakRecord>, Error> {
        match page {
            Some(page) => self.get_with_query(path, &json!({ "page": page })).await,
            None => self.get(path).await,
        }
    }
}
