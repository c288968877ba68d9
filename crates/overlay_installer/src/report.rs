//! Reporting an unrecognized game build upstream.

use crate::error::{InstallerError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

const REPORT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReport {
    pub game_name: String,
    pub file_name: String,
    pub hash: String,
    pub time: DateTime<Utc>,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

impl VersionReport {
    pub fn new(game_name: &str, file_name: &str, hash: &str) -> Self {
        Self {
            game_name: game_name.to_string(),
            file_name: file_name.to_string(),
            hash: hash.to_string(),
            time: Utc::now(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "**Version Report for {}**\n:file_folder: File: `{}`\n:lock: SHA256: `{}`\n:clock3: Time: {}",
            self.game_name,
            self.file_name,
            self.hash,
            self.time.format("%Y-%m-%d %H:%M:%SZ")
        )
    }

    /// Webhook body: `{ "content": "<message>" }`.
    pub fn to_json(&self) -> Result<String> {
        let message = self.message();
        Ok(serde_json::to_string(&WebhookPayload { content: &message })?)
    }

    /// POST the report to `webhook`.
    pub fn send(&self, client: &reqwest::blocking::Client, webhook: &str) -> Result<()> {
        let body = self.to_json()?;
        let response = client
            .post(webhook)
            .timeout(REPORT_TIMEOUT)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| InstallerError::network(webhook, e))?;

        if !response.status().is_success() {
            return Err(InstallerError::network(
                webhook,
                format!("HTTP {}", response.status()),
            ));
        }
        info!("Reported unknown version {} of {}", self.hash, self.game_name);
        Ok(())
    }
}
