//! REDCap API client
//!
//! Thin typed wrapper over the REDCap API: every call is a form-encoded
//! POST to the single API endpoint carrying `token`, `content`, `format`
//! and `returnFormat` plus call-specific parameters. The client counts the
//! queries it issues so run records can report them.

use crate::adapters::redcap::models::{
    ArmInfo, EventInfo, ExportFieldName, FieldDefinition, FormEventMapping, ImportAck,
    InstrumentInfo, ProjectInfo, RecordFilter, RepeatingFormEvent,
};
use crate::config::RedcapConfig;
use crate::core::transform::RawRecord;
use crate::domain::{MirrorError, Result};
use reqwest::{Client, ClientBuilder};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Client for one REDCap project API endpoint
///
/// # Example
///
/// ```no_run
/// use capmirror::adapters::redcap::{RecordFilter, RedcapClient};
/// use capmirror::config::{secret_string, RedcapConfig};
///
/// # async fn example() -> capmirror::domain::Result<()> {
/// let config = RedcapConfig {
///     api_url: "https://redcap.example.org/api/".to_string(),
///     api_token: secret_string("0123456789ABCDEF0123456789ABCDEF".to_string()),
///     timeout_seconds: 60,
///     verify_ssl: true,
/// };
/// let client = RedcapClient::new(&config)?;
/// let filter = RecordFilter::new().with_field("study_id");
/// let records = client.export_records(&filter).await?;
/// println!("{} records", records.len());
/// # Ok(())
/// # }
/// ```
pub struct RedcapClient {
    http: Client,
    api_url: String,
    config: RedcapConfig,
    query_count: AtomicU64,
}

impl RedcapClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Configuration`] when the underlying HTTP
    /// client cannot be built.
    pub fn new(config: &RedcapConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));
        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| MirrorError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            config: config.clone(),
            query_count: AtomicU64::new(0),
        })
    }

    /// Number of API calls issued so far
    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }

    /// The configured API endpoint
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Issue one API call and return the HTTP status with the raw body
    async fn post(&self, content: &str, extra: &[(String, String)]) -> Result<(u16, String)> {
        let mut form: Vec<(String, String)> = vec![
            (
                "token".to_string(),
                self.config.api_token.expose_secret().as_str().to_string(),
            ),
            ("content".to_string(), content.to_string()),
            ("format".to_string(), "json".to_string()),
            ("returnFormat".to_string(), "json".to_string()),
        ];
        form.extend_from_slice(extra);

        self.query_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(content, "Querying REDCap API");

        let response = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| MirrorError::SourceFetch {
                // no response received; status 0 marks a transport failure
                status: 0,
                body: format!("request failed: {e}"),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| MirrorError::SourceFetch {
            status,
            body: format!("failed to read response body: {e}"),
        })?;
        Ok((status, body))
    }

    /// Issue one API call, requiring a 2xx JSON response
    async fn request(&self, content: &str, extra: &[(String, String)]) -> Result<Value> {
        let (status, body) = self.post(content, extra).await?;
        if !(200..300).contains(&status) {
            return Err(MirrorError::SourceFetch { status, body });
        }
        serde_json::from_str(&body).map_err(|e| {
            MirrorError::Serialization(format!("invalid JSON from REDCap ({content}): {e}"))
        })
    }

    fn parse_list<T: serde::de::DeserializeOwned>(content: &str, value: Value) -> Result<Vec<T>> {
        serde_json::from_value(value).map_err(|e| {
            MirrorError::Serialization(format!("unexpected {content} response shape: {e}"))
        })
    }

    /// Export records matching a filter (`content=record`)
    pub async fn export_records(&self, filter: &RecordFilter) -> Result<Vec<RawRecord>> {
        let value = self.request("record", &filter.to_params()).await?;
        let entries = value.as_array().ok_or_else(|| {
            MirrorError::Serialization("expected a JSON array of records".to_string())
        })?;
        entries.iter().map(RawRecord::from_json).collect()
    }

    /// Export project title and the longitudinal flag (`content=project`)
    pub async fn export_project_info(&self) -> Result<ProjectInfo> {
        let value = self.request("project", &[]).await?;
        serde_json::from_value(value).map_err(|e| {
            MirrorError::Serialization(format!("unexpected project response shape: {e}"))
        })
    }

    /// Export field names (`content=exportFieldNames`); the first entry
    /// names the primary-key field
    pub async fn export_field_names(&self) -> Result<Vec<ExportFieldName>> {
        let value = self.request("exportFieldNames", &[]).await?;
        Self::parse_list("exportFieldNames", value)
    }

    /// Export arms (`content=arm`)
    pub async fn export_arms(&self) -> Result<Vec<ArmInfo>> {
        let value = self.request("arm", &[]).await?;
        Self::parse_list("arm", value)
    }

    /// Export instruments (`content=instrument`)
    pub async fn export_instruments(&self) -> Result<Vec<InstrumentInfo>> {
        let value = self.request("instrument", &[]).await?;
        Self::parse_list("instrument", value)
    }

    /// Export events (`content=event`), longitudinal projects only
    pub async fn export_events(&self) -> Result<Vec<EventInfo>> {
        let value = self.request("event", &[]).await?;
        Self::parse_list("event", value)
    }

    /// Export event↔instrument associations (`content=formEventMapping`)
    pub async fn export_form_event_mapping(&self) -> Result<Vec<FormEventMapping>> {
        let value = self.request("formEventMapping", &[]).await?;
        Self::parse_list("formEventMapping", value)
    }

    /// Export repeating-form/event designations
    /// (`content=repeatingFormsEvents`)
    ///
    /// REDCap answers with an error payload when the project does not use
    /// the repeating feature at all; that case is `Ok(None)`.
    pub async fn export_repeating_forms_events(&self) -> Result<Option<Vec<RepeatingFormEvent>>> {
        let (status, body) = self.post("repeatingFormsEvents", &[]).await?;
        if let Ok(value) = serde_json::from_str::<Value>(&body) {
            if value.get("error").is_some() {
                tracing::warn!(
                    status,
                    "REDCap reports the repeating forms/events feature is unused"
                );
                return Ok(None);
            }
            if (200..300).contains(&status) {
                return Self::parse_list("repeatingFormsEvents", value).map(Some);
            }
        }
        Err(MirrorError::SourceFetch { status, body })
    }

    /// Export the full data dictionary (`content=metadata`)
    pub async fn export_metadata(&self) -> Result<Vec<FieldDefinition>> {
        let value = self.request("metadata", &[]).await?;
        Self::parse_list("metadata", value)
    }

    /// Import records (`content=record` with `overwriteBehavior=overwrite`)
    ///
    /// The acknowledgment's `count` is the number of subjects affected, not
    /// the number of records sent; callers decide whether a missing or zero
    /// count is acceptable.
    pub async fn import_records(&self, records: &Value) -> Result<ImportAck> {
        let data = serde_json::to_string(records)?;
        let params = vec![
            ("data".to_string(), data),
            ("overwriteBehavior".to_string(), "overwrite".to_string()),
        ];
        let value = self.request("record", &params).await?;
        serde_json::from_value(value).map_err(|e| {
            MirrorError::Serialization(format!("unexpected import acknowledgment shape: {e}"))
        })
    }
}
