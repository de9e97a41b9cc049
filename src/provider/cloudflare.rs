// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloudflare API v4 adapter.
//!
//! Authenticates with an API token (`token` in the auth bundle). Zone ids are looked up
//! by name once per adapter and cached. Records are listed with pagination and written
//! one by one; Cloudflare has no resolution lines.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::capabilities::{BackendKind, Capabilities};
use crate::constants::{CLOUDFLARE_API_BASE, CLOUDFLARE_PAGE_SIZE, PROVIDER_HTTP_TIMEOUT_SECS};
use crate::errors::ProviderError;
use crate::records::{ActualRecord, Operation, RecordKey, RecordType};

use super::retry::{is_retryable_http_status, retry_provider_call, RetryPolicy};
use super::{record_changes, ProviderAdapter, RecordChange};

const PROVIDER: &str = "cloudflare";

/// Cloudflare response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    ttl: u32,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
    comment: &'a str,
}

/// Adapter for one Cloudflare account.
pub struct CloudflareAdapter {
    client: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    zone_ids: Mutex<HashMap<String, String>>,
}

impl CloudflareAdapter {
    /// Creates an adapter against the public Cloudflare API.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Rejected`] if the HTTP client cannot be built.
    pub fn new(token: &str, retry: RetryPolicy) -> Result<Self, ProviderError> {
        Self::with_base_url(CLOUDFLARE_API_BASE, token, retry)
    }

    /// Creates an adapter against another API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Rejected`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, token: &str, retry: RetryPolicy) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Rejected {
                provider: PROVIDER.to_string(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry,
            zone_ids: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url)).map_err(|e| ProviderError::Rejected {
            provider: PROVIDER.to_string(),
            reason: format!("invalid API URL: {e}"),
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&RecordBody<'_>>,
    ) -> Result<Envelope<T>, ProviderError> {
        let operation_name = format!("{method} {}", url.path());
        retry_provider_call(
            &self.retry,
            || {
                let mut request = self
                    .client
                    .request(method.clone(), url.clone())
                    .bearer_auth(&self.token);
                if let Some(body) = body {
                    request = request.json(body);
                }
                async move { send(request).await }
            },
            &operation_name,
        )
        .await
    }

    async fn zone_id(&self, domain: &str) -> Result<String, ProviderError> {
        let mut cache = self.zone_ids.lock().await;
        if let Some(id) = cache.get(domain) {
            return Ok(id.clone());
        }

        let url = self.url("/zones", &[("name", domain.to_string())])?;
        let envelope: Envelope<Vec<Zone>> = self.call(Method::GET, url, None).await?;
        let zone = envelope
            .result
            .and_then(|zones| zones.into_iter().next())
            .ok_or_else(|| ProviderError::Rejected {
                provider: PROVIDER.to_string(),
                reason: format!("zone {domain} not found in this account"),
            })?;

        debug!(domain, zone_id = %zone.id, "Resolved Cloudflare zone");
        cache.insert(domain.to_string(), zone.id.clone());
        Ok(zone.id)
    }

    async fn write_record(
        &self,
        zone_id: &str,
        record_id: Option<&str>,
        key: &RecordKey,
        value: &str,
        ttl: u32,
        comment: &str,
    ) -> Result<(), ProviderError> {
        let content = if key.record_type == RecordType::CNAME {
            value.trim_end_matches('.')
        } else {
            value
        };
        let body = RecordBody {
            record_type: key.record_type.as_str(),
            name: &key.fqdn,
            content,
            ttl,
            proxied: false,
            comment,
        };

        let (method, url) = match record_id {
            Some(id) => (Method::PUT, self.url(&format!("/zones/{zone_id}/dns_records/{id}"), &[])?),
            None => (Method::POST, self.url(&format!("/zones/{zone_id}/dns_records"), &[])?),
        };
        let _: Envelope<serde_json::Value> = self.call(method, url, Some(&body)).await?;
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), ProviderError> {
        let url = self.url(&format!("/zones/{zone_id}/dns_records/{record_id}"), &[])?;
        let _: Envelope<serde_json::Value> = self.call(Method::DELETE, url, None).await?;
        Ok(())
    }
}

async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<Envelope<T>, ProviderError> {
    let response = request.send().await.map_err(|e| ProviderError::Transient {
        provider: PROVIDER.to_string(),
        reason: format!("request failed: {e}"),
    })?;

    let status = response.status();
    let text = response.text().await.map_err(|e| ProviderError::Transient {
        provider: PROVIDER.to_string(),
        reason: format!("cannot read response: {e}"),
    })?;

    let envelope: Option<Envelope<T>> = serde_json::from_str(&text).ok();
    let messages = envelope
        .as_ref()
        .map(|envelope| {
            envelope
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .filter(|messages| !messages.is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"));

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::Authentication {
            provider: PROVIDER.to_string(),
            reason: messages,
        });
    }
    if is_retryable_http_status(status) {
        return Err(ProviderError::Transient {
            provider: PROVIDER.to_string(),
            reason: messages,
        });
    }

    match envelope {
        Some(envelope) if status.is_success() && envelope.success => Ok(envelope),
        _ => Err(ProviderError::Rejected {
            provider: PROVIDER.to_string(),
            reason: messages,
        }),
    }
}

#[async_trait]
impl ProviderAdapter for CloudflareAdapter {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        BackendKind::Cloudflare.capabilities()
    }

    async fn fetch_actual_records(&self, domain: &str) -> Result<Vec<ActualRecord>, ProviderError> {
        let zone_id = self.zone_id(domain).await?;
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let url = self.url(
                &format!("/zones/{zone_id}/dns_records"),
                &[
                    ("page", page.to_string()),
                    ("per_page", CLOUDFLARE_PAGE_SIZE.to_string()),
                ],
            )?;
            let envelope: Envelope<Vec<DnsRecord>> = self.call(Method::GET, url, None).await?;
            let total_pages = envelope.result_info.as_ref().map_or(1, |info| info.total_pages);

            for record in envelope.result.unwrap_or_default() {
                let Ok(record_type) = record.record_type.parse::<RecordType>() else {
                    continue;
                };
                records.push(ActualRecord::new(
                    record.id,
                    &record.name,
                    record_type,
                    &record.content,
                    record.ttl,
                    None,
                    record.comment.filter(|c| !c.is_empty()),
                ));
            }

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        debug!(domain, count = records.len(), "Fetched Cloudflare records");
        Ok(records)
    }

    async fn apply_operation(&self, domain: &str, operation: &Operation) -> Result<(), ProviderError> {
        let zone_id = self.zone_id(domain).await?;
        let (ttl, comment) = match operation {
            Operation::Create { record, comment } | Operation::Update { record, comment, .. } => {
                (record.ttl, comment.as_str())
            }
            Operation::Delete { .. } => (0, ""),
        };

        for change in record_changes(operation) {
            match change {
                RecordChange::Add { value } => {
                    self.write_record(&zone_id, None, operation.key(), value, ttl, comment)
                        .await?;
                }
                RecordChange::Modify { record, value } => {
                    self.write_record(&zone_id, Some(&record.id), operation.key(), value, ttl, comment)
                        .await?;
                }
                RecordChange::Remove { record } => {
                    self.delete_record(&zone_id, &record.id).await?;
                }
            }
        }

        info!(domain, operation = %operation, "Applied Cloudflare operation");
        Ok(())
    }
}

#[cfg(test)]
#[path = "cloudflare_tests.rs"]
mod cloudflare_tests;
