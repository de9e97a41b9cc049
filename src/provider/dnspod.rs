// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNSPod adapter (Tencent Cloud API 3.0).
//!
//! Every call is a signed JSON `POST /` whose action is named in the `X-TC-Action`
//! header. Requests are signed with TC3-HMAC-SHA256 using `secret_id` and `secret_key`
//! from the auth bundle. DNSPod supports resolution lines; the default line is
//! reported as `默认` and mapped to "no line".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};
use url::{Position, Url};

use crate::capabilities::{BackendKind, Capabilities};
use crate::constants::{
    DNSPOD_API_BASE, DNSPOD_API_VERSION, DNSPOD_DEFAULT_LINE, DNSPOD_PAGE_SIZE, DNSPOD_SERVICE,
    PROVIDER_HTTP_TIMEOUT_SECS,
};
use crate::errors::ProviderError;
use crate::records::{ActualRecord, Operation, RecordKey, RecordType};

use super::retry::{is_retryable_http_status, retry_provider_call, RetryPolicy};
use super::{absolute_name, record_changes, relative_label, ProviderAdapter, RecordChange};

const PROVIDER: &str = "dnspod";

const SIGNING_ALGORITHM: &str = "TC3-HMAC-SHA256";
const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host";

/// Error code returned by `DescribeRecordList` for a zone without records
const NO_RECORDS_CODE: &str = "ResourceNotFound.NoDataOfRecord";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(rename = "RecordCountInfo")]
    count: Option<RecordCountInfo>,
    #[serde(rename = "RecordList", default)]
    records: Vec<DnspodRecord>,
}

#[derive(Debug, Deserialize)]
struct RecordCountInfo {
    #[serde(rename = "TotalCount", default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DnspodRecord {
    record_id: u64,
    name: String,
    #[serde(rename = "Type")]
    record_type: String,
    value: String,
    line: String,
    #[serde(rename = "TTL")]
    ttl: u32,
    #[serde(default)]
    remark: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RecordRequest<'a> {
    domain: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<u64>,
    sub_domain: String,
    record_type: &'a str,
    record_line: &'a str,
    value: &'a str,
    #[serde(rename = "TTL")]
    ttl: u32,
    remark: &'a str,
}

/// Adapter for one DNSPod account.
pub struct DnspodAdapter {
    client: reqwest::Client,
    base_url: Url,
    host: String,
    secret_id: String,
    secret_key: String,
    retry: RetryPolicy,
}

impl DnspodAdapter {
    /// Creates an adapter against the public Tencent Cloud endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Rejected`] if the HTTP client cannot be built.
    pub fn new(secret_id: &str, secret_key: &str, retry: RetryPolicy) -> Result<Self, ProviderError> {
        Self::with_base_url(DNSPOD_API_BASE, secret_id, secret_key, retry)
    }

    /// Creates an adapter against another endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Rejected`] if the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn with_base_url(
        base_url: &str,
        secret_id: &str,
        secret_key: &str,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url).map_err(|e| rejected(format!("invalid API URL: {e}")))?;
        let host = base_url[Position::BeforeHost..Position::AfterPort].to_string();
        if host.is_empty() {
            return Err(rejected(format!("API URL {base_url} has no host")));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| rejected(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            host,
            secret_id: secret_id.to_string(),
            secret_key: secret_key.to_string(),
            retry,
        })
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, payload: &Value) -> Result<T, ProviderError> {
        let body = payload.to_string();
        retry_provider_call(
            &self.retry,
            || {
                let now = Utc::now();
                let request = authorization_header(&self.secret_id, &self.secret_key, &self.host, now, &body)
                    .map(|authorization| {
                        self.client
                            .post(self.base_url.clone())
                            .header("Authorization", authorization)
                            .header("Content-Type", CONTENT_TYPE)
                            .header("X-TC-Action", action)
                            .header("X-TC-Timestamp", now.timestamp().to_string())
                            .header("X-TC-Version", DNSPOD_API_VERSION)
                            .body(body.clone())
                    });
                async move { send(request?).await }
            },
            action,
        )
        .await
    }

    async fn write_record(
        &self,
        domain: &str,
        record_id: Option<&str>,
        key: &RecordKey,
        value: &str,
        ttl: u32,
        remark: &str,
    ) -> Result<(), ProviderError> {
        let record_id = record_id.map(parse_record_id).transpose()?;
        let request = RecordRequest {
            domain,
            record_id,
            sub_domain: relative_label(&key.fqdn, domain),
            record_type: key.record_type.as_str(),
            record_line: key.line().unwrap_or(DNSPOD_DEFAULT_LINE),
            value,
            ttl,
            remark,
        };
        let payload = serde_json::to_value(&request)
            .map_err(|e| rejected(format!("cannot encode request: {e}")))?;

        let action = if record_id.is_some() {
            "ModifyRecord"
        } else {
            "CreateRecord"
        };
        let _: Value = self.call(action, &payload).await?;
        Ok(())
    }

    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<(), ProviderError> {
        let payload = serde_json::json!({
            "Domain": domain,
            "RecordId": parse_record_id(record_id)?,
        });
        let _: Value = self.call("DeleteRecord", &payload).await?;
        Ok(())
    }
}

fn rejected(reason: String) -> ProviderError {
    ProviderError::Rejected {
        provider: PROVIDER.to_string(),
        reason,
    }
}

fn parse_record_id(id: &str) -> Result<u64, ProviderError> {
    id.parse()
        .map_err(|_| rejected(format!("record id '{id}' is not numeric")))
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| ProviderError::Credentials {
        reason: format!("cannot derive the DNSPod signing key: {e}"),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Builds the TC3-HMAC-SHA256 `Authorization` header for a JSON `POST /`.
///
/// # Errors
///
/// Returns [`ProviderError::Credentials`] if a signing key cannot be derived.
pub fn authorization_header(
    secret_id: &str,
    secret_key: &str,
    host: &str,
    now: DateTime<Utc>,
    payload: &str,
) -> Result<String, ProviderError> {
    let date = now.format("%Y-%m-%d").to_string();
    let canonical_request = format!(
        "POST\n/\n\ncontent-type:{CONTENT_TYPE}\nhost:{host}\n\n{SIGNED_HEADERS}\n{}",
        sha256_hex(payload.as_bytes())
    );
    let scope = format!("{date}/{DNSPOD_SERVICE}/tc3_request");
    let string_to_sign = format!(
        "{SIGNING_ALGORITHM}\n{}\n{scope}\n{}",
        now.timestamp(),
        sha256_hex(canonical_request.as_bytes())
    );

    let secret_date = hmac_sha256(format!("TC3{secret_key}").as_bytes(), date.as_bytes())?;
    let secret_service = hmac_sha256(&secret_date, DNSPOD_SERVICE.as_bytes())?;
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes())?);

    Ok(format!(
        "{SIGNING_ALGORITHM} Credential={secret_id}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}"
    ))
}

fn classify(error: ApiError) -> ProviderError {
    let reason = format!("{}: {}", error.code, error.message);
    if error.code.starts_with("AuthFailure") {
        ProviderError::Authentication {
            provider: PROVIDER.to_string(),
            reason,
        }
    } else if error.code.starts_with("RequestLimitExceeded") || error.code.starts_with("InternalError") {
        ProviderError::Transient {
            provider: PROVIDER.to_string(),
            reason,
        }
    } else {
        rejected(reason)
    }
}

async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| ProviderError::Transient {
        provider: PROVIDER.to_string(),
        reason: format!("request failed: {e}"),
    })?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::Authentication {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {status}"),
        });
    }
    if is_retryable_http_status(status) {
        return Err(ProviderError::Transient {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {status}"),
        });
    }
    if !status.is_success() {
        return Err(rejected(format!("HTTP {status}")));
    }

    let mut envelope: Value = response
        .json()
        .await
        .map_err(|e| rejected(format!("invalid response: {e}")))?;
    let body = envelope
        .get_mut("Response")
        .map(Value::take)
        .ok_or_else(|| rejected("response has no 'Response' object".to_string()))?;

    if let Some(error) = body.get("Error") {
        let error: ApiError = serde_json::from_value(error.clone())
            .map_err(|e| rejected(format!("invalid error object: {e}")))?;
        return Err(classify(error));
    }

    serde_json::from_value(body).map_err(|e| rejected(format!("invalid response: {e}")))
}

#[async_trait]
impl ProviderAdapter for DnspodAdapter {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        BackendKind::Dnspod.capabilities()
    }

    async fn fetch_actual_records(&self, domain: &str) -> Result<Vec<ActualRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let payload = serde_json::json!({
                "Domain": domain,
                "Offset": offset,
                "Limit": DNSPOD_PAGE_SIZE,
            });
            let page: RecordList = match self.call("DescribeRecordList", &payload).await {
                Ok(page) => page,
                Err(ProviderError::Rejected { reason, .. }) if reason.starts_with(NO_RECORDS_CODE) => {
                    break;
                }
                Err(e) => return Err(e),
            };

            let received = page.records.len() as u64;
            let total = page.count.map_or(0, |count| count.total);
            for record in page.records {
                let Ok(record_type) = record.record_type.parse::<RecordType>() else {
                    continue;
                };
                let line = (record.line != DNSPOD_DEFAULT_LINE).then_some(record.line.as_str());
                records.push(ActualRecord::new(
                    record.record_id.to_string(),
                    &absolute_name(&record.name, domain),
                    record_type,
                    &record.value,
                    record.ttl,
                    line,
                    record.remark.filter(|r| !r.is_empty()),
                ));
            }

            offset += received;
            if received == 0 || offset >= total {
                break;
            }
        }

        debug!(domain, count = records.len(), "Fetched DNSPod records");
        Ok(records)
    }

    async fn apply_operation(&self, domain: &str, operation: &Operation) -> Result<(), ProviderError> {
        let (ttl, remark) = match operation {
            Operation::Create { record, comment } | Operation::Update { record, comment, .. } => {
                (record.ttl, comment.as_str())
            }
            Operation::Delete { .. } => (0, ""),
        };

        for change in record_changes(operation) {
            match change {
                RecordChange::Add { value } => {
                    self.write_record(domain, None, operation.key(), value, ttl, remark)
                        .await?;
                }
                RecordChange::Modify { record, value } => {
                    self.write_record(domain, Some(&record.id), operation.key(), value, ttl, remark)
                        .await?;
                }
                RecordChange::Remove { record } => {
                    self.delete_record(domain, &record.id).await?;
                }
            }
        }

        info!(domain, operation = %operation, "Applied DNSPod operation");
        Ok(())
    }
}

#[cfg(test)]
#[path = "dnspod_tests.rs"]
mod dnspod_tests;
