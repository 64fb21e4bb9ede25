//! Remote data client.
//!
//! One outbound call per invocation. Every attempt is written to the usage
//! log; credits are charged only when the provider confirms success.

use crate::report::ReportType;
use crate::transport::{HttpResponse, HttpTransport, ReqwestTransport};
use rankgrid_billing::{Settlement, UsageEvent, UsageRecorder};
use rankgrid_core::{
    EndpointCategory, ProviderConfig, ProviderError, QuotaDenial, QuotaError, RankgridError,
    RankgridResult, TenantId, UsageStatus,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

/// Wait suggested to callers when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const NOTHING_FOUND_CODE: u32 = 50;
const BALANCE_EXHAUSTED_CODES: [u32; 3] = [132, 133, 134];

/// Parameters whose value is logged as the call's subject, in priority order.
const SUBJECT_PARAMS: [&str; 3] = ["domain", "phrase", "target"];

// ============================================================================
// CALL DESCRIPTION
// ============================================================================

/// One remote request: report, tenant, report parameters and accounting.
///
/// Category, request type and credit cost default to the report's own values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    report: ReportType,
    tenant: TenantId,
    params: Vec<(String, String)>,
    category: EndpointCategory,
    request_type: String,
    credits: i64,
    subject: Option<String>,
    settlement: Settlement,
    deadline: Option<Duration>,
}

impl RemoteCall {
    pub fn new(report: ReportType, tenant: TenantId) -> Self {
        Self {
            report,
            tenant,
            params: Vec::new(),
            category: report.category(),
            request_type: report.request_type().to_string(),
            credits: report.credits(),
            subject: None,
            settlement: Settlement::Charge,
            deadline: None,
        }
    }

    /// Append a query parameter. Order is preserved on the wire.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Append a parameter only when a value is present.
    pub fn optional_param(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    pub fn with_category(mut self, category: EndpointCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_request_type(mut self, request_type: impl Into<String>) -> Self {
        self.request_type = request_type.into();
        self
    }

    pub fn with_credits(mut self, credits: i64) -> Self {
        self.credits = credits;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.settlement = settlement;
        self
    }

    /// Override the configured request timeout for this call.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn report(&self) -> ReportType {
        self.report
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn category(&self) -> EndpointCategory {
        self.category
    }

    pub fn credits(&self) -> i64 {
        self.credits
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Explicit subject, else the first `domain`/`phrase`/`target` parameter.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref().or_else(|| {
            SUBJECT_PARAMS.iter().find_map(|name| {
                self.params
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.as_str())
            })
        })
    }

    fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|(k, _)| k == name)
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Classified outcome of one attempt, before it is logged.
enum Outcome {
    Success(String),
    RateLimited(u64),
    BalanceExhausted(String),
    Failed(ProviderError),
}

/// Client for the remote metrics provider.
#[derive(Clone)]
pub struct RemoteDataClient {
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
    recorder: UsageRecorder,
}

impl RemoteDataClient {
    pub fn new(
        config: ProviderConfig,
        transport: Arc<dyn HttpTransport>,
        recorder: UsageRecorder,
    ) -> Self {
        Self {
            config,
            transport,
            recorder,
        }
    }

    /// Client over a default `reqwest` transport.
    pub fn with_reqwest(config: ProviderConfig, recorder: UsageRecorder) -> Self {
        Self::new(config, Arc::new(ReqwestTransport::new()), recorder)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Perform the call and return the raw response text.
    ///
    /// # Errors
    /// - `ProviderError::RateLimited` on HTTP 429
    /// - `QuotaError::Exceeded` with `ProviderBalance` on HTTP 402 or a
    ///   balance-exhausted error body
    /// - `ProviderError::Timeout` when the deadline elapses
    /// - `ProviderError::Remote` for any other failure
    pub async fn call(&self, call: RemoteCall) -> RankgridResult<String> {
        let span = info_span!(
            "remote_call",
            report = %call.report,
            category = %call.category,
            tenant = %call.tenant,
        );
        self.call_inner(call).instrument(span).await
    }

    async fn call_inner(&self, call: RemoteCall) -> RankgridResult<String> {
        let url = format!("{}/", self.config.base_url.trim_end_matches('/'));
        let query = self.query(&call);
        let deadline = call.deadline.unwrap_or(self.config.request_timeout);
        let report = call.report.as_str();

        debug!(params = call.params.len(), ?deadline, "Calling provider");

        let outcome =
            match tokio::time::timeout(deadline, self.transport.get(&url, &query)).await {
                Err(_) => Outcome::Failed(ProviderError::Timeout {
                    report: report.to_string(),
                    after: deadline,
                }),
                Ok(Err(e)) => Outcome::Failed(ProviderError::Remote {
                    report: report.to_string(),
                    status: None,
                    message: e.to_string(),
                }),
                Ok(Ok(response)) => classify(call.report, response),
            };

        match outcome {
            Outcome::Success(body) => {
                self.record(&call, UsageStatus::Success, call.credits, None)
                    .await;
                Ok(body)
            }
            Outcome::RateLimited(retry_after_secs) => {
                warn!(retry_after_secs, "Provider rate limited the call");
                let message = format!("Rate limited, retry after {}s", retry_after_secs);
                self.record(&call, UsageStatus::RateLimited, 0, Some(message))
                    .await;
                Err(ProviderError::RateLimited {
                    report: report.to_string(),
                    retry_after_secs,
                }
                .into())
            }
            Outcome::BalanceExhausted(message) => {
                warn!(%message, "Provider balance exhausted");
                self.record(&call, UsageStatus::QuotaExceeded, 0, Some(message))
                    .await;
                Err(QuotaError::exceeded(call.category, QuotaDenial::ProviderBalance).into())
            }
            Outcome::Failed(error) => {
                warn!(error = %error, "Provider call failed");
                self.record(&call, UsageStatus::Failed, 0, Some(error.to_string()))
                    .await;
                Err(RankgridError::from(error))
            }
        }
    }

    /// `type`, `key`, report parameters in insertion order, then the
    /// report's export columns unless the caller supplied them.
    fn query(&self, call: &RemoteCall) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(call.params.len() + 3);
        query.push(("type".to_string(), call.report.as_str().to_string()));
        query.push(("key".to_string(), self.config.api_key.clone()));
        query.extend(call.params.iter().cloned());
        if !call.has_param("export_columns") {
            query.push((
                "export_columns".to_string(),
                call.report.schema().export_columns(),
            ));
        }
        query
    }

    async fn record(
        &self,
        call: &RemoteCall,
        status: UsageStatus,
        credits: i64,
        error: Option<String>,
    ) {
        let mut event = UsageEvent::new(
            call.tenant,
            call.category,
            call.request_type.clone(),
            status,
            credits,
        )
        .with_settlement(call.settlement);
        if let Some(subject) = call.subject() {
            event = event.with_subject(subject);
        }
        if let Some(message) = error {
            event = event.with_error(message);
        }
        self.recorder.log_usage(event).await;
    }
}

impl fmt::Debug for RemoteDataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDataClient")
            .field("base_url", &self.config.base_url)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout", &self.config.request_timeout)
            .finish()
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

fn classify(report: ReportType, response: HttpResponse) -> Outcome {
    match response.status {
        429 => Outcome::RateLimited(parse_retry_after(response.retry_after.as_deref())),
        402 => Outcome::BalanceExhausted("SEMrush API quota exceeded".to_string()),
        status if !response.is_success() => Outcome::Failed(ProviderError::Remote {
            report: report.as_str().to_string(),
            status: Some(status),
            message: format!("provider answered HTTP {}", status),
        }),
        _ => classify_body(report, response.body),
    }
}

/// The provider reports some failures as 2xx bodies of the form
/// `ERROR <code> :: <message>`.
fn classify_body(report: ReportType, body: String) -> Outcome {
    let Some(code) = error_code(&body) else {
        return Outcome::Success(body);
    };
    let message = body.trim().to_string();
    if code == Some(NOTHING_FOUND_CODE) {
        Outcome::Success(String::new())
    } else if code.is_some_and(|c| BALANCE_EXHAUSTED_CODES.contains(&c)) {
        Outcome::BalanceExhausted(message)
    } else {
        Outcome::Failed(ProviderError::Remote {
            report: report.as_str().to_string(),
            status: None,
            message,
        })
    }
}

/// `Some(code)` for an error body, `Some(None)` when the code is unreadable,
/// `None` for a data body.
fn error_code(body: &str) -> Option<Option<u32>> {
    let rest = body.trim_start().strip_prefix("ERROR")?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some(digits.parse().ok())
}

/// Whole seconds from a `Retry-After` value. Fractions round up; anything
/// unparseable falls back to [`DEFAULT_RETRY_AFTER_SECS`].
pub fn parse_retry_after(value: Option<&str>) -> u64 {
    let Some(value) = value.map(str::trim) else {
        return DEFAULT_RETRY_AFTER_SECS;
    };
    if let Ok(secs) = value.parse::<u64>() {
        return secs;
    }
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => secs.ceil() as u64,
        _ => DEFAULT_RETRY_AFTER_SECS,
    }
}
