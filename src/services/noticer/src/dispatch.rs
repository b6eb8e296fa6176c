//! Failover dispatch across group robot endpoints
//!
//! A message is encoded once and tried against each endpoint in caller order.
//! Endpoints in cooldown are skipped without a request, the first accepted
//! delivery ends the loop, and when every endpoint fails the caller receives
//! the most recent failure. All bookkeeping lives on the stack of one `send`
//! call, so a dispatcher can be shared freely between tasks.

use crate::cooldown::{CooldownDecision, CooldownGate};
use crate::error::{Failure, FailureKind, NoticeError, Result};
use crate::message::{MessageEncoder, Payload};
use crate::metrics::DispatchMetrics;
use crate::transport::{EndpointTransport, TransportResponse};
use noticer_shared::{ChannelKind, Context, Endpoint};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// How one provider reports success and failure in its response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    pub channel: ChannelKind,
    /// Field carrying the success/error discriminant
    pub discriminant: &'static str,
    pub success: i64,
    pub rate_limit: i64,
    /// Field carrying the human-readable provider message
    pub message_field: &'static str,
    /// Whether the provider code is appended to provider error messages
    pub code_in_message: bool,
}

impl ProviderProfile {
    /// DingTalk group robot: `{"errcode": 0, "errmsg": "ok"}`
    pub const fn ding_group() -> Self {
        Self {
            channel: ChannelKind::DingGroup,
            discriminant: "errcode",
            success: 0,
            rate_limit: 130101,
            message_field: "errmsg",
            code_in_message: false,
        }
    }

    /// Yach group robot: `{"code": 200, "msg": "success"}`
    pub const fn yach_group() -> Self {
        Self {
            channel: ChannelKind::YachGroup,
            discriminant: "code",
            success: 200,
            rate_limit: 50014,
            message_field: "msg",
            code_in_message: true,
        }
    }

    fn failure(&self, kind: FailureKind, detail: &str, context: Context) -> Failure {
        let message = format!("notice by {} failed, {}", self.channel, detail);
        Failure::new(self.channel, kind, message, context)
    }

    /// Failure recorded when an endpoint is skipped for cooldown
    pub fn cooling_down(&self, endpoint: &Endpoint) -> Failure {
        let mut context = Context::new();
        context.insert("robot".to_string(), endpoint.redacted());
        self.failure(FailureKind::CoolingDown, "the robot is sleeping", context)
    }

    /// Failure recorded when no response was received at all
    pub fn transport_failure(
        &self,
        endpoint: &Endpoint,
        payload: &Payload,
        err: &NoticeError,
    ) -> Failure {
        let mut context = Context::new();
        context.insert("robot".to_string(), endpoint.redacted());
        context.insert("data".to_string(), payload.clone());
        context.insert("error".to_string(), Value::from(err.to_string()));
        self.failure(FailureKind::TransportError, "request error", context)
    }

    /// Interpret a provider response; `Ok` means the message was accepted
    pub fn classify(
        &self,
        endpoint: &Endpoint,
        payload: &Payload,
        response: &TransportResponse,
    ) -> std::result::Result<(), Failure> {
        let mut context = Context::new();
        context.insert("robot".to_string(), endpoint.redacted());
        context.insert("data".to_string(), payload.clone());
        if let Some(query) = &response.query {
            context.insert("query".to_string(), query.clone());
        }

        if response.status != 200 {
            context.insert("status_code".to_string(), Value::from(response.status));
            context.insert("resp".to_string(), Value::from(response.text()));
            return Err(self.failure(FailureKind::TransportError, "status is not 200", context));
        }

        let json = response.json();
        let discriminant = json
            .as_ref()
            .and_then(|body| body.as_object())
            .and_then(|body| body.get(self.discriminant))
            .filter(|value| !value.is_null())
            .cloned();

        let Some(discriminant) = discriminant else {
            context.insert("resp".to_string(), response.body_value());
            return Err(self.failure(
                FailureKind::MalformedResponse,
                &format!("not key {}", self.discriminant),
                context,
            ));
        };

        // a parsed provider answer is kept under `json`, raw bodies under `resp`
        if let Some(json) = &json {
            context.insert("json".to_string(), json.clone());
        }

        let code = code_of(&discriminant);
        if code == Some(self.rate_limit) {
            return Err(self.failure(
                FailureKind::ProviderRateLimited,
                "reach frequency limit",
                context,
            ));
        }
        if code == Some(self.success) {
            return Ok(());
        }

        let provider_message = json
            .as_ref()
            .and_then(|body| body.get(self.message_field))
            .map(display_value)
            .unwrap_or_default();
        let detail = if self.code_in_message {
            format!("{}({})", provider_message, display_value(&discriminant))
        } else {
            provider_message
        };
        Err(self.failure(FailureKind::ProviderError, &detail, context))
    }
}

/// Numeric value of a discriminant sent either as a number or a numeric string
fn code_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Identifier of the endpoint that accepted the message
    pub endpoint: String,
    /// Transport calls made, including the successful one
    pub attempts: usize,
    /// Endpoints skipped for cooldown
    pub skipped: usize,
}

/// Failover loop over the endpoints of one provider
pub struct Dispatcher<T> {
    profile: ProviderProfile,
    gate: CooldownGate,
    transport: T,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl<T: EndpointTransport> Dispatcher<T> {
    pub fn new(profile: ProviderProfile, gate: CooldownGate, transport: T) -> Self {
        Self {
            profile,
            gate,
            transport,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.gate = self.gate.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// Deliver `message` through the first endpoint that accepts it
    ///
    /// `options` is merged into the top level of the encoded payload, e.g.
    /// `{"at": {"isAtAll": true}}`.
    pub async fn send<M>(
        &self,
        message: &M,
        endpoints: &[Endpoint],
        options: Option<&Context>,
    ) -> Result<DispatchReport>
    where
        M: MessageEncoder + Sync + ?Sized,
    {
        let channel = self.profile.channel;
        let payload = merge_options(message.encode()?, options)?;

        let mut last_failure: Option<Failure> = None;
        let mut last_skip: Option<Failure> = None;
        let mut attempts = 0;
        let mut skipped = 0;

        for endpoint in endpoints {
            if self.is_cooling_down(endpoint).await {
                skipped += 1;
                let failure = self.profile.cooling_down(endpoint);
                debug!(channel = %channel, endpoint = %endpoint, "Skipping endpoint in cooldown");
                self.record_failure(&failure);
                last_skip = Some(failure);
                continue;
            }

            attempts += 1;
            let started = Instant::now();
            let outcome = match self.transport.call(endpoint, &payload).await {
                Ok(response) => self.profile.classify(endpoint, &payload, &response),
                Err(err) => Err(self.profile.transport_failure(endpoint, &payload, &err)),
            };
            if let Some(metrics) = &self.metrics {
                metrics.record_attempt(channel, started.elapsed());
            }

            match outcome {
                Ok(()) => {
                    info!(
                        channel = %channel,
                        endpoint = %endpoint,
                        kind = message.kind(),
                        attempts,
                        skipped,
                        "Notification delivered"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_delivery(channel);
                    }
                    return Ok(DispatchReport {
                        endpoint: endpoint.identifier().to_string(),
                        attempts,
                        skipped,
                    });
                }
                Err(failure) => {
                    log_failure(channel, endpoint, &failure);
                    self.record_failure(&failure);
                    last_failure = Some(failure);
                }
            }
        }

        let last = last_failure.or(last_skip);
        match &last {
            Some(failure) if failure.kind == FailureKind::CoolingDown => {
                debug!(channel = %channel, skipped, "Every endpoint is cooling down");
            }
            Some(_) => {}
            None => warn!(channel = %channel, "Dispatch called without endpoints"),
        }

        Err(NoticeError::Exhausted {
            last: last.map(Box::new),
        })
    }

    /// Gate check that fails open when the counter store is unavailable
    async fn is_cooling_down(&self, endpoint: &Endpoint) -> bool {
        match self.gate.check(endpoint).await {
            Ok(CooldownDecision::CoolingDown { .. }) => true,
            Ok(_) => false,
            Err(err) => {
                warn!(
                    channel = %self.profile.channel,
                    endpoint = %endpoint,
                    error = %err,
                    "Cooldown check failed, attempting endpoint"
                );
                false
            }
        }
    }

    fn record_failure(&self, failure: &Failure) {
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(self.profile.channel, failure.kind);
        }
    }
}

fn log_failure(channel: ChannelKind, endpoint: &Endpoint, failure: &Failure) {
    if failure.kind.is_alertable() {
        error!(
            channel = %channel,
            endpoint = %endpoint,
            errno = failure.code,
            kind = %failure.kind,
            context = %serde_json::Value::Object(failure.context.clone()),
            "{}",
            failure.message
        );
    } else {
        debug!(
            channel = %channel,
            endpoint = %endpoint,
            errno = failure.code,
            kind = %failure.kind,
            "{}",
            failure.message
        );
    }
}

/// Merge caller options into the top level of an encoded payload
pub fn merge_options(payload: Payload, options: Option<&Context>) -> Result<Payload> {
    let Some(options) = options.filter(|options| !options.is_empty()) else {
        return Ok(payload);
    };
    match payload {
        Value::Object(mut object) => {
            for (key, value) in options {
                object.insert(key.clone(), value.clone());
            }
            Ok(Value::Object(object))
        }
        _ => Err(NoticeError::encode(
            "options can only be merged into an object payload",
        )),
    }
}
