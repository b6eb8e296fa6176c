//! Helpers shared by the single-target provider channels
//!
//! Worker robots and the SMS gateway answer with `{"errcode": .., "errmsg": ..}`
//! and authenticate with short-lived tickets kept in the ticket cache.

use crate::error::{NoticeError, Result};
use crate::store::TicketCache;
use noticer_shared::{ChannelKind, Context};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest response body kept in error context
const MAX_CONTEXT_BODY: usize = 1000;

/// Check status and `errcode` presence, returning the parsed body
pub fn errcode_body(channel: ChannelKind, business: &str, status: u16, body: &str) -> Result<Value> {
    if status != 200 {
        let mut context = Context::new();
        context.insert("status_code".to_string(), Value::from(status));
        context.insert("body".to_string(), Value::from(truncate(body)));
        return Err(NoticeError::Provider {
            code: channel.error_base() + 1,
            message: format!("{} failed, status code is not 200", business),
            context,
        });
    }

    match serde_json::from_str::<Value>(body) {
        Ok(json) if json.get("errcode").is_some() => Ok(json),
        _ => {
            let mut context = Context::new();
            context.insert("body".to_string(), Value::from(truncate(body)));
            Err(NoticeError::Provider {
                code: channel.error_base() + 2,
                message: format!("{} failed, not key errcode", business),
                context,
            })
        }
    }
}

/// Numeric `errcode` of a checked body, 0 meaning success
pub fn errcode(json: &Value) -> i64 {
    match &json["errcode"] {
        Value::Number(n) => n.as_i64().unwrap_or(-1),
        Value::String(s) => s.trim().parse().unwrap_or(-1),
        _ => -1,
    }
}

/// Provider error for a non-zero `errcode`
pub fn provider_error(channel: ChannelKind, business: &str, json: Value) -> NoticeError {
    let errmsg = json["errmsg"].as_str().unwrap_or_default().to_string();
    let mut context = Context::new();
    context.insert("json".to_string(), json);
    NoticeError::Provider {
        code: channel.error_base() + 4,
        message: format!("{} failed, error: {}", business, errmsg),
        context,
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_CONTEXT_BODY).collect()
}

/// Convert a JSON object into form fields; strings are sent verbatim
pub fn form_fields(fields: &Context) -> Vec<(String, String)> {
    fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Cached provider ticket
#[derive(Clone)]
pub struct TicketSource {
    cache: Arc<dyn TicketCache>,
    key: String,
    ttl: Duration,
}

impl TicketSource {
    pub fn new<S: Into<String>>(cache: Arc<dyn TicketCache>, key: S, ttl: Duration) -> Self {
        Self {
            cache,
            key: key.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return the cached ticket or fetch and cache a new one
    ///
    /// Cache errors are logged and never block delivery.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        match self.cache.get(&self.key).await {
            Ok(Some(ticket)) if !ticket.is_empty() => return Ok(ticket),
            Ok(_) => {}
            Err(err) => warn!(key = %self.key, error = %err, "Ticket cache read failed"),
        }

        let ticket = fetch().await?;
        debug!(key = %self.key, "Fetched new provider ticket");

        if let Err(err) = self.cache.set_ex(&self.key, &ticket, self.ttl).await {
            warn!(key = %self.key, error = %err, "Ticket cache write failed");
        }
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_errcode_body_checks() {
        let err = errcode_body(ChannelKind::Sms, "notice by sms", 502, "bad gateway").unwrap_err();
        assert_eq!(err.code(), 4001);
        assert_eq!(err.to_string(), "notice by sms failed, status code is not 200");

        let long = "x".repeat(5000);
        let err = errcode_body(ChannelKind::Sms, "notice by sms", 200, &long).unwrap_err();
        assert_eq!(err.code(), 4002);
        assert_eq!(
            err.context().unwrap()["body"].as_str().unwrap().len(),
            MAX_CONTEXT_BODY
        );

        let json = errcode_body(ChannelKind::Sms, "notice by sms", 200, r#"{"errcode":"0"}"#).unwrap();
        assert_eq!(errcode(&json), 0);
    }

    #[test]
    fn test_form_fields() {
        let mut fields = Context::new();
        fields.insert("type".to_string(), json!("text"));
        fields.insert("duration".to_string(), json!(3));
        fields.insert("skip".to_string(), Value::Null);

        let form = form_fields(&fields);
        assert!(form.contains(&("type".to_string(), "text".to_string())));
        assert!(form.contains(&("duration".to_string(), "3".to_string())));
        assert_eq!(form.len(), 2);
    }

    #[tokio::test]
    async fn test_ticket_is_fetched_once() {
        let cache = Arc::new(MemoryStore::new());
        let source = TicketSource::new(cache.clone(), "sms.ticket.app", Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);

        for _ in 0..3 {
            let ticket = source
                .get_or_fetch(|| async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok("T-1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(ticket, "T-1");
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get("sms.ticket.app").await.unwrap().as_deref(),
            Some("T-1")
        );
    }
}
