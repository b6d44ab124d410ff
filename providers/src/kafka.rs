//! Kafka topic consumer. Each record is a JSON alert in the generic webhook
//! shape and is formatted by the [`keep`](crate::keep) formatter.

use crate::keep::KeepProvider;
use provider_core::config::RawConfig;
use provider_core::consumer::{Consumer, MessageSource, RawMessage};
use provider_core::scopes::probe_scopes;
use provider_core::{
    AlertFormatter, AuthConfig, ConfigError, FormattedAlerts, Provider, ProviderContext,
    ProviderError, ProviderScope, ScopeResults,
};
use rdkafka::consumer::{BaseConsumer, Consumer as _};
use rdkafka::error::KafkaError;
use rdkafka::{ClientConfig, Message};
use serde_json::Value;
use std::time::Duration;

pub const PROVIDER_TYPE: &str = "kafka";

const MAX_BATCH: usize = 100;
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) const SCOPES: &[ProviderScope] = &[ProviderScope::new(
    "topic_read",
    "The topic exists and its metadata is readable",
)
.mandatory()];

#[derive(Clone, Debug, AuthConfig)]
pub struct KafkaAuth {
    /// Bootstrap servers, comma separated
    #[auth(hint = "broker-1:9092,broker-2:9092")]
    pub host: String,
    /// Topic to consume alerts from
    pub topic: String,
    #[auth(description = "Consumer group id", default = "keep-consumer")]
    pub group_id: String,
    /// SASL username
    pub username: Option<String>,
    #[auth(description = "SASL password", sensitive)]
    pub password: Option<String>,
    #[auth(description = "security.protocol", default = "PLAINTEXT")]
    pub security_protocol: String,
    #[auth(description = "sasl.mechanism", default = "PLAIN")]
    pub sasl_mechanism: String,
}

impl KafkaAuth {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.host)
            .set("group.id", &self.group_id)
            .set("security.protocol", &self.security_protocol)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest");
        if let Some(username) = &self.username {
            config
                .set("sasl.mechanism", &self.sasl_mechanism)
                .set("sasl.username", username)
                .set("sasl.password", self.password.as_deref().unwrap_or_default());
        }
        config
    }

    fn base_consumer(&self) -> Result<BaseConsumer, ProviderError> {
        self.client_config().create().map_err(queue_error)
    }
}

fn queue_error(err: KafkaError) -> ProviderError {
    ProviderError::Queue(err.to_string())
}

/// Polls one subscribed topic. Offsets are stored only on `ack`, so a
/// message is redelivered after a restart unless it was processed.
pub struct KafkaSource {
    consumer: BaseConsumer,
    topic: String,
}

impl KafkaSource {
    pub fn subscribe(auth: &KafkaAuth) -> Result<Self, ProviderError> {
        let consumer = auth.base_consumer()?;
        consumer.subscribe(&[auth.topic.as_str()]).map_err(queue_error)?;
        Ok(Self {
            consumer,
            topic: auth.topic.clone(),
        })
    }
}

impl MessageSource for KafkaSource {
    fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, ProviderError> {
        let mut batch = Vec::new();
        let mut wait = timeout;
        while batch.len() < MAX_BATCH {
            let Some(result) = self.consumer.poll(wait) else {
                break;
            };
            let message = result.map_err(queue_error)?;
            batch.push(RawMessage {
                id: format!("{}:{}", message.partition(), message.offset()),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            });
            // Drain what is already buffered without blocking again.
            wait = Duration::ZERO;
        }
        Ok(batch)
    }

    fn ack(&mut self, message: &RawMessage) -> Result<(), ProviderError> {
        let (partition, offset) = message
            .id
            .split_once(':')
            .and_then(|(p, o)| Some((p.parse::<i32>().ok()?, o.parse::<i64>().ok()?)))
            .ok_or_else(|| ProviderError::Queue(format!("malformed message id {}", message.id)))?;
        self.consumer
            .store_offset(&self.topic, partition, offset + 1)
            .map_err(queue_error)
    }
}

pub struct KafkaProvider {
    context: ProviderContext,
    auth: KafkaAuth,
}

impl KafkaProvider {
    pub fn new(context: ProviderContext, auth: KafkaAuth) -> Self {
        Self { context, auth }
    }

    pub fn from_raw(context: ProviderContext, raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(context, KafkaAuth::from_raw(raw)?))
    }

    /// Subscribes and returns a consume loop bound to this provider's
    /// context. Run `start_consume` on a dedicated thread.
    pub fn consumer(&self) -> Result<Consumer<KafkaSource>, ProviderError> {
        let source = KafkaSource::subscribe(&self.auth)?;
        tracing::info!(topic = %self.auth.topic, group = %self.auth.group_id, "subscribed");
        Ok(Consumer::new(
            source,
            Self::format_alert,
            self.context.clone(),
        ))
    }
}

impl AlertFormatter for KafkaProvider {
    const FINGERPRINT_FIELDS: &'static [&'static str] = KeepProvider::FINGERPRINT_FIELDS;

    fn format_alert(
        event: &Value,
        context: Option<&ProviderContext>,
    ) -> Result<FormattedAlerts, ProviderError> {
        KeepProvider::format_alert(event, context)
    }
}

impl Provider for KafkaProvider {
    fn provider_type(&self) -> &'static str {
        PROVIDER_TYPE
    }

    fn context(&self) -> &ProviderContext {
        &self.context
    }

    fn scopes(&self) -> &'static [ProviderScope] {
        SCOPES
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        if self.auth.username.is_some() && self.auth.password.is_none() {
            return Err(ConfigError::missing("password"));
        }
        Ok(())
    }

    fn validate_scopes(&self) -> ScopeResults {
        let _guard = self.context.span().entered();
        probe_scopes(SCOPES, |_scope, _| {
            let consumer = self.auth.base_consumer()?;
            let metadata = consumer
                .fetch_metadata(Some(self.auth.topic.as_str()), METADATA_TIMEOUT)
                .map_err(queue_error)?;
            match metadata.topics().first() {
                Some(topic) if topic.error().is_none() && !topic.partitions().is_empty() => Ok(()),
                _ => Err(ProviderError::Queue(format!(
                    "topic {} not found",
                    self.auth.topic
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn auth(extra: Value) -> KafkaAuth {
        let mut raw = json!({"host": "localhost:9092", "topic": "alerts"})
            .as_object()
            .cloned()
            .expect("object");
        if let Value::Object(extra) = extra {
            raw.extend(extra);
        }
        KafkaAuth::from_raw(&raw).expect("config")
    }

    #[test]
    fn defaults_apply() {
        let auth = auth(json!({}));
        assert_eq!(auth.group_id, "keep-consumer");
        assert_eq!(auth.security_protocol, "PLAINTEXT");
        assert_eq!(
            auth.client_config().get("enable.auto.offset.store"),
            Some("false")
        );
        assert_eq!(auth.client_config().get("sasl.username"), None);
    }

    #[test]
    fn username_requires_password() {
        let provider = KafkaProvider::new(
            ProviderContext::default(),
            auth(json!({"username": "svc"})),
        );
        assert_eq!(
            provider.validate_config(),
            Err(ConfigError::missing("password"))
        );
    }

    #[test]
    fn records_use_the_generic_formatter() {
        let alerts = KafkaProvider::format_alert(&json!({"name": "lag", "severity": "warning"}), None)
            .expect("format")
            .into_vec();
        assert_eq!(alerts[0].name, "lag");
        assert!(alerts[0].fingerprint.is_some());
    }
}
