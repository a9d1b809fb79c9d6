//! File-based logger configuration
//!
//! ```toml
//! level = "info"
//!
//! [identity]
//! service_name = "billing"
//! service_id = "billing-1"
//! module = "api"
//! component = "orders"
//!
//! [[sinks]]
//! name = "console"
//! opts = { colors = false }
//!
//! [[sinks]]
//! name = "kafka"
//! [sinks.opts]
//! topic = "logs"
//! connection = { brokers = ["127.0.0.1:29092"] }
//! producer = { acks = -1, compression = "gzip" }
//! ```
//!
//! Sink names are resolved with [`SinkDescriptor::from_named`]; unknown names
//! are skipped. Encoders, callbacks and client factories cannot be expressed
//! in a file and are attached in code.

use crate::core::{
    DiagnosticEvent, Diagnostics, LogLevel, Logger, LoggerBuilder, LoggerConfig, LoggerError,
    Result, ServiceIdentity,
};
use crate::sinks::SinkDescriptor;
use crate::transports::broker::BrokerClientFactory;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct SinkSettings {
    pub name: String,
    #[serde(default)]
    pub opts: toml::Table,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// Parsed case-insensitively; `info` when unset
    pub level: Option<String>,
    pub identity: Option<ServiceIdentity>,
    pub sinks: Vec<SinkSettings>,
}

impl LoggerSettings {
    /// # Errors
    ///
    /// `ErrorKind::Configuration` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::config(
                "LoggerSettings",
                format!("cannot read '{}': {}", path.display(), e),
            )
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn level(&self) -> Result<LogLevel> {
        match self.level.as_deref() {
            Some(level) => level
                .parse()
                .map_err(|e: String| LoggerError::config("LoggerSettings", e)),
            None => Ok(LogLevel::default()),
        }
    }

    pub fn logger_config(&self) -> Result<LoggerConfig> {
        let config = LoggerConfig::new(self.level()?);
        Ok(match self.identity {
            Some(ref identity) => config.with_identity(identity),
            None => config,
        })
    }

    /// Descriptors for every recognized sink, in file order
    ///
    /// Unknown sink names are skipped and reported to stderr.
    pub fn sink_descriptors(&self) -> Result<Vec<SinkDescriptor>> {
        self.sink_descriptors_reporting(&Diagnostics::stderr())
    }

    /// Like [`sink_descriptors`](Self::sink_descriptors), reporting unknown
    /// sink names to `diagnostics`
    pub fn sink_descriptors_reporting(
        &self,
        diagnostics: &Diagnostics,
    ) -> Result<Vec<SinkDescriptor>> {
        let mut descriptors = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let options = serde_json::to_value(&sink.opts).map_err(|e| {
                LoggerError::config(format!("{} sink", sink.name), e.to_string())
            })?;
            match SinkDescriptor::from_named(&sink.name, options)? {
                Some(descriptor) => descriptors.push(descriptor),
                None => diagnostics.report(DiagnosticEvent::UnknownSink {
                    name: sink.name.clone(),
                }),
            }
        }
        Ok(descriptors)
    }

    /// Builder preloaded with this file's level, identity and sinks
    ///
    /// `client_factory` is attached to every broker sink.
    pub fn builder(
        &self,
        client_factory: Option<Arc<dyn BrokerClientFactory>>,
    ) -> Result<LoggerBuilder> {
        self.builder_with_diagnostics(client_factory, Diagnostics::stderr())
    }

    /// Builder whose diagnostics also receive problems found in this file
    pub fn builder_with_diagnostics(
        &self,
        client_factory: Option<Arc<dyn BrokerClientFactory>>,
        diagnostics: Diagnostics,
    ) -> Result<LoggerBuilder> {
        let mut descriptors = self.sink_descriptors_reporting(&diagnostics)?;
        if let Some(factory) = client_factory {
            descriptors = descriptors
                .into_iter()
                .map(|descriptor| match descriptor {
                    SinkDescriptor::Broker(sink) => sink
                        .map_config(|config| config.with_client_factory(Arc::clone(&factory)))
                        .map(SinkDescriptor::Broker),
                    other => Ok(other),
                })
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(Logger::builder()
            .config(self.logger_config()?)
            .diagnostics(diagnostics)
            .sinks(descriptors))
    }

    /// # Errors
    ///
    /// Configuration errors from the file's contents or from a sink.
    pub fn build_logger(
        &self,
        client_factory: Option<Arc<dyn BrokerClientFactory>>,
    ) -> Result<Logger> {
        self.builder(client_factory)?.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::sinks::SinkKind;
    use crate::transports::broker::MemoryBroker;

    const SAMPLE: &str = r#"
level = "WARNING"

[identity]
service_name = "billing"
service_id = "billing-1"
component = "orders"

[[sinks]]
name = "console"
opts = { colors = false, level = "error" }

[[sinks]]
name = "syslog"

[[sinks]]
name = "kafka"
[sinks.opts]
topic = "logs"
connection = { brokers = ["127.0.0.1:29092"], client_id = "billing" }
producer = { acks = -1, compression = "gzip", timeout_ms = 3000 }
"#;

    #[test]
    fn test_parse_sample() {
        let settings = LoggerSettings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.level().unwrap(), LogLevel::Warn);
        assert_eq!(settings.sinks.len(), 3);

        let kinds: Vec<SinkKind> = settings
            .sink_descriptors()
            .unwrap()
            .iter()
            .map(SinkDescriptor::kind)
            .collect();
        assert_eq!(kinds, vec![SinkKind::Console, SinkKind::Broker]);
    }

    #[test]
    fn test_logger_config_uses_identity() {
        let settings = LoggerSettings::from_toml_str(SAMPLE).unwrap();
        let logger = settings.builder(None).unwrap().build();
        // The kafka sink needs a client factory unless the feature is on
        if cfg!(not(feature = "kafka")) {
            assert_eq!(logger.unwrap_err().kind(), ErrorKind::Configuration);
        }

        let config = settings.logger_config().unwrap();
        let label = crate::core::make_label(config.label_generator.as_ref());
        assert!(label.starts_with("SERVICE NAME: billing | SERVICE ID: billing-1"));
    }

    #[tokio::test]
    async fn test_build_with_memory_broker() {
        let broker = MemoryBroker::new();
        let settings = LoggerSettings::from_toml_str(SAMPLE).unwrap();
        let logger = settings.build_logger(Some(Arc::new(broker.clone()))).unwrap();

        assert_eq!(logger.broker_handles().len(), 1);
        logger.ready().await.unwrap();
        logger.warn("configured");
        logger.shutdown().await;

        let stored = broker.messages("logs");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].client_id, "billing");
        assert_eq!(stored[0].value_json().unwrap()["level"], "warn");
    }

    #[test]
    fn test_unknown_sink_reported_to_diagnostics() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let diagnostics = Diagnostics::with_callback(Arc::new(move |event: &DiagnosticEvent| {
            sink.lock().push(event.to_string());
        }));

        let settings = LoggerSettings::from_toml_str(
            "[[sinks]]\nname = \"syslog\"\n[[sinks]]\nname = \"stream\"\n",
        )
        .unwrap();
        let logger = settings
            .builder_with_diagnostics(None, diagnostics)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(logger.transport_names().len(), 1);
        assert_eq!(
            *seen.lock(),
            vec!["[LOGGER WARNING] Unknown sink 'syslog' ignored".to_string()]
        );
    }

    #[test]
    fn test_empty_file_is_valid() {
        let settings = LoggerSettings::from_toml_str("").unwrap();
        assert_eq!(settings.level().unwrap(), LogLevel::Info);
        assert!(settings.sink_descriptors().unwrap().is_empty());
    }

    #[test]
    fn test_bad_input_is_configuration_error() {
        let err = LoggerSettings::from_toml_str("level = ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = LoggerSettings::from_toml_str("level = \"loud\"")
            .unwrap()
            .level()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = LoggerSettings::load("/definitely/not/here.toml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logger.toml");
        std::fs::write(&path, "level = \"debug\"\n[[sinks]]\nname = \"stream\"\n").unwrap();

        let settings = LoggerSettings::load(&path).unwrap();
        assert_eq!(settings.level().unwrap(), LogLevel::Debug);
        assert_eq!(settings.sink_descriptors().unwrap().len(), 1);
    }
}
