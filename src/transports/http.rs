//! HTTP transport
//!
//! Posts each record as a JSON body. Requests are spawned on the background
//! runtime and never awaited by the caller; failures and non-2xx responses
//! are reported through diagnostics.

use crate::core::runtime::background_handle;
use crate::core::{
    DeliveryMetrics, DiagnosticEvent, Diagnostics, LogRecord, LoggerError, Result, Transport,
    TransportOptions,
};
use crate::sinks::HttpSinkOptions;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

pub struct HttpTransport {
    name: String,
    url: String,
    options: HttpSinkOptions,
    headers: HeaderMap,
    client: reqwest::Client,
    runtime: Handle,
    diagnostics: Diagnostics,
    metrics: Arc<DeliveryMetrics>,
    closed: bool,
}

impl HttpTransport {
    /// # Errors
    ///
    /// `ErrorKind::Configuration` for header names or values that are not
    /// valid HTTP, or if the client cannot be built.
    pub fn new(options: HttpSinkOptions, diagnostics: Diagnostics) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &options.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| LoggerError::config("HttpSink", format!("header '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| LoggerError::config("HttpSink", format!("header '{}': {}", key, e)))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = options.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| LoggerError::config("HttpSink", e.to_string()))?;

        let url = options.url();
        Ok(Self {
            name: format!("http[{}]", url),
            url,
            options,
            headers,
            client,
            runtime: background_handle()?,
            diagnostics,
            metrics: Arc::new(DeliveryMetrics::new()),
            closed: false,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn metrics(&self) -> Arc<DeliveryMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &TransportOptions {
        &self.options.transport
    }

    fn log(&mut self, record: &LogRecord) -> Result<()> {
        if self.closed {
            self.metrics.record_rejected();
            self.diagnostics.report(DiagnosticEvent::RejectedAfterClose {
                transport: self.name.clone(),
            });
            return Ok(());
        }
        self.metrics.record_accepted();

        let body = match record.to_json_bytes() {
            Ok(body) => body,
            Err(e) => {
                self.metrics.record_encoding_failure();
                self.diagnostics.report(DiagnosticEvent::EncodingFailed {
                    transport: self.name.clone(),
                    error: LoggerError::from(e),
                });
                return Ok(());
            }
        };

        let mut request = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body);
        if let Some(ref auth) = self.options.auth {
            request = request.basic_auth(&auth.username, auth.password.as_ref());
        }

        let name = self.name.clone();
        let url = self.url.clone();
        let metrics = Arc::clone(&self.metrics);
        let diagnostics = self.diagnostics.clone();
        self.runtime.spawn(async move {
            let outcome = match request.send().await {
                Ok(response) => response.error_for_status().map(|_| ()),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => {
                    metrics.record_delivered();
                }
                Err(e) => {
                    metrics.record_delivery_failure();
                    diagnostics.report(DiagnosticEvent::DeliveryFailed {
                        transport: name,
                        error: LoggerError::delivery(url, e.to_string()),
                    });
                }
            }
        });
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
