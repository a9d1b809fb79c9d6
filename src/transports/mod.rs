//! Transport implementations
//!
//! - [`ConsoleTransport`]: colorized stdout / stderr lines
//! - [`FileTransport`]: daily and size rotated files
//! - [`HttpTransport`]: JSON POST per record
//! - [`StreamTransport`]: any `Write` target
//! - [`broker::BrokerTransport`]: message-broker topic

pub mod broker;
pub mod console;
pub mod file;
pub mod http;
pub mod stream;

pub use broker::{BrokerHandle, BrokerState, BrokerTransport};
pub use console::ConsoleTransport;
pub use file::{FileTransport, RotatingFileWriter};
pub use http::HttpTransport;
pub use stream::StreamTransport;

use crate::core::{Diagnostics, Result, Transport};
use crate::sinks::SinkDescriptor;

/// A transport ready for a logger, plus its broker handle if it has one
pub struct BuiltTransport {
    pub transport: Box<dyn Transport>,
    pub broker: Option<BrokerHandle>,
}

/// Instantiate the transport a descriptor names
///
/// Broker descriptors without their own diagnostics inherit `diagnostics`.
///
/// # Errors
///
/// Only configuration errors; nothing here waits on the network.
pub fn build_transport(
    descriptor: SinkDescriptor,
    diagnostics: &Diagnostics,
) -> Result<BuiltTransport> {
    let (transport, broker): (Box<dyn Transport>, Option<BrokerHandle>) = match descriptor {
        SinkDescriptor::Console(options) => (Box::new(ConsoleTransport::new(options)), None),
        SinkDescriptor::File(options) => {
            (Box::new(FileTransport::new(options, diagnostics.clone())?), None)
        }
        SinkDescriptor::Http(options) => {
            (Box::new(HttpTransport::new(options, diagnostics.clone())?), None)
        }
        SinkDescriptor::Stream(options) => (Box::new(StreamTransport::new(options)), None),
        SinkDescriptor::Broker(sink) => {
            let mut config = sink.into_config();
            if config.diagnostics.is_none() {
                config.diagnostics = Some(diagnostics.clone());
            }
            let transport = BrokerTransport::new(config)?;
            let handle = transport.handle();
            (Box::new(transport), Some(handle))
        }
    };
    Ok(BuiltTransport { transport, broker })
}
