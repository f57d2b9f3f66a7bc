pub mod error;
pub mod message;
pub mod time;

pub use error::{ClientError, DecodeError, RelayError, RelayResult};
pub use message::{DecodedFields, InboundMessage, OutboundMessage, QualityOfService};

/// Out-of-band signal sent to long-running tasks.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Terminate,
}
