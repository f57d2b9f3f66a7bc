pub mod command;
pub mod status;
pub mod telemetry;
pub mod threshold;

pub use command::CommandDispatcher;
pub use status::{StatusProvider, create_status_provider};
pub use telemetry::TelemetryEvaluator;
pub use threshold::{ThresholdOperator, ThresholdRule};
