//! Status providers answer `get_status` commands.
//!
//! The static provider simulates a healthy device. The file provider reads a
//! status string that some other process (a hardware watchdog, a supervisor)
//! keeps up to date.

use crate::config::{StatusConfig, extract_param};
use crate::core::error::RelayError;

use std::path::PathBuf;
use tokio::runtime::{Handle, RuntimeFlavor};

pub trait StatusProvider: Send + Sync {
    fn current_status(&self, device_id: &str) -> String;
}

pub struct StaticStatusProvider {
    status: String,
}

impl StaticStatusProvider {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

impl StatusProvider for StaticStatusProvider {
    fn current_status(&self, _device_id: &str) -> String {
        self.status.clone()
    }
}

pub struct FileStatusProvider {
    path: PathBuf,
    fallback: String,
}

impl FileStatusProvider {
    pub fn new(path: impl Into<PathBuf>, fallback: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fallback: fallback.into(),
        }
    }
}

impl FileStatusProvider {
    /// Reads the status file. On a multi-threaded runtime the worker is
    /// handed off first so other deliveries keep running during the read.
    fn read_status(&self) -> std::io::Result<String> {
        match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| std::fs::read_to_string(&self.path))
            }
            _ => std::fs::read_to_string(&self.path),
        }
    }
}

impl StatusProvider for FileStatusProvider {
    fn current_status(&self, device_id: &str) -> String {
        match self.read_status() {
            Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
            Ok(_) => {
                tracing::warn!(device_id, path = %self.path.display(), "Status file is empty");
                self.fallback.clone()
            }
            Err(e) => {
                tracing::warn!(device_id, path = %self.path.display(), "Failed to read status file: {e}");
                self.fallback.clone()
            }
        }
    }
}

/// Lists the provider types accepted in `[status] type`.
pub fn list_status_providers() -> Vec<&'static str> {
    vec!["static", "file"]
}

pub fn create_status_provider(config: &StatusConfig) -> Result<Box<dyn StatusProvider>, RelayError> {
    tracing::info!("Creating status provider '{}'", config.r#type);

    match config.r#type.as_str() {
        "static" => {
            let status = extract_param(&config.parameters, "status", "online".to_string());
            Ok(Box::new(StaticStatusProvider::new(status)))
        }
        "file" => {
            let path = extract_param(&config.parameters, "path", None::<String>).ok_or_else(|| {
                RelayError::configuration("file status provider requires a 'path' parameter")
            })?;
            let fallback = extract_param(&config.parameters, "fallback", "unknown".to_string());
            Ok(Box::new(FileStatusProvider::new(path, fallback)))
        }
        other => Err(RelayError::configuration(format!(
            "unknown status provider type '{other}' (expected one of {:?})",
            list_status_providers()
        ))),
    }
}
