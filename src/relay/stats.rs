use crate::core::error::RelayError;

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-engine counters, updated lock-free from concurrent handlers.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    published: AtomicU64,
    ignored: AtomicU64,
    decode_errors: AtomicU64,
    encode_errors: AtomicU64,
    publish_errors: AtomicU64,
    identity_drops: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub published: u64,
    pub ignored: u64,
    pub decode_errors: u64,
    pub encode_errors: u64,
    pub publish_errors: u64,
    pub identity_drops: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.decode_errors + self.encode_errors + self.publish_errors + self.identity_drops
    }
}

impl RelayStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, error: &RelayError) {
        let counter = match error {
            RelayError::Decode(_) => &self.decode_errors,
            RelayError::Encode(_) => &self.encode_errors,
            RelayError::Publish { .. } => &self.publish_errors,
            RelayError::MissingIdentity { .. } => &self.identity_drops,
            // Startup-only errors never reach the per-message path.
            RelayError::Subscribe { .. } | RelayError::Configuration(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            identity_drops: self.identity_drops.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ClientError, DecodeError};

    #[test]
    fn test_errors_land_in_their_counters() {
        let stats = RelayStats::default();
        stats.record_received();
        stats.record_received();
        stats.record_error(&DecodeError::NotAnObject("array").into());
        stats.record_error(&RelayError::Publish {
            topic: "t".into(),
            source: ClientError::Disconnected,
        });
        stats.record_error(&RelayError::configuration("ignored"));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(snapshot.publish_errors, 1);
        assert_eq!(snapshot.dropped(), 2);
    }
}
