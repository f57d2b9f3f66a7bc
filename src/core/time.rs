use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds since the epoch, rounded to millisecond precision.
pub fn now_secs() -> f64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!("SystemTime error: {e}");
            0
        });

    millis_to_secs(millis)
}

pub fn millis_to_secs(millis: u64) -> f64 {
    (millis as f64) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_to_secs_keeps_three_decimals() {
        assert_eq!(millis_to_secs(1_700_000_000_123), 1_700_000_000.123);
        assert_eq!(format!("{:.3}", millis_to_secs(1_500)), "1.500");
    }

    #[test]
    fn test_now_secs_has_no_sub_millisecond_part() {
        let now = now_secs();
        assert!(now > 1_600_000_000.0);
        let scaled = now * 1000.0;
        assert!((scaled - scaled.round()).abs() < 1e-3);
    }
}
