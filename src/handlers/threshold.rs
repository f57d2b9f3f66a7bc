use serde::{Deserialize, Deserializer};

/// Comparison applied between a reading and the rule's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl ThresholdOperator {
    /// Parse an operator from its symbolic or spelled-out form
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            ">" | "greater_than" => Some(Self::GreaterThan),
            ">=" | "greater_than_or_equal" => Some(Self::GreaterThanOrEqual),
            "<" | "less_than" => Some(Self::LessThan),
            "<=" | "less_than_or_equal" => Some(Self::LessThanOrEqual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
        }
    }

    pub fn compare(&self, reading: f64, limit: f64) -> bool {
        match self {
            Self::GreaterThan => reading > limit,
            Self::GreaterThanOrEqual => reading >= limit,
            Self::LessThan => reading < limit,
            Self::LessThanOrEqual => reading <= limit,
        }
    }
}

impl<'de> Deserialize<'de> for ThresholdOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ThresholdOperator::from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported threshold operator '{s}'")))
    }
}

/// Threshold check applied to one numeric field of a sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub field_name: String,
    pub operator: ThresholdOperator,
    pub limit: f64,
    pub alert_label: String,
}

impl ThresholdRule {
    pub fn new(
        field_name: impl Into<String>,
        operator: ThresholdOperator,
        limit: f64,
        alert_label: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
            limit,
            alert_label: alert_label.into(),
        }
    }

    pub fn matches(&self, reading: f64) -> bool {
        self.operator.compare(reading, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greater_than_is_strict() {
        let rule = ThresholdRule::new("temperature", ThresholdOperator::GreaterThan, 80.0, "HIGH_TEMPERATURE");
        assert!(rule.matches(85.0));
        assert!(rule.matches(80.5));
        assert!(!rule.matches(80.0));
        assert!(!rule.matches(75.0));
    }

    #[test]
    fn test_other_operators() {
        assert!(ThresholdOperator::GreaterThanOrEqual.compare(80.0, 80.0));
        assert!(ThresholdOperator::LessThan.compare(-5.0, 0.0));
        assert!(!ThresholdOperator::LessThan.compare(0.0, 0.0));
        assert!(ThresholdOperator::LessThanOrEqual.compare(0.0, 0.0));
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!(ThresholdOperator::from_str(">"), Some(ThresholdOperator::GreaterThan));
        assert_eq!(ThresholdOperator::from_str("less_than_or_equal"), Some(ThresholdOperator::LessThanOrEqual));
        assert_eq!(ThresholdOperator::from_str("contains"), None);
        assert_eq!(ThresholdOperator::GreaterThanOrEqual.as_str(), ">=");
    }

    #[test]
    fn test_operator_deserialises_from_either_spelling() {
        #[derive(Deserialize)]
        struct Holder {
            operator: ThresholdOperator,
        }

        let holder: Holder = toml::from_str(r#"operator = ">""#).unwrap();
        assert_eq!(holder.operator, ThresholdOperator::GreaterThan);

        let holder: Holder = toml::from_str(r#"operator = "less_than""#).unwrap();
        assert_eq!(holder.operator, ThresholdOperator::LessThan);

        assert!(toml::from_str::<Holder>(r#"operator = "~""#).is_err());
    }
}
