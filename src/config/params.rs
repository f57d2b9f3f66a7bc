//! Parameter Extraction
//!
//! Pluggable components (currently the status providers) take their settings
//! from a generic `HashMap<String, serde_json::Value>` so new provider types
//! do not need new configuration structs.

use std::collections::HashMap;

/// Extracts a typed parameter from a component's parameter map.
///
/// Returns `default` when the map is `None`, the key is missing, or the value
/// cannot be deserialised into `T`.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
/// use serde_json::json;
/// use edge_relay::config::extract_param;
///
/// let mut params = HashMap::new();
/// params.insert("status".to_string(), json!("online"));
///
/// let status: String = extract_param(&Some(params.clone()), "status", "unknown".to_string());
/// assert_eq!(status, "online");
///
/// let path: Option<String> = extract_param(&Some(params), "path", None);
/// assert_eq!(path, None);
/// ```
pub fn extract_param<T>(
    params: &Option<HashMap<String, serde_json::Value>>,
    key: &str,
    default: T,
) -> T
where
    T: serde::de::DeserializeOwned + Clone,
{
    params
        .as_ref()
        .and_then(|p| p.get(key))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(default)
}
