//! Codec for the freeform asset-configuration text.
//!
//! Operators enter asset settings as `key=value` pairs separated by commas or
//! semicolons (`servertype=DC, location=HQ, backup=daily`). Stored values are
//! kept as a structured mapping; the text form exists only to pre-fill edit
//! surfaces, so the codec must round-trip cleanly in both directions.

use crate::errors::{Error, Result};
use std::collections::BTreeMap;

/// Structured string-to-string configuration attached to an asset.
pub type ConfigMapping = BTreeMap<String, String>;

/// Parse freeform configuration text into a [`ConfigMapping`].
///
/// Empty or whitespace-only input yields an empty mapping. A strict JSON
/// object of string values (the already-stored form) is accepted directly;
/// anything else is split into `key=value` pairs on commas and semicolons.
/// Later duplicate keys overwrite earlier ones.
pub fn parse(text: &str) -> Result<ConfigMapping> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(ConfigMapping::new());
    }

    // Round-trip path: edit surfaces may hand back the serialized mapping.
    if let Ok(mapping) = serde_json::from_str::<ConfigMapping>(text) {
        return Ok(mapping);
    }

    let mut mapping = ConfigMapping::new();
    for pair in text.split([',', ';']) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        // Only the first '=' splits; values keep any further '=' verbatim.
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::validation(format!(
                "Invalid format: '{pair}'. Use key=value format."
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation("Empty keys are not allowed"));
        }

        mapping.insert(key.to_string(), value.trim().to_string());
    }

    Ok(mapping)
}

/// Render a mapping back to `key=value` pairs joined by `", "`.
///
/// Used to pre-populate the edit surface; never persisted in this form.
pub fn format(mapping: &ConfigMapping) -> String {
    mapping
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
