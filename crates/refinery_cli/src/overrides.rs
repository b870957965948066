use anyhow::{bail, Context, Result};
use refinery_core::Constants;
use std::collections::HashMap;
use std::path::Path;

const VALID_KEYS: &[&str] = &[
    "base_minutes_per_second",
    "max_ticks_per_update",
    "shipment_horizon_hours",
    "max_pending_shipments",
    "shipment_cooldown_minutes",
    "shipment_staleness_hours",
    "log_capacity",
    "history_capacity",
    "history_sample_minutes",
    "directive_cooldown_minutes",
];

/// Load constants from an optional JSON file, then apply `key=value` overrides on top.
pub fn build_constants(path: Option<&Path>, sets: &[String]) -> Result<Constants> {
    let mut constants = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading constants file: {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("parsing constants file: {}", path.display()))?
        }
        None => Constants::default(),
    };
    let overrides = parse_sets(sets)?;
    apply_overrides(&mut constants, &overrides)?;
    Ok(constants)
}

/// Split `key=value` pairs. Values are read as JSON, falling back to a bare string.
pub fn parse_sets(sets: &[String]) -> Result<HashMap<String, serde_json::Value>> {
    sets.iter()
        .map(|pair| {
            let Some((key, raw)) = pair.split_once('=') else {
                bail!("override '{pair}' is not of the form key=value");
            };
            let value = serde_json::from_str(raw.trim())
                .unwrap_or_else(|_| serde_json::Value::String(raw.trim().to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}

pub fn apply_overrides(
    constants: &mut Constants,
    overrides: &HashMap<String, serde_json::Value>,
) -> Result<()> {
    for (key, value) in overrides {
        match key.as_str() {
            "base_minutes_per_second" => {
                constants.base_minutes_per_second = as_positive_f64(key, value)?;
            }
            "max_ticks_per_update" => constants.max_ticks_per_update = as_u32(key, value)?,
            "shipment_horizon_hours" => {
                constants.shipment_horizon_hours = as_positive_f64(key, value)?;
            }
            "max_pending_shipments" => constants.max_pending_shipments = as_usize(key, value)?,
            "shipment_cooldown_minutes" => {
                constants.shipment_cooldown_minutes = as_positive_f64(key, value)?;
            }
            "shipment_staleness_hours" => {
                constants.shipment_staleness_hours = as_positive_f64(key, value)?;
            }
            "log_capacity" => constants.log_capacity = as_usize(key, value)?,
            "history_capacity" => constants.history_capacity = as_usize(key, value)?,
            "history_sample_minutes" => constants.history_sample_minutes = as_u64(key, value)?,
            "directive_cooldown_minutes" => {
                constants.directive_cooldown_minutes = as_positive_f64(key, value)?;
            }
            _ => bail!(
                "unknown override key '{key}'. Valid keys: {}",
                VALID_KEYS.join(", ")
            ),
        }
    }
    Ok(())
}

fn as_positive_f64(key: &str, value: &serde_json::Value) -> Result<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| anyhow::anyhow!("override '{key}': expected a positive number, got {value}"))
}

fn as_u64(key: &str, value: &serde_json::Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        anyhow::anyhow!("override '{key}': expected a positive integer, got {value}")
    })
}

fn as_u32(key: &str, value: &serde_json::Value) -> Result<u32> {
    let val = as_u64(key, value)?;
    u32::try_from(val)
        .map_err(|_| anyhow::anyhow!("override '{key}': value {val} exceeds u32 range"))
}

fn as_usize(key: &str, value: &serde_json::Value) -> Result<usize> {
    let val = as_u64(key, value)?;
    usize::try_from(val)
        .map_err(|_| anyhow::anyhow!("override '{key}': value {val} exceeds usize range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_f64_override() {
        let mut constants = Constants::default();
        let overrides = HashMap::from([(
            "shipment_horizon_hours".to_string(),
            serde_json::json!(24.0),
        )]);
        apply_overrides(&mut constants, &overrides).unwrap();
        assert!((constants.shipment_horizon_hours - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_integer_overrides() {
        let mut constants = Constants::default();
        let overrides = HashMap::from([
            ("log_capacity".to_string(), serde_json::json!(40)),
            ("max_ticks_per_update".to_string(), serde_json::json!(60)),
        ]);
        apply_overrides(&mut constants, &overrides).unwrap();
        assert_eq!(constants.log_capacity, 40);
        assert_eq!(constants.max_ticks_per_update, 60);
    }

    #[test]
    fn test_unknown_key_errors() {
        let mut constants = Constants::default();
        let overrides = HashMap::from([("nonexistent_field".to_string(), serde_json::json!(1.0))]);
        let err = apply_overrides(&mut constants, &overrides)
            .unwrap_err()
            .to_string();
        assert!(err.contains("unknown override key"));
        assert!(err.contains("nonexistent_field"));
        assert!(err.contains("log_capacity"));
    }

    #[test]
    fn test_type_mismatch_errors() {
        let mut constants = Constants::default();
        for value in [serde_json::json!("soon"), serde_json::json!(-3)] {
            let overrides = HashMap::from([("history_capacity".to_string(), value)]);
            assert!(apply_overrides(&mut constants, &overrides).is_err());
        }
        let overrides = HashMap::from([(
            "base_minutes_per_second".to_string(),
            serde_json::json!(0.0),
        )]);
        assert!(apply_overrides(&mut constants, &overrides).is_err());
    }

    #[test]
    fn test_set_pairs_parse_as_json() {
        let sets = vec![
            "log_capacity=50".to_string(),
            "shipment_horizon_hours = 12.5".to_string(),
        ];
        let constants = build_constants(None, &sets).unwrap();
        assert_eq!(constants.log_capacity, 50);
        assert!((constants.shipment_horizon_hours - 12.5).abs() < f64::EPSILON);

        assert!(parse_sets(&["log_capacity".to_string()]).is_err());
        let err = build_constants(None, &["log_capacity=lots".to_string()]).unwrap_err();
        assert!(err.to_string().contains("expected a positive integer"));
    }
}
