//! Configuration validation.
//!
//! Validates the run configuration before any rule is loaded.

use crate::domain::error::RegimeError;
use crate::ports::config_port::ConfigPort;

pub const RULE_FORMATS: &[&str] = &["json", "toml"];
pub const STATE_BACKENDS: &[&str] = &["csv", "json", "sqlite"];
pub const DATA_BACKENDS: &[&str] = &["csv", "sqlite"];
pub const RATE_BACKENDS: &[&str] = &["csv", "sqlite"];
pub const LOG_FORMATS: &[&str] = &["pretty", "json"];

pub const DEFAULT_RULE_FORMAT: &str = "json";
pub const DEFAULT_STATE_BACKEND: &str = "json";
pub const DEFAULT_DATA_BACKEND: &str = "csv";
pub const DEFAULT_RATE_BACKEND: &str = "csv";
pub const DEFAULT_LOG_FORMAT: &str = "pretty";

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), RegimeError> {
    let rule_format = choice(config, "rules", "format", RULE_FORMATS, DEFAULT_RULE_FORMAT)?;
    let state_backend = choice(config, "state", "backend", STATE_BACKENDS, DEFAULT_STATE_BACKEND)?;
    let data_backend = choice(config, "data", "backend", DATA_BACKENDS, DEFAULT_DATA_BACKEND)?;
    let rate_backend = choice(config, "macro", "rates_backend", RATE_BACKENDS, DEFAULT_RATE_BACKEND)?;
    choice(config, "logging", "format", LOG_FORMATS, DEFAULT_LOG_FORMAT)?;
    tracing::debug!(%rule_format, %state_backend, %data_backend, %rate_backend, "config backends");

    if data_backend == "csv" {
        require(config, "data", "dir")?;
    }
    if rate_backend == "csv" {
        require(config, "macro", "rates_path")?;
    }
    if [&state_backend, &data_backend, &rate_backend]
        .iter()
        .any(|b| b.as_str() == "sqlite")
    {
        require(config, "sqlite", "path")?;
        validate_pool_size(config)?;
    }

    validate_indicators(config)?;
    Ok(())
}

/// Lower-cased value of `[section] key`, or `default`; must be one of `allowed`.
pub fn choice(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    allowed: &[&str],
    default: &str,
) -> Result<String, RegimeError> {
    let value = config
        .get_string(section, key)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string());

    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(RegimeError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("unknown value '{}', expected one of {}", value, allowed.join(", ")),
        })
    }
}

pub fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, RegimeError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(RegimeError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), RegimeError> {
    let value = config.get_int("sqlite", "pool_size", 4);
    if value < 1 {
        return Err(RegimeError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn positive(config: &dyn ConfigPort, key: &str, default: i64) -> Result<i64, RegimeError> {
    let value = config.get_int("indicators", key, default);
    if value <= 0 {
        return Err(RegimeError::ConfigInvalid {
            section: "indicators".to_string(),
            key: key.to_string(),
            reason: format!("{} must be positive", key),
        });
    }
    Ok(value)
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), RegimeError> {
    let fast = positive(config, "macd_fast", 12)?;
    let slow = positive(config, "macd_slow", 26)?;
    positive(config, "macd_signal", 9)?;
    let length = positive(config, "momentum_length", 20)?;

    if fast >= slow {
        return Err(RegimeError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "macd_fast".to_string(),
            reason: "macd_fast must be less than macd_slow".to_string(),
        });
    }
    if length < 2 {
        return Err(RegimeError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "momentum_length".to_string(),
            reason: "momentum_length must be at least 2".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const MINIMAL: &str = "[data]\ndir = prices\n[macro]\nrates_path = rates.csv\n";

    #[test]
    fn minimal_config_passes() {
        assert!(validate_run_config(&make_config(MINIMAL)).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[rules]
path = rules.toml
format = TOML

[state]
backend = sqlite
path = unused

[data]
backend = sqlite

[macro]
index_symbol = ^GSPC
rates_backend = sqlite

[sqlite]
path = regime.db
pool_size = 2

[indicators]
macd_fast = 12
macd_slow = 26
macd_signal = 9
momentum_length = 20

[logging]
format = json
"#,
        );
        assert!(validate_run_config(&config).is_ok());
    }

    #[test]
    fn unknown_state_backend_fails() {
        let config = make_config(&format!("{}[state]\nbackend = redis\n", MINIMAL));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigInvalid { section, key, .. } if section == "state" && key == "backend"));
    }

    #[test]
    fn unknown_rule_format_fails() {
        let config = make_config(&format!("{}[rules]\nformat = yaml\n", MINIMAL));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigInvalid { key, .. } if key == "format"));
    }

    #[test]
    fn csv_data_requires_dir() {
        let config = make_config("[macro]\nrates_path = rates.csv\n");
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigMissing { section, key } if section == "data" && key == "dir"));
    }

    #[test]
    fn sqlite_backend_requires_path() {
        let config = make_config(&format!("{}[state]\nbackend = sqlite\n", MINIMAL));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigMissing { section, .. } if section == "sqlite"));
    }

    #[test]
    fn pool_size_zero_fails() {
        let config = make_config(&format!(
            "{}[state]\nbackend = sqlite\n[sqlite]\npath = x.db\npool_size = 0\n",
            MINIMAL
        ));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigInvalid { key, .. } if key == "pool_size"));
    }

    #[test]
    fn fast_must_be_below_slow() {
        let config = make_config(&format!("{}[indicators]\nmacd_fast = 26\nmacd_slow = 12\n", MINIMAL));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigInvalid { key, .. } if key == "macd_fast"));
    }

    #[test]
    fn non_positive_period_fails() {
        let config = make_config(&format!("{}[indicators]\nmacd_signal = 0\n", MINIMAL));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigInvalid { key, .. } if key == "macd_signal"));
    }

    #[test]
    fn momentum_length_of_one_fails() {
        let config = make_config(&format!("{}[indicators]\nmomentum_length = 1\n", MINIMAL));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, RegimeError::ConfigInvalid { key, .. } if key == "momentum_length"));
    }

    #[test]
    fn choice_is_case_insensitive_with_default() {
        let config = make_config("[rules]\nformat = Toml\n");
        assert_eq!(choice(&config, "rules", "format", RULE_FORMATS, "json").unwrap(), "toml");
        assert_eq!(choice(&config, "state", "backend", STATE_BACKENDS, "csv").unwrap(), "csv");
    }
}
