use crate::config::Config;
use crate::error::ConfigError;

/// Rates accepted for `connection.default_baud`.
pub const STANDARD_BAUD_RATES: &[u32] = &[
    1_200, 2_400, 4_800, 9_600, 19_200, 38_400, 57_600, 115_200, 230_400,
];

/// Validate a [`Config`], returning every violation found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.connection.connect_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            field: "connection.connect_timeout_ms".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    if config.connection.close_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            field: "connection.close_timeout_ms".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    if !STANDARD_BAUD_RATES.contains(&config.connection.default_baud) {
        errors.push(ConfigError::Validation {
            field: "connection.default_baud".to_string(),
            message: format!("unsupported rate {}", config.connection.default_baud),
        });
    }

    if let Some(blank) = config.views.disabled.iter().find(|id| id.trim().is_empty()) {
        errors.push(ConfigError::Validation {
            field: "views.disabled".to_string(),
            message: format!("empty view type id {blank:?}"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_connect_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.connection.connect_timeout_ms = 0;
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].to_string().contains("connection.connect_timeout_ms"));
    }

    #[test]
    fn one_millisecond_timeouts_allowed() {
        let mut cfg = Config::default();
        cfg.connection.connect_timeout_ms = 1;
        cfg.connection.close_timeout_ms = 1;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn odd_baud_rejected() {
        let mut cfg = Config::default();
        cfg.connection.default_baud = 12_345;
        let errs = validate(&cfg).unwrap_err();
        assert!(errs[0].to_string().contains("12345"));
    }

    #[test]
    fn blank_disabled_id_rejected() {
        let mut cfg = Config::default();
        cfg.views.disabled = vec!["console".into(), "  ".into()];
        let errs = validate(&cfg).unwrap_err();
        assert!(errs[0].to_string().contains("views.disabled"));
    }

    #[test]
    fn multiple_errors_returned() {
        let mut cfg = Config::default();
        cfg.connection.connect_timeout_ms = 0;
        cfg.connection.close_timeout_ms = 0;
        cfg.connection.default_baud = 0;
        assert_eq!(validate(&cfg).unwrap_err().len(), 3);
    }
}
