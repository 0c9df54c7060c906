//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * identity keys and secrets (non-empty, unique case-insensitively)
//!   * exchange endpoint url and timeout
//!   * retry / metrics path / server / logging invariants

use std::collections::HashMap;
use tracing::{error, info};

use crate::config::identities::{IdentityConfig, ServiceConfig};
use crate::config::settings::{ExchangeConfig, RetryConfig, SettingsConfig};
use crate::resilience::retry::RetrySettings;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_identities(&cfg.identities, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }

    validate_exchange("settings.exchange", &settings.exchange, errors);

    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(attempts) = retry.attempts {
        if attempts == 0 {
            errors.push(format!("{}.attempts must be > 0", path));
        }
    }
    // compare what the exchange will actually run with, defaults included
    let resolved = RetrySettings::from(Some(retry));
    if resolved.max_delay_ms < resolved.base_delay_ms {
        errors.push(format!(
            "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
            path, resolved.max_delay_ms, resolved.base_delay_ms
        ));
    }
}

fn validate_exchange(path: &str, exchange: &ExchangeConfig, errors: &mut Vec<String>) {
    let url = exchange.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("{}.url '{}' must be an http(s) url", path, exchange.url));
    }
    if exchange.timeout_ms == 0 {
        errors.push(format!("{}.timeout_ms must be > 0", path));
    }
}

/// IDENTITIES VALIDATION
fn validate_identities(identities: &[IdentityConfig], errors: &mut Vec<String>) {
    // folded key -> first position
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (idx, identity) in identities.iter().enumerate() {
        if identity.key.trim().is_empty() {
            errors.push(format!("identities[{}].key must not be empty", idx));
        }
        if identity.secret.is_empty() {
            errors.push(format!("identities[{}].secret must not be empty", idx));
        }
        if let Some(prev) = seen.insert(identity.key.to_ascii_lowercase(), idx) {
            errors.push(format!(
                "identities[{}] and identities[{}] are duplicate keys '{}' (keys are case-insensitive)",
                prev, idx, identity.key
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{LoggingConfig, MetricsConfig, ServerConfig};

    fn settings() -> SettingsConfig {
        SettingsConfig {
            retry: None,
            metrics: MetricsConfig::default(),
            server: ServerConfig::default(),
            logging: Some(LoggingConfig::default()),
            exchange: ExchangeConfig { url: "https://authority/token".into(), timeout_ms: 1000 },
        }
    }

    fn identity(key: &str, secret: &str) -> IdentityConfig {
        IdentityConfig { key: key.into(), secret: secret.into(), name: None }
    }

    #[test]
    fn valid_config_passes() {
        let cfg = ServiceConfig {
            settings: settings(),
            identities: vec![identity("a", "s"), identity("b", "s")],
        };
        assert!(validate_service_config(&cfg).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut settings = settings();
        settings.retry = Some(RetryConfig { attempts: Some(0), base_delay_ms: Some(500), max_delay_ms: Some(100) });
        settings.metrics.path = "metrics".into();
        settings.server.port = "http".into();
        settings.logging = Some(LoggingConfig::new("loud".into(), crate::config::settings::LogFormat::Json));

        let cfg = ServiceConfig {
            settings,
            identities: vec![identity("", "s"), identity("App", "s"), identity("APP", "")],
        };
        let errors = validate_service_config(&cfg).unwrap_err();

        assert_eq!(errors.len(), 8, "{:#?}", errors);
        assert!(errors.iter().any(|e| e.contains("duplicate keys 'APP'")));
        assert!(errors.iter().any(|e| e.contains("max_delay_ms")));
    }

    #[test]
    fn retry_delays_are_checked_against_defaults() {
        let mut settings = settings();
        settings.retry = Some(RetryConfig { attempts: None, base_delay_ms: Some(5000), max_delay_ms: None });
        let cfg = ServiceConfig { settings, identities: vec![identity("a", "s")] };

        let errors = validate_service_config(&cfg).unwrap_err();

        assert_eq!(errors.len(), 1, "{:#?}", errors);
        assert!(errors[0].contains("max_delay_ms (1000) must be >= base_delay_ms (5000)"));

        let mut settings = self::settings();
        settings.retry = Some(RetryConfig { attempts: None, base_delay_ms: None, max_delay_ms: Some(50) });
        let cfg = ServiceConfig { settings, identities: vec![identity("a", "s")] };
        assert!(validate_service_config(&cfg).is_err());
    }
}
