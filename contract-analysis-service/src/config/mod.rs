use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

/// Default DashScope API root; the generation path is appended by the provider.
pub const DEFAULT_DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

pub const DEFAULT_MODEL: &str = "qwen-turbo";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub common: core_config::Config,
    pub dashscope: DashScopeSettings,
}

#[derive(Debug, Clone)]
pub struct DashScopeSettings {
    /// Bearer token for DashScope. Empty means "not configured".
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl DashScopeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }
}

impl AnalysisConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production();

        let dashscope = DashScopeSettings {
            // Never fall back to a baked-in key: outside prod an empty key is
            // tolerated and every analysis fails closed.
            api_key: SecretString::new(get_env("TONGYI_API_KEY", Some(""), is_prod)?),
            base_url: get_env("DASHSCOPE_BASE_URL", Some(DEFAULT_DASHSCOPE_BASE_URL), false)?,
            model: get_env("DASHSCOPE_MODEL", Some(DEFAULT_MODEL), false)?,
            timeout_secs: parse_timeout_secs(&get_env(
                "DASHSCOPE_TIMEOUT_SECS",
                Some(&DEFAULT_TIMEOUT_SECS.to_string()),
                false,
            )?),
        };

        if is_prod && !dashscope.has_api_key() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TONGYI_API_KEY is set but empty"
            )));
        }

        if !dashscope.has_api_key() {
            tracing::warn!("TONGYI_API_KEY not set; analysis requests will fail");
        }

        Ok(AnalysisConfig { common, dashscope })
    }
}

/// Zero or unparsable values fall back to the default.
fn parse_timeout_secs(raw: &str) -> u64 {
    match raw.trim().parse() {
        Ok(secs) if secs > 0 => secs,
        _ => {
            tracing::warn!(value = raw, "Invalid DASHSCOPE_TIMEOUT_SECS, using default");
            DEFAULT_TIMEOUT_SECS
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn settings(key: &str) -> DashScopeSettings {
        DashScopeSettings {
            api_key: SecretString::new(key.to_string()),
            base_url: DEFAULT_DASHSCOPE_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        assert!(!settings("").has_api_key());
        assert!(!settings("   ").has_api_key());
        assert!(settings("sk-test").has_api_key());
    }

    #[test]
    fn api_key_is_redacted_in_debug_output() {
        let rendered = format!("{:?}", settings("sk-very-secret"));
        assert!(!rendered.contains("sk-very-secret"));
    }

    #[test]
    fn timeout_uses_seconds() {
        assert_eq!(settings("k").timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_optional_env_uses_default() {
        let value = get_env("CONTRACT_ANALYSIS_UNSET_FOR_TEST", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn missing_env_fails_in_production() {
        let err = get_env("CONTRACT_ANALYSIS_UNSET_FOR_TEST", Some("fallback"), true).unwrap_err();
        assert!(err.to_string().contains("required in production"));
    }

    #[test]
    fn zero_or_garbage_timeout_uses_default() {
        assert_eq!(parse_timeout_secs("0"), DEFAULT_TIMEOUT_SECS);
        assert_eq!(parse_timeout_secs("soon"), DEFAULT_TIMEOUT_SECS);
        assert_eq!(parse_timeout_secs(""), DEFAULT_TIMEOUT_SECS);
        assert_eq!(parse_timeout_secs(" 45 "), 45);
    }

    // `load()` reads process-wide env vars; serialize the tests that set them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn load_with(environment: &str, api_key: Option<&str>) -> Result<AnalysisConfig, AppError> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        env::set_var("APP__ENVIRONMENT", environment);
        match api_key {
            Some(key) => env::set_var("TONGYI_API_KEY", key),
            None => env::remove_var("TONGYI_API_KEY"),
        }
        env::set_var("DASHSCOPE_TIMEOUT_SECS", "0");

        let result = AnalysisConfig::load();

        env::remove_var("APP__ENVIRONMENT");
        env::remove_var("TONGYI_API_KEY");
        env::remove_var("DASHSCOPE_TIMEOUT_SECS");
        result
    }

    #[test]
    fn load_fails_in_prod_with_empty_key() {
        let err = load_with("prod", Some("")).unwrap_err();
        assert!(err.to_string().contains("TONGYI_API_KEY"));
    }

    #[test]
    fn load_fails_in_prod_without_key() {
        for environment in ["prod", "production"] {
            let err = load_with(environment, None).unwrap_err();
            assert!(err.to_string().contains("required in production"));
        }
    }

    #[test]
    fn load_tolerates_missing_key_outside_prod() {
        let config = load_with("dev", None).unwrap();

        assert!(!config.dashscope.has_api_key());
        assert!(!config.common.is_production());
        assert_eq!(config.dashscope.model, DEFAULT_MODEL);
        assert_eq!(config.dashscope.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn load_accepts_key_in_production() {
        let config = load_with("production", Some("sk-prod")).unwrap();

        assert!(config.common.is_production());
        assert!(config.dashscope.has_api_key());
    }
}
