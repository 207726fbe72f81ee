use crate::error::{HideError, Result};
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "XHIDE_";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Class (instance or class name) whose windows are kept unmapped.
    pub target_class: String,
    /// Also hide matching windows that were mapped before start.
    pub prescan: bool,
    /// X display to connect to; `None` uses `$DISPLAY`.
    #[serde(default)]
    pub display: Option<String>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_class: String::new(),
            prescan: false,
            display: None,
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "full".to_string(),
            },
        }
    }
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub prescan: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<CliLogging>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CliLogging {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Config {
    /// Layers defaults, `XHIDE_*` environment variables and command-line
    /// values, in that order of precedence.
    pub fn load(overrides: &CliOverrides) -> Result<Self> {
        let config: Config = Self::figment(overrides).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(overrides: &CliOverrides) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_class.is_empty() {
            return Err(HideError::InvalidConfig(
                "target class must not be empty".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(HideError::InvalidConfig(format!(
                    "unknown log level: {}",
                    other
                )))
            }
        }

        match self.logging.format.as_str() {
            "full" | "compact" => {}
            other => {
                return Err(HideError::InvalidConfig(format!(
                    "unknown log format: {}",
                    other
                )))
            }
        }

        Ok(())
    }
}
