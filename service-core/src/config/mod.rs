use config::{Config as Cfg, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Optional `configuration.*` file overlaid by `{prefix}__SECTION__KEY` variables.
pub fn layered(prefix: &str) -> ConfigBuilder<DefaultState> {
    Cfg::builder()
        .add_source(File::with_name("configuration").required(false))
        .add_source(Environment::with_prefix(prefix).separator("__"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults() {
        let config: Config = Cfg::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, "info");
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn overrides_take_precedence() {
        let config: Config = Cfg::builder()
            .set_override("port", 9090)
            .unwrap()
            .set_override("otlp_endpoint", "http://collector:4317")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
    }
}
