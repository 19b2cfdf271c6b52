use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for configuration overrides.
/// Nested keys are separated by a double underscore,
/// e.g. `VULNTRACK_STREAM__POLL_TIMEOUT_MS=250`.
pub const ENV_PREFIX: &str = "VULNTRACK_";

/// Load configuration from file with environment variable overrides.
///
/// A bare `PORT` variable overrides `server.port` last.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment_for(Figment::new().merge(Toml::file(path)))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn figment_for(base: Figment) -> Figment {
    base.merge(
        Env::prefixed(ENV_PREFIX)
            .ignore(&["CONFIG"])
            .split("__"),
    )
    .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[server]
port = 9000

[log]
format = "json"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.log.format, crate::config::LogFormat::Json);
    }

    #[test]
    fn test_load_config_from_str_project_missing_fields() {
        let toml = r#"
[projects.sec]
name = "Security"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_from_str_unknown_backend() {
        let toml = r#"
[stream]
backend = "carrier-pigeon"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[database]
path = "/tmp/tickets.db"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.database.path.to_str().unwrap(), "/tmp/tickets.db");
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[stream]
topic = "findings-v0"
"#,
            )?;
            jail.set_env("VULNTRACK_STREAM__POLL_TIMEOUT_MS", "250");
            jail.set_env("PORT", "9999");

            let config = load_config(Path::new("config.toml")).unwrap();
            assert_eq!(config.stream.poll_timeout_ms, 250);
            assert_eq!(config.stream.topic, "findings-v0");
            assert_eq!(config.server.port, 9999);
            Ok(())
        });
    }
}
