//! CLI configuration: optional TOML file, then `FILEREG_*` environment
//! variables, then command-line overrides applied by the caller.

use anyhow::{Context, Result};
use config::{Config, File as ConfigFile};
use filereg_registry::{Identity, PublicMatch};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "filereg.toml";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_format: String,
    pub public_match: PublicMatch,
    pub identity: Option<Identity>,
}

impl AppConfig {
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix("FILEREG"));
        let config = builder.build().context("failed to build configuration")?;

        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let db_path = get_string_value(config, &["db_path"])
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let log_level = get_string_value(config, &["log_level"])
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let log_format = get_string_value(config, &["log_format"])
            .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string());

        let public_match = match get_string_value(config, &["public_match"]) {
            Some(value) => value.parse::<PublicMatch>().map_err(anyhow::Error::msg)?,
            None => PublicMatch::default(),
        };

        let identity = get_string_value(config, &["identity"])
            .map(|value| {
                value
                    .parse::<Identity>()
                    .with_context(|| format!("invalid configured identity {value}"))
            })
            .transpose()?;

        Ok(Self {
            db_path,
            log_level,
            log_format,
            public_match,
            identity,
        })
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("filereg").join("db"))
        .unwrap_or_else(|| PathBuf::from("./data/filereg"))
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_values_are_read() {
        let admin = Identity::derive(b"admin");
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(file, "db_path = \"/tmp/filereg-test\"").unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();
        writeln!(file, "public_match = \"exact_token\"").unwrap();
        writeln!(file, "identity = \"{}\"", admin.encode()).unwrap();

        let config = Config::builder()
            .add_source(ConfigFile::from(file.path()))
            .build()
            .unwrap();
        let app = AppConfig::from_config(&config).unwrap();

        assert_eq!(app.db_path, PathBuf::from("/tmp/filereg-test"));
        assert_eq!(app.log_level, "debug");
        assert_eq!(app.log_format, DEFAULT_LOG_FORMAT);
        assert_eq!(app.public_match, PublicMatch::ExactToken);
        assert_eq!(app.identity, Some(admin));
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::builder().build().unwrap();
        let app = AppConfig::from_config(&config).unwrap();
        assert_eq!(app.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(app.public_match, PublicMatch::Substring);
        assert_eq!(app.identity, None);
    }

    #[test]
    fn test_bad_identity_is_an_error() {
        let config = Config::builder()
            .set_override("identity", "not-an-identity")
            .unwrap()
            .build()
            .unwrap();
        assert!(AppConfig::from_config(&config).is_err());
    }

    #[test]
    fn test_missing_override_file_is_an_error() {
        let missing = Path::new("/nonexistent/filereg.toml");
        assert!(AppConfig::load(Some(missing)).is_err());
    }
}
