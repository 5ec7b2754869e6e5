use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::{filter, prelude::*};

// default name (fixed)
const APP_SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub app_name: Option<String>,
    pub level: Option<String>,
    pub file_name: Option<String>,
    pub file_dir: Option<String>,
    #[serde(default)]
    pub use_json: bool,
    #[serde(default = "default_use_stdout")]
    pub use_stdout: bool,
}

fn default_use_stdout() -> bool {
    true
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self {
            app_name: None,
            level: None,
            file_name: None,
            file_dir: None,
            use_json: false,
            use_stdout: true,
        }
    }

    fn level(&self) -> tracing::Level {
        self.level
            .as_deref()
            .and_then(|lv| tracing::Level::from_str(lv).ok())
            .unwrap_or(tracing::Level::INFO)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `LOG_LEVEL`, `LOG_FILE_NAME`, `LOG_FILE_DIR`, `LOG_USE_JSON`, `LOG_USE_STDOUT`
pub fn load_tracing_config_from_env() -> Result<LoggingConfig> {
    envy::prefixed("LOG_")
        .from_env::<LoggingConfig>()
        .context("cannot read logging config from env:")
}

pub fn tracing_init(conf: LoggingConfig) -> Result<()> {
    let subscriber = setup_layer_from_logging_config(&conf)?;
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    tracing::debug!(
        "logging initialized for {}",
        conf.app_name.as_deref().unwrap_or(APP_SERVICE_NAME)
    );
    Ok(())
}

pub fn tracing_init_from_env() -> Result<()> {
    match load_tracing_config_from_env() {
        Ok(conf) => tracing_init(conf),
        Err(e) => {
            tracing::warn!("failed to load logging config from env: {:?}", e);
            Err(e)
        }
    }
}

fn create_log_file(conf: &LoggingConfig) -> Result<Option<File>> {
    let Some(file_name) = conf.file_name.as_deref() else {
        return Ok(None);
    };
    let dir = match conf.file_dir.as_deref() {
        Some(d) => PathBuf::from(d),
        None => env::current_dir().context("resolve current directory")?,
    };
    std::fs::create_dir_all(&dir).context("create log file directory:")?;
    let file = File::create(dir.join(file_name))
        .with_context(|| format!("create log file to {:?}:", dir.join(file_name)))?;
    Ok(Some(file))
}

pub fn setup_layer_from_logging_config(
    conf: &LoggingConfig,
) -> Result<Box<dyn Subscriber + Send + Sync + 'static>> {
    let lv = conf.level();
    let filter = filter::Targets::new().with_default(lv);
    // RUST_LOG narrows further; without it the configured level applies
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::from_level(lv).into())
        .from_env_lossy();

    let (json_file, text_file) = match create_log_file(conf)? {
        Some(f) if conf.use_json => (Some(f), None),
        Some(f) => (None, Some(f)),
        None => (None, None),
    };

    let subscriber = Box::new(
        tracing_subscriber::registry()
            .with(filter)
            .with(env_filter)
            .with(json_file.map(|f| {
                Layer::new()
                    .with_writer(f.with_max_level(lv))
                    .with_ansi(false)
                    .json()
            }))
            .with(text_file.map(|f| {
                Layer::new()
                    .with_writer(f.with_max_level(lv))
                    .with_ansi(false)
            }))
            .with(if !conf.use_json && conf.use_stdout {
                Some(tracing_subscriber::fmt::layer().pretty())
            } else {
                None
            })
            .with(if conf.use_json && conf.use_stdout {
                Some(tracing_subscriber::fmt::layer().json())
            } else {
                None
            }),
    );
    Ok(subscriber)
}

// for simple stdout logging
pub fn tracing_init_test(level: tracing::Level) {
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let conf = LoggingConfig::default();
        assert!(conf.use_stdout);
        assert!(!conf.use_json);
        assert_eq!(conf.level(), tracing::Level::INFO);
    }

    #[test]
    fn test_logging_level_parse() {
        let conf = LoggingConfig {
            level: Some("debug".to_string()),
            ..LoggingConfig::new()
        };
        assert_eq!(conf.level(), tracing::Level::DEBUG);

        let conf = LoggingConfig {
            level: Some("chatty".to_string()),
            ..LoggingConfig::new()
        };
        assert_eq!(conf.level(), tracing::Level::INFO);
    }

    #[test]
    fn test_logging_config_from_vars() {
        let vars = vec![
            ("LOG_LEVEL".to_string(), "warn".to_string()),
            ("LOG_USE_JSON".to_string(), "true".to_string()),
        ];
        let conf: LoggingConfig = envy::prefixed("LOG_").from_iter(vars).unwrap();
        assert_eq!(conf.level(), tracing::Level::WARN);
        assert!(conf.use_json);
        assert!(conf.use_stdout);
    }

    #[test]
    fn test_file_logging_writes_events() {
        let dir = tempfile::tempdir().unwrap();
        let conf = LoggingConfig {
            file_name: Some("chunker.log".to_string()),
            file_dir: Some(dir.path().to_string_lossy().to_string()),
            use_stdout: false,
            ..LoggingConfig::new()
        };
        let subscriber = setup_layer_from_logging_config(&conf).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("page 1 could not be decoded");
        });

        let written = std::fs::read_to_string(dir.path().join("chunker.log")).unwrap();
        assert!(written.contains("page 1 could not be decoded"));
    }
}
