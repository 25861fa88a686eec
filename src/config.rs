#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow, bail};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::pipeline::DataPaths;
use crate::projection::ProjectionOptions;
use crate::youtube::DEFAULT_API_BASE;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_HARVEST_PORT: u16 = 8080;
pub const DEFAULT_HARVEST_HOST: &str = "127.0.0.1";
pub const DOCUMENT_DB_FILE: &str = "documents.db";
pub const RELATIONAL_DB_FILE: &str = "relational.db";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory holding both database files.
    pub data_root: PathBuf,
    /// Opaque credential; only harvesting needs it.
    pub youtube_api_key: Option<String>,
    pub youtube_api_base: String,
    pub harvest_host: String,
    pub harvest_port: u16,
    pub skip_first_video: bool,
}

impl RuntimeConfig {
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::from_root(&self.data_root)
    }

    pub fn projection_options(&self) -> ProjectionOptions {
        ProjectionOptions {
            skip_first_video: self.skip_first_video,
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.youtube_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("YOUTUBE_API_KEY not set; harvesting needs an API key"))
    }
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    resolve_runtime_config(RuntimeOverrides::default())
}

/// Values supplied explicitly (command-line flags); they win over everything.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub data_root: Option<PathBuf>,
    pub youtube_api_key: Option<String>,
    pub harvest_port: Option<u16>,
    pub harvest_host: Option<String>,
    pub skip_first_video: Option<bool>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_config(&file_vars, env_var_string, overrides)
}

fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeConfig> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let data_root = overrides
        .data_root
        .map(|path| path.to_string_lossy().into_owned())
        .and_then(non_blank)
        .or_else(|| lookup("DATA_ROOT"))
        .ok_or_else(|| anyhow!("DATA_ROOT not set"))?;
    let youtube_api_key = overrides
        .youtube_api_key
        .and_then(non_blank)
        .or_else(|| lookup("YOUTUBE_API_KEY"));
    let youtube_api_base = lookup("YOUTUBE_API_BASE")
        .map(|base| base.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let harvest_port = overrides
        .harvest_port
        .or_else(|| lookup("HARVEST_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_HARVEST_PORT);
    let harvest_host = overrides
        .harvest_host
        .and_then(non_blank)
        .or_else(|| lookup("HARVEST_HOST"))
        .unwrap_or_else(|| DEFAULT_HARVEST_HOST.to_string());
    let skip_first_video = match overrides.skip_first_video {
        Some(flag) => flag,
        None => match lookup("PROJECT_SKIP_FIRST_VIDEO") {
            Some(value) => parse_flag(&value)
                .with_context(|| "PROJECT_SKIP_FIRST_VIDEO".to_string())?,
            None => false,
        },
    };

    Ok(RuntimeConfig {
        data_root: PathBuf::from(data_root),
        youtube_api_key,
        youtube_api_base,
        harvest_host,
        harvest_port,
        skip_first_video,
    })
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

/// Process environment first, then the `.env` file.
fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

/// Parses `KEY=value` lines. Comments, `export` prefixes and matching quotes
/// are accepted; anything else without an `=` is ignored. A missing file is
/// an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;

    let vars = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, raw) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), unquote(raw.trim()).to_string()))
        })
        .collect();
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|inner| inner.strip_suffix(*quote))
        })
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> Result<RuntimeConfig> {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path())?;
        build_runtime_config(&vars, |_| None, RuntimeOverrides::default())
    }

    #[test]
    fn defaults_apply_when_only_data_root_is_set() {
        let config = config_from("DATA_ROOT=\"/data\"\n").unwrap();
        assert_eq!(config.data_root, PathBuf::from("/data"));
        assert_eq!(config.harvest_port, DEFAULT_HARVEST_PORT);
        assert_eq!(config.harvest_host, DEFAULT_HARVEST_HOST);
        assert_eq!(config.youtube_api_base, DEFAULT_API_BASE);
        assert!(config.youtube_api_key.is_none());
        assert!(!config.skip_first_video);
        let paths = config.data_paths();
        assert_eq!(paths.documents, PathBuf::from("/data/documents.db"));
        assert_eq!(paths.relational, PathBuf::from("/data/relational.db"));
    }

    #[test]
    fn missing_data_root_is_an_error() {
        let err = config_from("HARVEST_PORT=9000\n").unwrap_err();
        assert!(err.to_string().contains("DATA_ROOT"));
    }

    #[test]
    fn api_key_is_only_required_on_demand() {
        let config = config_from("DATA_ROOT=/d\n").unwrap();
        assert!(config.require_api_key().is_err());

        let config = config_from("DATA_ROOT=/d\nYOUTUBE_API_KEY=secret\n").unwrap();
        assert_eq!(config.require_api_key().unwrap(), "secret");
    }

    #[test]
    fn reads_port_host_base_and_flag() {
        let config = config_from(
            "DATA_ROOT=/d\nHARVEST_PORT=4242\nHARVEST_HOST=0.0.0.0\n\
             YOUTUBE_API_BASE=http://127.0.0.1:9/v3/\nPROJECT_SKIP_FIRST_VIDEO=yes\n",
        )
        .unwrap();
        assert_eq!(config.harvest_port, 4242);
        assert_eq!(config.harvest_host, "0.0.0.0");
        assert_eq!(config.youtube_api_base, "http://127.0.0.1:9/v3");
        assert!(config.projection_options().skip_first_video);
    }

    #[test]
    fn invalid_flag_is_rejected_but_invalid_port_defaults() {
        assert!(config_from("DATA_ROOT=/d\nPROJECT_SKIP_FIRST_VIDEO=maybe\n").is_err());
        let config = config_from("DATA_ROOT=/d\nHARVEST_PORT=nope\n").unwrap();
        assert_eq!(config.harvest_port, DEFAULT_HARVEST_PORT);
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export DATA_ROOT="/data"
            YOUTUBE_API_KEY='key'
            HARVEST_HOST =  "0.0.0.0"
            HARVEST_PORT=9090
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("DATA_ROOT").unwrap(), "/data");
        assert_eq!(vars.get("YOUTUBE_API_KEY").unwrap(), "key");
        assert_eq!(vars.get("HARVEST_HOST").unwrap(), "0.0.0.0");
        assert_eq!(vars.get("HARVEST_PORT").unwrap(), "9090");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn override_beats_env_beats_file() {
        let mut vars = HashMap::new();
        vars.insert("DATA_ROOT".to_string(), "/file-data".to_string());
        vars.insert("YOUTUBE_API_KEY".to_string(), "file-key".to_string());
        vars.insert("HARVEST_HOST".to_string(), "file-host".to_string());
        vars.insert("HARVEST_PORT".to_string(), "7000".to_string());
        vars.insert("PROJECT_SKIP_FIRST_VIDEO".to_string(), "true".to_string());

        let overrides = RuntimeOverrides {
            data_root: Some(PathBuf::from("/override-data")),
            harvest_port: Some(9000),
            skip_first_video: Some(false),
            ..RuntimeOverrides::default()
        };

        let config = build_runtime_config(
            &vars,
            |key| match key {
                "YOUTUBE_API_KEY" => Some("env-key".to_string()),
                "HARVEST_PORT" => Some("8000".to_string()),
                _ => None,
            },
            overrides,
        )
        .unwrap();

        assert_eq!(config.data_root, PathBuf::from("/override-data"));
        assert_eq!(config.youtube_api_key.as_deref(), Some("env-key"));
        assert_eq!(config.harvest_port, 9000);
        assert_eq!(config.harvest_host, "file-host");
        assert!(!config.skip_first_video);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let vars = read_env_file(make_config("DATA_ROOT=/d\nHARVEST_HOST=\"  \"\n").path()).unwrap();
        let config = build_runtime_config(
            &vars,
            |_| None,
            RuntimeOverrides {
                harvest_host: Some("   ".into()),
                youtube_api_key: Some(String::new()),
                ..RuntimeOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.harvest_host, DEFAULT_HARVEST_HOST);
        assert!(config.youtube_api_key.is_none());
    }
}
