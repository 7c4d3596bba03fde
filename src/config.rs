use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SetApiError;

pub const CONFIG_FILE_NAME: &str = "setapi.json";
pub const CONFIG_ENV: &str = "KB_DEPLOYMENT_CONFIG";
pub const TOKEN_ENV: &str = "KB_AUTH_TOKEN";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(rename = "workspace-url", default)]
    pub workspace_url: Option<String>,
    #[serde(rename = "kbase-endpoint", default)]
    pub kbase_endpoint: Option<String>,
    #[serde(rename = "search-url", default)]
    pub search_url: Option<String>,
    #[serde(rename = "timeout-secs", default)]
    pub timeout_secs: Option<u64>,
    #[serde(rename = "git-commit-hash", default)]
    pub git_commit_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub workspace_url: String,
    pub search_url: Option<String>,
    pub timeout: Option<Duration>,
    pub git_commit_hash: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SetApiError> {
        let from_env = std::env::var(CONFIG_ENV).ok();
        let config_path =
            Self::locate(path, from_env.as_deref()).ok_or(SetApiError::MissingConfig)?;
        Self::load(&config_path)
    }

    pub fn locate(explicit: Option<&str>, from_env: Option<&str>) -> Option<Utf8PathBuf> {
        if let Some(path) = explicit {
            return Some(Utf8PathBuf::from(path));
        }
        if let Some(path) = from_env.filter(|path| !path.trim().is_empty()) {
            return Some(Utf8PathBuf::from(path));
        }
        let local = Utf8PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|path| path.exists())
    }

    pub fn user_config_path() -> Option<Utf8PathBuf> {
        let dirs = ProjectDirs::from("us", "kbase", "setapi")?;
        Utf8PathBuf::from_path_buf(dirs.config_dir().join(CONFIG_FILE_NAME)).ok()
    }

    pub fn load(path: &Utf8Path) -> Result<ResolvedConfig, SetApiError> {
        let content =
            fs::read_to_string(path).map_err(|_| SetApiError::ConfigRead(path.to_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SetApiError::ConfigParse(err.to_string()))?;
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SetApiError> {
        let endpoint = config
            .kbase_endpoint
            .as_deref()
            .map(|endpoint| endpoint.trim().trim_end_matches('/'))
            .filter(|endpoint| !endpoint.is_empty());
        let search_url = match config.search_url {
            Some(url) if !url.trim().is_empty() => Some(url.trim().to_string()),
            _ => endpoint.map(|endpoint| format!("{endpoint}/searchapi2/rpc")),
        };
        let workspace_url = match (config.workspace_url, endpoint) {
            (Some(url), _) if !url.trim().is_empty() => url.trim().to_string(),
            (_, Some(endpoint)) => format!("{endpoint}/ws"),
            _ => {
                return Err(SetApiError::ConfigParse(
                    "one of \"workspace-url\" or \"kbase-endpoint\" is required".to_string(),
                ));
            }
        };

        Ok(ResolvedConfig {
            workspace_url,
            search_url,
            timeout: config.timeout_secs.map(Duration::from_secs),
            git_commit_hash: config
                .git_commit_hash
                .filter(|hash| !hash.trim().is_empty()),
        })
    }
}

pub fn auth_token() -> Option<String> {
    std::env::var(TOKEN_ENV)
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
