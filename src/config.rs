//! Configuration management.
//!
//! A single `Settings` struct is built once at process start from
//! environment variables (after `.env` loading in `main`) and passed by
//! reference into each component. Component logic never reads ambient
//! environment state itself.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::portal::PortalConfig;

/// Default per-stage timeout in seconds (1 hour).
///
/// Portal interaction dominates run time; a stage that exceeds this is
/// assumed hung and the run is failed.
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 3600;

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory that receives per-run subdirectories with all output files.
    pub output_dir: PathBuf,
    /// Path to the Japan Post KEN_ALL.CSV reference dataset (Shift_JIS).
    pub ken_all_path: PathBuf,
    /// Language model client configuration.
    pub llm: LlmConfig,
    /// Registry portal automation configuration.
    pub portal: PortalConfig,
    /// Upper bound for any single pipeline stage.
    pub stage_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            ken_all_path: PathBuf::from("./data/KEN_ALL.CSV"),
            llm: LlmConfig::default(),
            portal: PortalConfig::default(),
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Build settings from environment variables.
    ///
    /// Variable names match the original deployment: `OUTPUT_DIR`,
    /// `KEN_ALL_CSV_PATH`, `OPENAI_API_KEY`, `REGISTRY_USERNAME`,
    /// `REGISTRY_PASSWORD`. Missing variables fall back to defaults;
    /// missing credentials surface later as an authentication failure.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(dir) = env::var("OUTPUT_DIR") {
            settings.output_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("KEN_ALL_CSV_PATH") {
            settings.ken_all_path = PathBuf::from(path);
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings.llm.api_key = key;
        }
        if let Ok(endpoint) = env::var("LLM_ENDPOINT") {
            settings.llm.endpoint = endpoint;
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            settings.llm.model = model;
        }

        if let Ok(user) = env::var("REGISTRY_USERNAME") {
            settings.portal.username = user;
        }
        if let Ok(pass) = env::var("REGISTRY_PASSWORD") {
            settings.portal.password = pass;
        }
        if let Ok(url) = env::var("REGISTRY_LOGIN_URL") {
            settings.portal.login_url = url;
        }
        if let Ok(headless) = env::var("PORTAL_HEADLESS") {
            settings.portal.headless = headless != "0" && headless != "false";
        }

        if let Ok(secs) = env::var("STAGE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                settings.stage_timeout = Duration::from_secs(secs);
            }
        }

        settings
    }

    /// Per-run working directory: `<output_dir>/<run_id>`.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.output_dir.join(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_deployment() {
        let settings = Settings::default();
        assert_eq!(settings.output_dir, PathBuf::from("./output"));
        assert_eq!(settings.ken_all_path, PathBuf::from("./data/KEN_ALL.CSV"));
        assert_eq!(settings.stage_timeout.as_secs(), 3600);
    }

    #[test]
    fn run_dir_is_namespaced_by_run_id() {
        let settings = Settings::default();
        assert_eq!(settings.run_dir("abc"), PathBuf::from("./output/abc"));
    }
}
