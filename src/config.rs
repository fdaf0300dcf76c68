//! Runtime settings: a JSON file plus environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::auth::OAuthSettings;
use crate::error::{ReportError, ReportResult};
use crate::fonts::FONTS_DIR_ENV;
use crate::scores::FinalScorePolicy;

/// Path of the settings file. When unset, [`DEFAULT_CONFIG_FILE`] is read if it exists.
pub const CONFIG_ENV: &str = "SCHOOL_REPORT_CONFIG";
pub const API_URL_ENV: &str = "SCHOOL_REPORT_API_URL";
pub const DEFAULT_CONFIG_FILE: &str = "school-report.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_OUTPUT_DIR: &str = "reports";
const DEFAULT_CREDENTIALS_FILE: &str = ".school-report/credentials.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub oauth: OAuthSettings,
    /// JSON file holding the stored credentials.
    pub credentials_path: PathBuf,
    /// Directory that downloaded reports are written to.
    pub output_dir: PathBuf,
    pub fonts_dir: Option<PathBuf>,
    pub final_score: FinalScorePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            oauth: OAuthSettings::default(),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            fonts_dir: None,
            final_score: FinalScorePolicy::default(),
        }
    }
}

impl Settings {
    /// Reads the settings file named by [`CONFIG_ENV`] (which must exist when set), or the
    /// default file when present, then applies environment overrides.
    pub fn load() -> ReportResult<Self> {
        let mut settings = match env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No {DEFAULT_CONFIG_FILE} found; using default settings");
                    Self::default()
                }
            }
        };
        settings.apply_overrides(|key| env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> ReportResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ReportError::Config(format!("cannot read settings file {}: {err}", path.display()))
        })?;
        let settings = Self::from_json(&contents).map_err(|err| {
            ReportError::Config(format!("invalid settings file {}: {err}", path.display()))
        })?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(contents: &str) -> ReportResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Applies [`API_URL_ENV`] and the font directory variable from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_blank(API_URL_ENV) {
            debug!("{API_URL_ENV} overrides the API base URL");
            self.api_base_url = url.trim().to_string();
        }
        if let Some(dir) = non_blank(FONTS_DIR_ENV) {
            self.fonts_dir = Some(PathBuf::from(dir.trim()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_object_yields_defaults() {
        let settings = Settings::from_json("{}").expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.final_score, FinalScorePolicy::LeaveEmpty);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_json(
            r#"{
                "api_base_url": "https://school.example.com/api",
                "oauth": { "client_id": "abc" },
                "final_score": { "mode": "provisional", "max_offset": 5 }
            }"#,
        )
        .expect("settings");

        assert_eq!(settings.api_base_url, "https://school.example.com/api");
        assert_eq!(settings.oauth.client_id, "abc");
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(
            settings.final_score,
            FinalScorePolicy::Provisional { max_offset: 5 }
        );
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            (API_URL_ENV, "http://override/api"),
            (FONTS_DIR_ENV, "  "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(settings.api_base_url, "http://override/api");
        assert_eq!(settings.fonts_dir, None);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = Settings::from_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ReportError::Config(_))));
    }
}
