use std::{collections::HashMap, fs, path::Path, time::Duration};

use client_core::DEFAULT_PAGE_SIZE;
use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "docshare.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub api_token: Option<String>,
    pub database_url: String,
    pub page_size: usize,
    pub app_name: String,
    pub cloud_hosted: bool,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            api_token: None,
            database_url: "sqlite://./data/docshare.db".into(),
            page_size: DEFAULT_PAGE_SIZE,
            app_name: "Docshare".into(),
            cloud_hosted: false,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn set(&mut self, key: &str, value: &str) {
        match key {
            "server_url" => self.server_url = value.to_string(),
            "api_token" => {
                self.api_token = Some(value.to_string()).filter(|token| !token.is_empty())
            }
            "database_url" => self.database_url = value.to_string(),
            "page_size" => match value.parse::<usize>() {
                Ok(parsed) if parsed > 0 => self.page_size = parsed,
                _ => warn!(key, value, "ignoring invalid page size"),
            },
            "app_name" => self.app_name = value.to_string(),
            "cloud_hosted" => self.cloud_hosted = matches!(value, "true" | "1" | "yes"),
            "request_timeout_secs" => match value.parse::<u64>() {
                Ok(parsed) => self.request_timeout_secs = parsed,
                Err(_) => warn!(key, value, "ignoring invalid request timeout"),
            },
            _ => {}
        }
    }
}

const KEYS: [&str; 7] = [
    "server_url",
    "api_token",
    "database_url",
    "page_size",
    "app_name",
    "cloud_hosted",
    "request_timeout_secs",
];

/// Defaults, then `docshare.toml` in the working directory, then the
/// environment. `APP__*` wins over `DOCSHARE_*`.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_overrides(&mut settings, &raw);
    }

    for key in KEYS {
        let upper = key.to_ascii_uppercase();
        if let Some(v) = env(&format!("DOCSHARE_{upper}")) {
            settings.set(key, &v);
        }
        if let Some(v) = env(&format!("APP__{upper}")) {
            settings.set(key, &v);
        }
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(file_cfg) => {
            for key in KEYS {
                if let Some(v) = file_cfg.get(key) {
                    settings.set(key, v);
                }
            }
        }
        Err(err) => warn!(error = %err, "ignoring unreadable settings file"),
    }
}

/// Accepts bare file paths and `sqlite:` urls and returns a `sqlite://` url.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(
            normalize_database_url("./data/test.db"),
            "sqlite://./data/test.db"
        );
        assert_eq!(
            normalize_database_url("sqlite:data\\test.db"),
            "sqlite://data/test.db"
        );
        assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_database_url("  "),
            Settings::default().database_url
        );
    }

    #[tokio::test]
    async fn normalized_path_opens_storage_in_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("nested").join("docshare.db");

        let url = normalize_database_url(&db.display().to_string());
        assert!(url.starts_with("sqlite://"));
        storage::Storage::new(&url).await.expect("storage");

        assert!(db.exists());
    }

    #[test]
    fn missing_file_and_env_yield_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings_from(&dir.path().join(SETTINGS_FILE), no_env);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            r#"
server_url = "https://docs.example.com"
page_size = "10"
cloud_hosted = "true"
app_name = "Acme Docs"
"#,
        )
        .expect("write settings");

        let settings = load_settings_from(&path, no_env);
        assert_eq!(settings.server_url, "https://docs.example.com");
        assert_eq!(settings.page_size, 10);
        assert!(settings.cloud_hosted);
        assert_eq!(settings.app_name, "Acme Docs");
    }

    #[test]
    fn app_env_wins_over_prefixed_env_and_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "server_url = \"https://file.example.com\"\n").expect("write settings");

        let settings = load_settings_from(&path, |name| match name {
            "DOCSHARE_SERVER_URL" => Some("https://docshare.example.com".into()),
            "APP__SERVER_URL" => Some("https://app.example.com".into()),
            "DOCSHARE_API_TOKEN" => Some("token-1".into()),
            _ => None,
        });
        assert_eq!(settings.server_url, "https://app.example.com");
        assert_eq!(settings.api_token.as_deref(), Some("token-1"));
    }

    #[test]
    fn invalid_numbers_keep_previous_value() {
        let settings = load_settings_from(Path::new("/nonexistent/docshare.toml"), |name| {
            match name {
                "DOCSHARE_PAGE_SIZE" => Some("0".into()),
                "DOCSHARE_REQUEST_TIMEOUT_SECS" => Some("soon".into()),
                _ => None,
            }
        });
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.request_timeout_secs, 30);
    }
}
