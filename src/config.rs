use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration loaded from a TOML file and `PULSE_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Project used when a dashboard request names none.
    #[serde(default = "default_project")]
    pub default_project: String,
    /// Hosts allowed to send events. Empty accepts any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Dashboard origin for CORS on the dashboard routes.
    /// If not set, those routes are same-origin only.
    #[serde(default)]
    pub dashboard_origin: Option<String>,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub log_json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_project() -> String {
    "scalable-web-solutions".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            default_project: default_project(),
            allowed_origins: Vec::new(),
            dashboard_origin: None,
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `PULSE_HOST` → host
    /// - `PULSE_PORT` → port
    /// - `PULSE_DATA_DIR` → data_dir
    /// - `PULSE_DEFAULT_PROJECT` → default_project
    /// - `PULSE_ALLOWED_ORIGINS` → allowed_origins (comma separated)
    /// - `PULSE_DASHBOARD_ORIGIN` → dashboard_origin
    /// - `PULSE_LOG_JSON` → log_json
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        if let Ok(host) = std::env::var("PULSE_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("PULSE_PORT") {
            match port.parse() {
                Ok(p) => config.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PULSE_PORT"),
            }
        }
        if let Ok(data_dir) = std::env::var("PULSE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(project) = std::env::var("PULSE_DEFAULT_PROJECT") {
            config.default_project = project;
        }
        if let Ok(origins) = std::env::var("PULSE_ALLOWED_ORIGINS") {
            config.allowed_origins = split_list(&origins);
        }
        if let Ok(origin) = std::env::var("PULSE_DASHBOARD_ORIGIN") {
            config.dashboard_origin = Some(origin).filter(|o| !o.is_empty());
        }
        if let Ok(val) = std::env::var("PULSE_LOG_JSON") {
            config.log_json = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Path of the DuckDB database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("pulse.duckdb")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// `Config::load` reads process-wide environment variables; tests that
    /// call it hold this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.default_project, "scalable-web-solutions");
        assert!(config.allowed_origins.is_empty());
        assert!(config.dashboard_origin.is_none());
        assert!(!config.log_json);
    }

    #[test]
    fn test_load_from_toml() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("pulse.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"
host = "127.0.0.1"
port = 9000
data_dir = "/var/lib/pulse"
default_project = "acme"
allowed_origins = ["acme.test", "www.acme.test"]
dashboard_origin = "https://crm.acme.test"
log_json = true
"#
        )
        .unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/pulse"));
        assert_eq!(config.default_project, "acme");
        assert_eq!(config.allowed_origins, vec!["acme.test", "www.acme.test"]);
        assert_eq!(
            config.dashboard_origin.as_deref(),
            Some("https://crm.acme.test")
        );
        assert!(config.log_json);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = Config::load(Some(Path::new("/nonexistent/pulse.toml")));
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_invalid_toml_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("pulse.toml");
        std::fs::write(&config_path, "port = [not valid").unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_database_path() {
        let config = Config {
            data_dir: PathBuf::from("/srv/pulse"),
            ..Config::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/srv/pulse/pulse.duckdb"));
    }

    #[test]
    fn test_env_var_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        let orig_port = std::env::var("PULSE_PORT").ok();
        let orig_origins = std::env::var("PULSE_ALLOWED_ORIGINS").ok();

        std::env::set_var("PULSE_PORT", "3000");
        std::env::set_var("PULSE_ALLOWED_ORIGINS", "acme.test, ,shop.acme.test");
        let config = Config::load(None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.allowed_origins, vec!["acme.test", "shop.acme.test"]);

        match orig_port {
            Some(v) => std::env::set_var("PULSE_PORT", v),
            None => std::env::remove_var("PULSE_PORT"),
        }
        match orig_origins {
            Some(v) => std::env::set_var("PULSE_ALLOWED_ORIGINS", v),
            None => std::env::remove_var("PULSE_ALLOWED_ORIGINS"),
        }
    }
}
