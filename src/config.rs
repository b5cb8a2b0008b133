use crate::core::index::ViewMode;
use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Remote host the iptables commands are sent to over `ssh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    pub host: String,
    pub username: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Private key passed as `ssh -i`; agent or default keys otherwise
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl SshConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            port: default_ssh_port(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run iptables on this host instead of locally
    #[serde(default)]
    pub ssh: Option<SshConfig>,
    #[serde(default = "default_iptables_binary")]
    pub iptables_binary: String,
    /// Arguments for the listing command
    #[serde(default = "default_list_args")]
    pub list_args: Vec<String>,
    #[serde(default)]
    pub default_view: ViewMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ssh: None,
            iptables_binary: default_iptables_binary(),
            list_args: default_list_args(),
            default_view: ViewMode::default(),
        }
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_iptables_binary() -> String {
    "iptables".to_string()
}

fn default_list_args() -> Vec<String> {
    ["-L", "-n", "--line-numbers"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Default location of the config file, `<data_dir>/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    get_data_dir().map(|mut path| {
        path.push("config.json");
        path
    })
}

/// Saves the config to `path` using an atomic write pattern.
/// 1. Writes to a temporary file next to it.
/// 2. Sets restrictive permissions (0o600).
/// 3. Atomically renames to the target path.
///
/// # Security
///
/// On Unix systems, files are created with mode 0o600 (user read/write only).
/// The config may name an SSH identity file and remote account.
///
/// # Errors
///
/// Returns `Err` if the file cannot be written or renamed.
pub async fn save_config_to(config: &AppConfig, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600) // Set permissions BEFORE any data is written
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    // Atomic rename
    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot save configuration. Free up space and try again.",
            )
        } else {
            e
        }
    })
}

/// Writes `config` to `path`, creating the parent directory.
///
/// An existing file is kept unless `overwrite` is set; returns `false` in
/// that case.
///
/// # Errors
///
/// Returns `Err` if the directory or file cannot be written.
pub async fn init_config_at(
    config: &AppConfig,
    path: &Path,
    overwrite: bool,
) -> std::io::Result<bool> {
    if !overwrite && tokio::fs::try_exists(path).await? {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    save_config_to(config, path).await?;
    Ok(true)
}

/// Loads the config from `path`, or returns defaults if it is missing or
/// unreadable. A file that exists but does not parse is logged.
pub async fn load_config_from(path: &Path) -> AppConfig {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => match serde_json::from_str::<AppConfig>(&json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                AppConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            tracing::warn!("Failed to read config {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.iptables_binary, "iptables");
        assert_eq!(config.list_args, ["-L", "-n", "--line-numbers"]);
        assert_eq!(config.default_view, ViewMode::Chain);
    }

    #[test]
    fn test_ssh_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"ssh":{"host":"gw.lan","username":"admin"}}"#).unwrap();
        let ssh = config.ssh.unwrap();
        assert_eq!(ssh, SshConfig::new("gw.lan", "admin"));
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.connect_timeout_secs, 10);
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig {
            ssh: Some(SshConfig::new("10.0.0.1", "root")),
            default_view: ViewMode::Target,
            ..AppConfig::default()
        };
        save_config_to(&config, &path).await.unwrap();

        assert_eq!(load_config_from(&path).await, config);
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_config_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_config_to(&AppConfig::default(), &path).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_load_missing_or_invalid_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(load_config_from(&missing).await, AppConfig::default());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert_eq!(load_config_from(&broken).await, AppConfig::default());
    }

    #[tokio::test]
    async fn test_init_keeps_existing_file_unless_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let remote = AppConfig {
            ssh: Some(SshConfig::new("gw.lan", "admin")),
            ..AppConfig::default()
        };
        assert!(init_config_at(&remote, &path, false).await.unwrap());
        assert_eq!(load_config_from(&path).await, remote);

        assert!(!init_config_at(&AppConfig::default(), &path, false).await.unwrap());
        assert_eq!(load_config_from(&path).await, remote);

        assert!(init_config_at(&AppConfig::default(), &path, true).await.unwrap());
        assert_eq!(load_config_from(&path).await, AppConfig::default());
    }
}
