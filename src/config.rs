use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Name of the certificate bundle the server looks for under `ssl/`.
pub const DEFAULT_CERT_NAME: &str = "server";

const SSL_DIR: &str = "ssl";
const TEMP_DIR: &str = ".temp";
const STATE_FILE: &str = "startServerConfig.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub install_root: InstallRoot,
    pub pm2_bin: String,
    pub log_time: bool,
}

impl Config {
    /// Reads the process environment, loading `.env` first when present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: env::var("LOCAL_HTTPS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            install_root: env::var_os("LOCAL_HTTPS_HOME")
                .map(|home| InstallRoot::new(PathBuf::from(home)))
                .unwrap_or_else(InstallRoot::beside_executable),
            pm2_bin: env::var("LOCAL_HTTPS_PM2").unwrap_or_else(|_| "pm2".to_string()),
            log_time: env::var("LOCAL_HTTPS_LOG_TIME")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
        }
    }
}

/// Directory holding the tool's own files: the certificate bundle and the
/// persisted run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn beside_executable() -> Self {
        let root = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn ssl_dir(&self) -> PathBuf {
        self.root.join(SSL_DIR)
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.ssl_dir().join(format!("{name}.key"))
    }

    pub fn cert_path(&self, name: &str) -> PathBuf {
        self.ssl_dir().join(format!("{name}.cert"))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.temp_dir().join(STATE_FILE)
    }
}
