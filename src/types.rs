use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The configuration a server was started with. Persisted verbatim as
/// `{"serverPath": ..., "port": ...}` after a successful bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "serverPath")]
    pub root_path: PathBuf,
    pub port: u16,
}

#[derive(Clone)]
pub struct CertificateBundle {
    pub key: Vec<u8>,
    pub cert: Vec<u8>,
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("key", &format_args!("<{} bytes>", self.key.len()))
            .field("cert", &format_args!("<{} bytes>", self.cert.len()))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// A process as reported by the external process manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundProcess {
    pub name: String,
    pub pid: Option<u32>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_uses_original_field_names() {
        let config = ServerConfig {
            root_path: PathBuf::from("/site"),
            port: 8080,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"serverPath":"/site","port":8080}"#);
    }

    #[test]
    fn bundle_debug_hides_key_material() {
        let bundle = CertificateBundle {
            key: b"secret".to_vec(),
            cert: b"cert".to_vec(),
        };
        let rendered = format!("{bundle:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<6 bytes>"));
    }
}
