//! Certificate bundle lookup and development certificate generation.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::fs;
use tokio::process::Command;

use crate::config::{InstallRoot, DEFAULT_CERT_NAME};
use crate::error::CertError;
use crate::types::CertificateBundle;

const OPENSSL_SUBJECT: &str = "/C=CN/ST=Shanghai/L=Shanghai/O=LocalHttps/OU=LocalHttps/CN=localhost";
const VALID_DAYS: &str = "365";

/// Reports whether both `ssl/server.key` and `ssl/server.cert` exist.
/// Contents are not inspected; a malformed bundle fails later at bind time.
pub fn bundle_present(root: &InstallRoot) -> bool {
    root.key_path(DEFAULT_CERT_NAME).is_file() && root.cert_path(DEFAULT_CERT_NAME).is_file()
}

/// Reads the bundle when both files are present.
pub async fn load(root: &InstallRoot) -> Result<Option<CertificateBundle>, std::io::Error> {
    if !bundle_present(root) {
        return Ok(None);
    }
    let (key, cert) = tokio::try_join!(
        fs::read(root.key_path(DEFAULT_CERT_NAME)),
        fs::read(root.cert_path(DEFAULT_CERT_NAME)),
    )?;
    Ok(Some(CertificateBundle { key, cert }))
}

/// Generates a self-signed key/certificate pair under `ssl/` with `openssl`.
/// Returns the key and certificate paths.
pub async fn create_ssl(
    root: &InstallRoot,
    name: Option<&str>,
) -> Result<(PathBuf, PathBuf), CertError> {
    let name = name.unwrap_or(DEFAULT_CERT_NAME);
    let ssl_dir = root.ssl_dir();
    fs::create_dir_all(&ssl_dir).await?;

    let key_file = format!("{name}.key");
    let cert_file = format!("{name}.cert");
    let output = Command::new("openssl")
        .args(["req", "-nodes", "-new", "-x509", "-keyout"])
        .arg(&key_file)
        .arg("-out")
        .arg(&cert_file)
        .args(["-days", VALID_DAYS, "-subj", OPENSSL_SUBJECT])
        .current_dir(&ssl_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(CertError::Spawn)?;

    if !output.status.success() {
        return Err(CertError::ToolFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok((root.key_path(name), root.cert_path(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_bundle(root: &InstallRoot, key: bool, cert: bool) {
        std::fs::create_dir_all(root.ssl_dir()).unwrap();
        if key {
            std::fs::write(root.key_path(DEFAULT_CERT_NAME), "key").unwrap();
        }
        if cert {
            std::fs::write(root.cert_path(DEFAULT_CERT_NAME), "cert").unwrap();
        }
    }

    #[test]
    fn presence_requires_both_files() {
        for (key, cert, expected) in [
            (false, false, false),
            (true, false, false),
            (false, true, false),
            (true, true, true),
        ] {
            let dir = tempdir().unwrap();
            let root = InstallRoot::new(dir.path());
            write_bundle(&root, key, cert);
            assert_eq!(bundle_present(&root), expected, "key={key} cert={cert}");
        }
    }

    #[tokio::test]
    async fn load_reads_bytes_verbatim() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        write_bundle(&root, true, true);

        let bundle = load(&root).await.unwrap().expect("bundle present");
        assert_eq!(bundle.key, b"key");
        assert_eq!(bundle.cert, b"cert");
    }

    #[tokio::test]
    async fn load_without_bundle_is_none() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        assert!(load(&root).await.unwrap().is_none());
    }
}
