use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tokio::fs;

/// Characters escaped when a file name is placed in an href.
const HREF_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const STYLE: &str = "body{font-family:system-ui;margin:2rem;}table{width:100%;border-collapse:collapse;}th,td{padding:0.5rem;text-align:left;border-bottom:1px solid #ddd;}th{background:#f5f5f5;}";

/// Renders HTML indexes for directories under a root. Mounted as the static
/// file service's fallback when the root has no `index.html`.
#[derive(Clone, Debug)]
pub struct DirectoryListing {
    root: PathBuf,
}

impl DirectoryListing {
    pub fn new(root: &Path) -> std::io::Result<Self> {
        Ok(Self {
            root: std::fs::canonicalize(root)?,
        })
    }

    pub async fn respond(&self, uri_path: &str) -> Response {
        let decoded = match percent_decode_str(uri_path).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => return (StatusCode::BAD_REQUEST, "Invalid path encoding").into_response(),
        };

        let relative = decoded.trim_start_matches('/');
        let full = self.root.join(relative);
        let canonical = match fs::canonicalize(&full).await {
            Ok(path) => path,
            Err(err) if err.kind() == ErrorKind::NotFound => return not_found(),
            Err(err) => {
                log::warn!("failed to resolve {}: {err}", full.display());
                return not_found();
            }
        };

        if !canonical.starts_with(&self.root) {
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        }
        if !canonical.is_dir() {
            return not_found();
        }

        let at_root = canonical == self.root;
        match render(&canonical, &decoded, at_root).await {
            Ok(body) => Html(body).into_response(),
            Err(err) => {
                log::error!("failed to list {}: {err}", canonical.display());
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read directory").into_response()
            }
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Resource not found").into_response()
}

async fn render(dir: &Path, request_path: &str, at_root: bool) -> std::io::Result<String> {
    let mut entries = fs::read_dir(dir).await?;
    let mut items: Vec<(String, bool)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        items.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    items.sort_by_key(|(name, _)| name.to_lowercase());

    // Relative hrefs only resolve against the directory when the URL ends in '/'.
    let base = if request_path.ends_with('/') {
        String::new()
    } else {
        let last = request_path.rsplit('/').next().unwrap_or_default();
        format!("{}/", utf8_percent_encode(last, HREF_ENCODE_SET))
    };

    let title = if request_path.is_empty() {
        "/"
    } else {
        request_path
    };
    let mut body = format!(
        "<html><head><meta charset=\"utf-8\"><title>Index of {title}</title><style>{STYLE}</style></head><body><h1>Index of {title}</h1><table><tr><th>Name</th><th>Type</th></tr>",
        title = encode_text(title),
    );

    if !at_root {
        body.push_str(&format!(
            "<tr><td><a href=\"{base}../\">../</a></td><td>Directory</td></tr>"
        ));
    }
    for (name, is_dir) in items {
        let mut href = format!("{base}{}", utf8_percent_encode(&name, HREF_ENCODE_SET));
        let mut display = encode_text(&name).into_owned();
        if is_dir {
            href.push('/');
            display.push('/');
        }
        let kind = if is_dir { "Directory" } else { "File" };
        body.push_str(&format!(
            "<tr><td><a href=\"{href}\">{display}</a></td><td>{kind}</td></tr>",
            href = encode_double_quoted_attribute(&href),
        ));
    }

    body.push_str("</table></body></html>");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use tempfile::tempdir;

    async fn body_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn lists_entries_sorted_with_directories_marked() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("A.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = DirectoryListing::new(dir.path()).unwrap();
        let response = listing.respond("/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_of(response).await;
        let a = body.find("A.txt").unwrap();
        let b = body.find("b.txt").unwrap();
        assert!(a < b, "entries should be sorted case-insensitively");
        assert!(body.contains("href=\"sub/\""));
        assert!(!body.contains("../"), "root has no parent link");
    }

    #[tokio::test]
    async fn nested_directory_links_back_to_parent() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("inner file.txt"), "x").unwrap();

        let listing = DirectoryListing::new(dir.path()).unwrap();
        let body = body_of(listing.respond("/sub/").await).await;
        assert!(body.contains("href=\"../\""));
        assert!(body.contains("href=\"inner%20file.txt\""));
        assert!(body.contains("Index of /sub/"));
    }

    #[tokio::test]
    async fn escapes_names_in_markup() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("<b>.txt"), "x").unwrap();

        let listing = DirectoryListing::new(dir.path()).unwrap();
        let body = body_of(listing.respond("/").await).await;
        assert!(body.contains("&lt;b&gt;.txt"));
        assert!(!body.contains("<b>.txt"));
    }

    #[tokio::test]
    async fn rejects_paths_outside_root() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("site");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(outer.path().join("secret")).unwrap();

        let listing = DirectoryListing::new(&root).unwrap();
        let response = listing.respond("/%2e%2e/secret/").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_paths_are_not_found() {
        let dir = tempdir().unwrap();
        let listing = DirectoryListing::new(dir.path()).unwrap();
        assert_eq!(
            listing.respond("/nope/").await.status(),
            StatusCode::NOT_FOUND
        );
    }
}
