//! Response encoding: on-the-fly compression for ordinary responses and
//! header rewriting for assets that are already compressed on disk.

use std::path::Path;

use axum::extract::Request;
use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{Extensions, HeaderMap, HeaderValue, StatusCode, Version};
use axum::middleware::Next;
use axum::response::Response;
use mime::Mime;
use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};
use tower_http::compression::CompressionLayer;

/// Responses smaller than this are sent uncompressed.
pub const COMPRESSION_THRESHOLD: u16 = 1024;

const APPLICATION_WASM: &str = "application/wasm";

/// Encoding and media type of a file stored pre-compressed, derived from
/// its name (`app.wasm.br` is wasm compressed with brotli).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecompressedAsset {
    pub encoding: &'static str,
    pub content_type: Mime,
}

impl PrecompressedAsset {
    pub fn detect(path: &str) -> Option<Self> {
        let (stem, encoding) = if let Some(stem) = path.strip_suffix(".br") {
            (stem, "br")
        } else if let Some(stem) = path.strip_suffix(".gz") {
            (stem, "gzip")
        } else {
            return None;
        };
        let content_type = Path::new(stem)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(content_type_for)
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        Some(Self {
            encoding,
            content_type,
        })
    }
}

fn content_type_for(extension: &str) -> Mime {
    match extension.to_ascii_lowercase().as_str() {
        "wasm" => APPLICATION_WASM
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT,
        "css" => mime::TEXT_CSS,
        "html" | "htm" => mime::TEXT_HTML,
        "json" | "map" => mime::APPLICATION_JSON,
        "svg" => mime::IMAGE_SVG,
        "txt" => mime::TEXT_PLAIN,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Marks `.br` / `.gz` responses with the matching `Content-Encoding` and the
/// media type of the original file. Error responses are left alone so a 404
/// body is not labelled as brotli.
pub async fn precompressed_assets(request: Request, next: Next) -> Response {
    let asset = PrecompressedAsset::detect(request.uri().path());
    let mut response = next.run(request).await;

    if let Some(asset) = asset {
        let status = response.status();
        if !status.is_client_error() && !status.is_server_error() {
            let headers = response.headers_mut();
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(asset.encoding));
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_str(asset.content_type.as_ref())
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            );
        }
    }
    response
}

/// Narrows `Accept-Encoding` to `br` whenever the client lists it, so brotli
/// wins over gzip regardless of the order or weights the client sent.
pub async fn prefer_brotli(mut request: Request) -> Request {
    let accepts = request
        .headers()
        .get(ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(accepts_brotli)
        .unwrap_or(false);
    if accepts {
        request
            .headers_mut()
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("br"));
    }
    request
}

pub fn accepts_brotli(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|item| {
        let mut params = item.split(';');
        let coding = params.next().unwrap_or_default().trim();
        if !coding.eq_ignore_ascii_case("br") {
            return false;
        }
        let quality = params
            .find_map(|param| {
                let param = param.trim();
                param
                    .strip_prefix("q=")
                    .or_else(|| param.strip_prefix("Q="))
            })
            .map(|q| q.trim().parse::<f32>().unwrap_or(0.0))
            .unwrap_or(1.0);
        quality > 0.0
    })
}

fn not_precompressed(
    _status: StatusCode,
    _version: Version,
    headers: &HeaderMap,
    _extensions: &Extensions,
) -> bool {
    !headers.contains_key(CONTENT_ENCODING)
}

/// Brotli + gzip compression above [`COMPRESSION_THRESHOLD`], never applied
/// to a response that already carries a `Content-Encoding`.
pub fn compression_layer() -> CompressionLayer<impl Predicate> {
    let predicate = SizeAbove::new(COMPRESSION_THRESHOLD)
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(not_precompressed);
    CompressionLayer::new()
        .br(true)
        .gzip(true)
        .compress_when(predicate)
}
