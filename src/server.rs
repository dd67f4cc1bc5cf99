//! Static file server: protocol selection, the middleware stack and the
//! bind-then-persist startup sequence.

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{middleware, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::task::JoinHandle;
use tower::service_fn;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::certs;
use crate::config::{InstallRoot, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use crate::encoding::{compression_layer, precompressed_assets, prefer_brotli};
use crate::error::ServeError;
use crate::listing::DirectoryListing;
use crate::state::RunStateStore;
use crate::types::{Scheme, ServerConfig};

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    pub port: Option<u16>,
    pub root_path: Option<PathBuf>,
}

pub fn default_port(tls: bool) -> u16 {
    if tls {
        DEFAULT_HTTPS_PORT
    } else {
        DEFAULT_HTTP_PORT
    }
}

/// Makes `path` absolute against the current directory, defaulting to the
/// current directory itself.
pub fn resolve_root(path: Option<PathBuf>) -> io::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match path {
        Some(path) if path.is_absolute() => path,
        Some(path) => cwd.join(path),
        None => cwd,
    })
}

/// Resolves `host` (an IP literal or a name such as `localhost`) to the
/// first address it maps to.
pub async fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr, ServeError> {
    tokio::net::lookup_host((host, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServeError::Address(format!("{host}:{port}")))
}

/// Builds the application for `root`. Directory listings are only enabled
/// when the root has no `index.html`.
pub fn router(root: &Path) -> io::Result<Router> {
    let files = ServeDir::new(root).append_index_html_on_directories(true);

    let app = if root.join("index.html").is_file() {
        Router::new().fallback_service(files)
    } else {
        let listing = DirectoryListing::new(root)?;
        let fallback = service_fn(move |request: Request| {
            let listing = listing.clone();
            async move { Ok::<_, Infallible>(listing.respond(request.uri().path()).await) }
        });
        Router::new().fallback_service(files.fallback(fallback))
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any);

    Ok(app
        .layer(middleware::from_fn(precompressed_assets))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-embedder-policy"),
            HeaderValue::from_static("require-corp"),
        ))
        .layer(compression_layer())
        .layer(middleware::map_request(prefer_brotli))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// A server whose listener is bound and whose configuration has been saved.
pub struct RunningServer {
    config: ServerConfig,
    local_addr: SocketAddr,
    scheme: Scheme,
    handle: Handle,
    task: JoinHandle<io::Result<()>>,
}

impl fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningServer")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl RunningServer {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Stops accepting connections; in-flight requests are not awaited.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Runs until the listener stops.
    pub async fn wait(self) -> Result<(), ServeError> {
        match self.task.await {
            Ok(result) => result.map_err(ServeError::Io),
            Err(err) => Err(ServeError::Io(io::Error::new(io::ErrorKind::Other, err))),
        }
    }
}

/// Binds the listener and resolves once it is accepting connections.
///
/// TLS is used when `ssl/server.key` and `ssl/server.cert` exist under the
/// installation root. The resulting [`ServerConfig`] is saved to the run-state
/// store before this returns; any failure before that point leaves the stored
/// record untouched.
pub async fn serve(
    options: ServeOptions,
    install_root: &InstallRoot,
) -> Result<RunningServer, ServeError> {
    let root = resolve_root(options.root_path)?;
    if !root.is_dir() {
        return Err(ServeError::RootNotFound(root));
    }

    let bundle = certs::load(install_root).await?;
    let port = options.port.unwrap_or_else(|| default_port(bundle.is_some()));
    let tls = match bundle {
        Some(bundle) => Some(
            RustlsConfig::from_pem(bundle.cert, bundle.key)
                .await
                .map_err(ServeError::Tls)?,
        ),
        None => {
            log::warn!(
                "'{}' has no SSL certificate, serving over http. Run createSSL or place server.key & server.cert under {}",
                root.display(),
                install_root.ssl_dir().display()
            );
            None
        }
    };
    let scheme = if tls.is_some() {
        Scheme::Https
    } else {
        Scheme::Http
    };

    let app = router(&root)?;

    let addr = resolve_bind_addr(&options.host, port).await?;
    let listener = TcpListener::bind(addr).map_err(|source| ServeError::Bind { addr, source })?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;

    let config = ServerConfig {
        root_path: root,
        port: local_addr.port(),
    };
    RunStateStore::new(install_root.clone()).save(&config).await?;

    let handle = Handle::new();
    let task = match tls {
        Some(tls) => tokio::spawn(
            axum_server::tls_rustls::from_tcp_rustls(listener, tls)
                .handle(handle.clone())
                .serve(app.into_make_service()),
        ),
        None => tokio::spawn(
            axum_server::from_tcp(listener)
                .handle(handle.clone())
                .serve(app.into_make_service()),
        ),
    };

    log::info!(
        "'{}' running on '{scheme}://localhost:{}'",
        config.root_path.display(),
        config.port
    );
    if let Ok(ip) = local_ip_address::local_ip() {
        if local_addr.ip().is_unspecified() {
            log::info!("network: {scheme}://{ip}:{}", config.port);
        }
    }

    Ok(RunningServer {
        config,
        local_addr,
        scheme,
        handle,
        task,
    })
}
