//! Command layer. Every user-facing failure ends here as a log line.

use std::path::PathBuf;

use crate::certs;
use crate::cli::Command;
use crate::config::Config;
use crate::error::{ServeError, TaskError};
use crate::server::{default_port, resolve_root, serve, RunningServer, ServeOptions};
use crate::state::RunStateStore;
use crate::supervisor::{BackgroundManager, Pm2Supervisor, ProcessSupervisor, NAME_PREFIX};
use crate::types::BackgroundProcess;

pub async fn start(
    config: &Config,
    port: Option<u16>,
    path: Option<PathBuf>,
) -> Result<RunningServer, TaskError> {
    let options = ServeOptions {
        host: config.host.clone(),
        port,
        root_path: path,
    };
    Ok(serve(options, &config.install_root).await?)
}

/// Restarts the last successful configuration. A missing record is a
/// warning, reported as `Ok(None)`.
pub async fn last(config: &Config) -> Result<Option<RunningServer>, TaskError> {
    let store = RunStateStore::new(config.install_root.clone());
    let Some(previous) = store.load().await? else {
        log::warn!("no server configuration from a previous run");
        return Ok(None);
    };
    let server = start(config, Some(previous.port), Some(previous.root_path)).await?;
    Ok(Some(server))
}

pub async fn create_ssl(config: &Config, name: Option<&str>) -> Result<(), TaskError> {
    let (key, cert) = certs::create_ssl(&config.install_root, name).await?;
    log::info!("wrote {} and {}", key.display(), cert.display());
    Ok(())
}

pub async fn start_background<S: ProcessSupervisor>(
    manager: &BackgroundManager<S>,
    config: &Config,
    port: Option<u16>,
    path: Option<PathBuf>,
    tag: Option<&str>,
) -> Result<BackgroundProcess, TaskError> {
    let root = resolve_root(path)?;
    if !root.is_dir() {
        return Err(ServeError::RootNotFound(root).into());
    }
    // Resolved here so the detached process does not depend on its own cwd.
    let port = port.unwrap_or_else(|| default_port(certs::bundle_present(&config.install_root)));
    Ok(manager.start_background(port, &root, tag).await?)
}

fn pm2_manager(config: &Config) -> Result<BackgroundManager<Pm2Supervisor>, TaskError> {
    let program = std::env::current_exe()?;
    Ok(BackgroundManager::new(
        Pm2Supervisor::new(config.pm2_bin.clone()),
        program,
    ))
}

pub async fn run(command: Command, config: &Config) {
    let verb = command.verb();
    log::info!("running task: {verb}");
    if let Err(err) = execute(command, config).await {
        log::error!("task {verb} failed: {err}");
    }
}

async fn execute(command: Command, config: &Config) -> Result<(), TaskError> {
    match command {
        Command::Start { port, path } => start(config, port, path).await?.wait().await?,
        Command::Last => {
            if let Some(server) = last(config).await? {
                server.wait().await?;
            }
        }
        Command::CreateSsl { name } => create_ssl(config, name.as_deref()).await?,
        Command::StartBackground { port, path, tag } => {
            let manager = pm2_manager(config)?;
            start_background(&manager, config, port, path, tag.as_deref()).await?;
        }
        Command::StopBackground { tag } => {
            let manager = pm2_manager(config)?;
            manager.stop_background(tag.as_deref()).await.log();
        }
        Command::List => {
            let manager = pm2_manager(config)?;
            let processes = manager.list_processes(NAME_PREFIX).await;
            if processes.is_empty() {
                log::info!("no background servers running");
            }
            for process in processes {
                let pid = process
                    .pid
                    .map(|pid| pid.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}\t{}\t{}", process.name, pid, process.status);
            }
        }
    }
    Ok(())
}
