//! Background server instances managed through an external process manager.
//!
//! Every process this tool owns is named `local-https-<tag>`; processes
//! without the prefix are never touched.

mod parse;
mod pm2;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::SupervisorError;
use crate::types::BackgroundProcess;

pub use parse::parse_process_list;
pub use pm2::Pm2Supervisor;

pub const NAME_PREFIX: &str = "local-https-";

/// Program and arguments the process manager should keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// Re-invokes this tool's `start` command.
    pub fn start_server(program: impl Into<PathBuf>, port: u16, root: &Path) -> Self {
        Self {
            program: program.into(),
            args: vec![
                "start".to_string(),
                port.to_string(),
                root.to_string_lossy().into_owned(),
            ],
        }
    }
}

#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    async fn start(
        &self,
        name: &str,
        command: &LaunchCommand,
    ) -> Result<BackgroundProcess, SupervisorError>;

    async fn stop(&self, name: &str) -> Result<(), SupervisorError>;

    /// Processes whose name starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<BackgroundProcess>, SupervisorError>;
}

/// `local-https-<tag>`, or a millisecond timestamp in place of a missing tag.
pub fn process_name(tag: Option<&str>) -> String {
    match tag.filter(|tag| !tag.is_empty()) {
        Some(tag) => format!("{NAME_PREFIX}{tag}"),
        None => format!(
            "{NAME_PREFIX}{}",
            chrono::Local::now().format("%Y%m%d%H%M%S%3f")
        ),
    }
}

/// Outcome of a stop request. Each deletion is attempted independently.
#[derive(Debug, Default)]
pub struct StopReport {
    pub stopped: Vec<String>,
    pub failed: Vec<(String, SupervisorError)>,
    pub listing_error: Option<SupervisorError>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.listing_error.is_none()
    }

    pub fn log(&self) {
        if let Some(err) = &self.listing_error {
            log::error!("could not list background servers: {err}");
        }
        for name in &self.stopped {
            log::info!("stopped {name}");
        }
        for (name, err) in &self.failed {
            log::error!("failed to stop {name}: {err}");
        }
        if self.stopped.is_empty() && self.is_clean() {
            log::warn!("no background servers to stop");
        }
    }
}

pub struct BackgroundManager<S> {
    supervisor: S,
    program: PathBuf,
}

impl<S: ProcessSupervisor> BackgroundManager<S> {
    /// `program` is the executable the process manager re-launches, normally
    /// this binary.
    pub fn new(supervisor: S, program: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            program: program.into(),
        }
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub async fn start_background(
        &self,
        port: u16,
        root: &Path,
        tag: Option<&str>,
    ) -> Result<BackgroundProcess, SupervisorError> {
        let name = process_name(tag);
        let command = LaunchCommand::start_server(&self.program, port, root);
        let process = self.supervisor.start(&name, &command).await?;
        log::info!("'{}' started in background as {name}", root.display());
        Ok(process)
    }

    /// Stops `local-https-<tag>`, or every prefixed process when no tag is given.
    pub async fn stop_background(&self, tag: Option<&str>) -> StopReport {
        let mut report = StopReport::default();
        let names = match tag {
            Some(tag) => vec![format!("{NAME_PREFIX}{tag}")],
            None => match self.supervisor.list(NAME_PREFIX).await {
                Ok(processes) => processes.into_iter().map(|p| p.name).collect(),
                Err(err) => {
                    report.listing_error = Some(err);
                    return report;
                }
            },
        };

        for name in names {
            match self.supervisor.stop(&name).await {
                Ok(()) => report.stopped.push(name),
                Err(err) => report.failed.push((name, err)),
            }
        }
        report
    }

    /// Listing is advisory: failures are logged and reported as no processes.
    pub async fn list_processes(&self, prefix: &str) -> Vec<BackgroundProcess> {
        match self.supervisor.list(prefix).await {
            Ok(processes) => processes,
            Err(err) => {
                log::error!("could not list background servers: {err}");
                Vec::new()
            }
        }
    }
}
