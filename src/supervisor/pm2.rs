use std::ffi::OsString;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::parse::parse_process_list;
use super::{LaunchCommand, ProcessSupervisor};
use crate::error::SupervisorError;
use crate::types::BackgroundProcess;

/// [`ProcessSupervisor`] backed by the `pm2` command line.
#[derive(Debug, Clone)]
pub struct Pm2Supervisor {
    program: String,
}

impl Pm2Supervisor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<Output, SupervisorError> {
        let rendered = args
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        log::debug!("{} {rendered}", self.program);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| SupervisorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SupervisorError::CommandFailed {
                command: format!("{} {rendered}", self.program),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn start(
        &self,
        name: &str,
        command: &LaunchCommand,
    ) -> Result<BackgroundProcess, SupervisorError> {
        let mut args: Vec<OsString> = vec![
            "start".into(),
            command.program.clone().into_os_string(),
            "--name".into(),
            name.into(),
            "--".into(),
        ];
        args.extend(command.args.iter().map(OsString::from));
        self.run(args).await?;

        let registered = self
            .list(name)
            .await
            .ok()
            .and_then(|processes| processes.into_iter().find(|p| p.name == name));
        Ok(registered.unwrap_or_else(|| BackgroundProcess {
            name: name.to_string(),
            pid: None,
            status: "launching".to_string(),
        }))
    }

    async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        self.run(vec!["delete".into(), name.into()]).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BackgroundProcess>, SupervisorError> {
        let output = self.run(vec!["jlist".into()]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let processes = parse_process_list(&stdout)?;
        Ok(processes
            .into_iter()
            .filter(|process| process.name.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let supervisor = Pm2Supervisor::new("/nonexistent/pm2-for-tests");
        let err = supervisor.stop("local-https-x").await.unwrap_err();
        match err {
            SupervisorError::Spawn { program, .. } => {
                assert_eq!(program, "/nonexistent/pm2-for-tests");
            }
            other => panic!("expected Spawn, got: {other:?}"),
        }
    }

    #[cfg(unix)]
    mod scripted {
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};

        use tempfile::{tempdir, TempDir};

        use super::*;
        use crate::supervisor::NAME_PREFIX;

        /// Stand-in for pm2: records each argv as one `|`-joined line and
        /// answers `jlist` with a banner followed by the process table.
        struct FakePm2 {
            _dir: TempDir,
            script: PathBuf,
            log: PathBuf,
        }

        impl FakePm2 {
            fn install() -> Self {
                let dir = tempdir().unwrap();
                let script = dir.path().join("pm2");
                let log = dir.path().join("calls.log");
                let body = format!(
                    r#"#!/bin/sh
printf '%s|' "$@" >> '{log}'
printf '\n' >> '{log}'
if [ "$1" = "jlist" ]; then
  echo '[PM2] Spawning PM2 daemon with pm2_home=/tmp/.pm2'
  echo '[{{"name":"local-https-docs","pid":77,"pm2_env":{{"status":"online"}}}},{{"name":"api","pid":78,"pm2_env":{{"status":"online"}}}}]'
fi
if [ "$1" = "delete" ] && [ "$2" = "local-https-ghost" ]; then
  echo "[PM2][ERROR] Process or Namespace local-https-ghost not found" >&2
  exit 1
fi
"#,
                    log = log.display()
                );
                std::fs::write(&script, body).unwrap();
                std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
                Self {
                    _dir: dir,
                    script,
                    log,
                }
            }

            fn supervisor(&self) -> Pm2Supervisor {
                Pm2Supervisor::new(self.script.to_string_lossy().into_owned())
            }

            fn calls(&self) -> Vec<String> {
                std::fs::read_to_string(&self.log)
                    .unwrap_or_default()
                    .lines()
                    .map(str::to_string)
                    .collect()
            }
        }

        #[tokio::test]
        async fn start_passes_name_and_start_arguments() {
            let pm2 = FakePm2::install();
            let command =
                LaunchCommand::start_server("/usr/bin/local-https", 8080, Path::new("/site"));

            let process = pm2
                .supervisor()
                .start("local-https-docs", &command)
                .await
                .unwrap();

            assert_eq!(
                pm2.calls(),
                vec![
                    "start|/usr/bin/local-https|--name|local-https-docs|--|start|8080|/site|",
                    "jlist|",
                ]
            );
            assert_eq!(process.name, "local-https-docs");
            assert_eq!(process.pid, Some(77));
            assert_eq!(process.status, "online");
        }

        #[tokio::test]
        async fn stop_deletes_by_name() {
            let pm2 = FakePm2::install();

            pm2.supervisor().stop("local-https-docs").await.unwrap();

            assert_eq!(pm2.calls(), vec!["delete|local-https-docs|"]);
        }

        #[tokio::test]
        async fn failed_delete_carries_stderr() {
            let pm2 = FakePm2::install();

            let err = pm2.supervisor().stop("local-https-ghost").await.unwrap_err();
            match err {
                SupervisorError::CommandFailed { command, stderr, .. } => {
                    assert!(command.ends_with("delete local-https-ghost"), "{command}");
                    assert!(stderr.contains("not found"), "{stderr}");
                }
                other => panic!("expected CommandFailed, got: {other:?}"),
            }
        }

        #[tokio::test]
        async fn list_parses_jlist_and_filters_by_prefix() {
            let pm2 = FakePm2::install();

            let processes = pm2.supervisor().list(NAME_PREFIX).await.unwrap();

            assert_eq!(pm2.calls(), vec!["jlist|"]);
            assert_eq!(
                processes,
                vec![BackgroundProcess {
                    name: "local-https-docs".to_string(),
                    pid: Some(77),
                    status: "online".to_string(),
                }]
            );
        }
    }
}
