//! Parsing of the process manager's `jlist` output.
//!
//! The JSON array may be preceded by banner lines (daemon spawn notices,
//! upgrade warnings). The first line that starts a parseable array wins;
//! anything after that array is ignored.

use serde::Deserialize;

use crate::error::SupervisorError;
use crate::types::BackgroundProcess;

#[derive(Debug, Deserialize)]
struct ListedProcess {
    name: String,
    #[serde(default)]
    pid: Option<u32>,
    #[serde(default)]
    pm2_env: Option<ListedEnv>,
}

#[derive(Debug, Deserialize)]
struct ListedEnv {
    #[serde(default)]
    status: Option<String>,
}

impl From<ListedProcess> for BackgroundProcess {
    fn from(listed: ListedProcess) -> Self {
        Self {
            name: listed.name,
            // Stopped processes are reported with pid 0.
            pid: listed.pid.filter(|pid| *pid != 0),
            status: listed
                .pm2_env
                .and_then(|env| env.status)
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

pub fn parse_process_list(output: &str) -> Result<Vec<BackgroundProcess>, SupervisorError> {
    let line_starts = std::iter::once(0).chain(output.match_indices('\n').map(|(i, _)| i + 1));
    let mut last_error = None;

    for start in line_starts {
        let candidate = output[start..].trim_start();
        if !candidate.starts_with('[') {
            continue;
        }
        let mut stream =
            serde_json::Deserializer::from_str(candidate).into_iter::<Vec<ListedProcess>>();
        match stream.next() {
            Some(Ok(listed)) => {
                return Ok(listed.into_iter().map(BackgroundProcess::from).collect())
            }
            Some(Err(err)) => last_error = Some(err.to_string()),
            None => {}
        }
    }

    Err(SupervisorError::Parse(
        last_error.unwrap_or_else(|| "no process list found in output".to_string()),
    ))
}
