use clap::error::ErrorKind;
use clap::Parser;
use local_https::cli::{Cli, KNOWN_COMMANDS};
use local_https::config::Config;
use local_https::logging::{self, LogConfig};
use local_https::tasks;

#[tokio::main]
async fn main() {
    // Load configuration (.env first)
    let config = Config::from_env();

    // Setup logging
    logging::init(LogConfig {
        timestamps: config.log_time,
        ..LogConfig::default()
    });

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            if !matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                log::error!("unknown task, use {KNOWN_COMMANDS}");
            }
            return;
        }
    };

    tasks::run(cli.command, &config).await;
}
