mod cli;
mod commands;
mod error;
mod output;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dreamectl_config::{Config, ConfigError};
use dreamectl_core::VacuumClient;

use crate::cli::{Cli, Command, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::Printer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(dreamectl_config::config_path);

    match cli.command {
        // Config commands never connect
        Command::Config(ref args) => {
            let printer = make_printer(&cli.global, None);
            commands::config_cmd::handle(&args.command, &path, || load(&path), &printer)
        }

        cmd => {
            let config = load(&path)?;
            let printer = make_printer(&cli.global, Some(&config));
            let (name, mut device) = config
                .device_config(cli.global.device.as_deref())
                .map_err(|e| config_error(e, &path))?;

            if let Command::Watch(ref args) = cmd {
                if let Some(secs) = args.interval {
                    if secs == 0 {
                        return Err(CliError::Validation {
                            field: "--interval".into(),
                            reason: "must be greater than zero".into(),
                        });
                    }
                    device.poll_interval = Duration::from_secs(secs);
                }
            }

            debug!(device = %name, transport = %device.connection.kind(), "connecting");
            let client = VacuumClient::new(device);
            let result = match client.connect().await {
                Ok(_) => commands::dispatch(cmd, &client, &printer).await,
                Err(e) => Err(e.into()),
            };
            client.shutdown().await;
            result
        }
    }
}

fn load(path: &Path) -> Result<Config, CliError> {
    dreamectl_config::load_config_from(path).map_err(|e| config_error(e, path))
}

fn config_error(err: ConfigError, path: &Path) -> CliError {
    match err {
        ConfigError::NoDevices => CliError::NoConfig {
            path: path.display().to_string(),
        },
        other => other.into(),
    }
}

/// `--output` wins over `defaults.output`.
fn make_printer(global: &GlobalOpts, config: Option<&Config>) -> Printer {
    let format = global.output.unwrap_or_else(|| match config {
        Some(c) if c.defaults.output.eq_ignore_ascii_case("json") => OutputFormat::Json,
        _ => OutputFormat::Plain,
    });
    Printer {
        format,
        color: output::should_color(global.color),
        quiet: global.quiet,
    }
}
