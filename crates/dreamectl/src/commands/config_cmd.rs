//! Config subcommand handlers. None of them contact a device.

use std::path::Path;

use dreamectl_config::Config;

use crate::cli::{ConfigCommand, OutputFormat};
use crate::error::CliError;
use crate::output::{Printer, render_json};

pub fn handle(
    command: &ConfigCommand,
    path: &Path,
    load: impl FnOnce() -> Result<Config, CliError>,
    printer: &Printer,
) -> Result<(), CliError> {
    match command {
        ConfigCommand::Path => {
            printer.print(&path.display().to_string());
            Ok(())
        }
        ConfigCommand::Show => {
            let config = load()?.redacted();
            let rendered = match printer.format {
                OutputFormat::Json => render_json(&config)?,
                OutputFormat::Plain => {
                    toml::to_string_pretty(&config).map_err(|e| CliError::Render(e.to_string()))?
                }
            };
            printer.print(&rendered);
            Ok(())
        }
        ConfigCommand::Check => {
            let config = load()?;
            config.validate()?;
            let mut names: Vec<&str> = config.devices.keys().map(String::as_str).collect();
            names.sort_unstable();
            let summary = if names.is_empty() {
                format!("{}: no devices configured", path.display())
            } else {
                format!("{}: {} device(s) OK: {}", path.display(), names.len(), names.join(", "))
            };
            printer.print(&summary);
            Ok(())
        }
    }
}
