//! Command dispatch: bridges CLI args -> VacuumClient calls -> output.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod status;

use dreamectl_core::VacuumClient;

use crate::cli::Command;
use crate::error::CliError;
use crate::output::Printer;

/// Dispatch a device-bound command to its handler.
pub async fn dispatch(cmd: Command, client: &VacuumClient, printer: &Printer) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::show(client, printer).await,
        Command::Watch(args) => status::watch(client, args.count, printer).await,
        Command::Devices => devices::list(client, printer).await,
        Command::Start
        | Command::Pause
        | Command::Dock
        | Command::Locate
        | Command::Fan(_)
        | Command::Room(_) => control::handle(cmd, client, printer).await,
        Command::Config(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "config commands do not talk to a device".into(),
        }),
    }
}
