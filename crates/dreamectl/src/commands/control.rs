//! Control commands: start, pause, dock, locate, fan, room.

use tracing::info;

use dreamectl_core::{RawReply, VacuumClient};

use crate::cli::Command;
use crate::error::CliError;
use crate::output::Printer;

pub async fn handle(cmd: Command, client: &VacuumClient, printer: &Printer) -> Result<(), CliError> {
    let (label, reply): (String, RawReply) = match cmd {
        Command::Start => ("start".into(), client.start().await?),
        Command::Pause => ("pause".into(), client.pause().await?),
        Command::Dock => ("dock".into(), client.dock().await?),
        Command::Locate => ("locate".into(), client.locate().await?),
        Command::Fan(args) => (
            format!("fan {}%", args.percent.clamp(0, 100)),
            client.set_fan_speed(args.percent).await?,
        ),
        Command::Room(args) => {
            let reply = match args.room.parse::<u32>() {
                Ok(id) => client.clean_room(id).await?,
                Err(_) => client.clean_room_named(&args.room).await?,
            };
            (format!("room {}", args.room), reply)
        }
        other => {
            return Err(CliError::Validation {
                field: "command".into(),
                reason: format!("{other:?} is not a control command"),
            });
        }
    };

    info!(command = %label, "command accepted");
    printer.print(&printer.accepted(&label, &reply.0)?);
    Ok(())
}
