use dreamectl_core::VacuumClient;

use crate::error::CliError;
use crate::output::Printer;

pub async fn list(client: &VacuumClient, printer: &Printer) -> Result<(), CliError> {
    let devices = client.list_devices().await?;
    printer.print(&printer.devices(&devices)?);
    Ok(())
}
