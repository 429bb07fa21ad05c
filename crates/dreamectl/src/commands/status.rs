//! `status` and `watch`.

use tokio::signal;
use tracing::debug;

use dreamectl_core::VacuumClient;

use crate::error::CliError;
use crate::output::Printer;

pub async fn show(client: &VacuumClient, printer: &Printer) -> Result<(), CliError> {
    let status = client.status().await?;
    let identity = client.identity().ok_or(CliError::NotConnected)?;
    printer.print(&printer.status(identity, &status)?);
    Ok(())
}

/// Print every poll update until Ctrl-C or `--count` updates.
pub async fn watch(
    client: &VacuumClient,
    count: Option<usize>,
    printer: &Printer,
) -> Result<(), CliError> {
    let mut rx = client.spawn_poller().await?;
    let mut seen = 0usize;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("poller stopped");
                    break;
                }
                let state = rx.borrow_and_update().clone();
                printer.print(&printer.poll_update(&state)?);
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        }
    }
    Ok(())
}
