//! Output formatting: plain text or JSON.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use owo_colors::OwoColorize;
use serde_json::json;

use dreamectl_core::{DeviceIdentity, DeviceInfo, OperationalState, PollState, StatusSnapshot};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Rendering settings shared by every command.
#[derive(Debug, Clone)]
pub struct Printer {
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl Printer {
    /// Print to stdout, respecting quiet mode.
    pub fn print(&self, output: &str) {
        if self.quiet || output.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{output}");
    }

    pub fn status(&self, identity: &DeviceIdentity, status: &StatusSnapshot) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => render_json(&json!({
                "device": identity,
                "status": status,
                "low_battery": status.low_battery(),
            })),
            OutputFormat::Plain => Ok(self.status_detail(identity, status)),
        }
    }

    fn status_detail(&self, identity: &DeviceIdentity, status: &StatusSnapshot) -> String {
        let name = identity.name.as_deref().unwrap_or("vacuum");
        [
            format!("device    {name} ({}, did {})", identity.model, identity.did),
            format!("state     {}", self.state(status.state)),
            format!("battery   {}", self.battery(status)),
            format!("docked    {}", yes_no(status.docked)),
            format!("error     {}", self.error_code(status.error_code)),
            format!("updated   {}", local_time(status.captured_at)),
        ]
        .join("\n")
    }

    /// One line per poll update; JSON mode emits compact documents.
    pub fn poll_update(&self, state: &PollState) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => {
                let value = json!({
                    "status": state.snapshot.as_deref(),
                    "stale": state.stale,
                    "consecutive_failures": state.consecutive_failures,
                    "total_failures": state.total_failures,
                    "last_error": state.last_error,
                });
                serde_json::to_string(&value).map_err(|e| CliError::Render(e.to_string()))
            }
            OutputFormat::Plain => Ok(self.poll_line(state)),
        }
    }

    fn poll_line(&self, state: &PollState) -> String {
        let Some(snapshot) = state.snapshot.as_deref() else {
            let reason = state.last_error.as_deref().unwrap_or("no reply yet");
            return format!("status unknown: {reason}");
        };

        let mut line = format!(
            "[{}] {:<9} battery {:<5} docked {:<3} error {}",
            local_time(snapshot.captured_at),
            self.state(snapshot.state),
            self.battery(snapshot),
            yes_no(snapshot.docked),
            self.error_code(snapshot.error_code),
        );
        if state.stale {
            let marker = format!("(stale after {} failures)", state.consecutive_failures);
            line.push(' ');
            line.push_str(&self.paint_warn(&marker));
        }
        line
    }

    pub fn devices(&self, devices: &[DeviceInfo]) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => render_json(devices),
            OutputFormat::Plain => Ok(devices
                .iter()
                .map(|d| {
                    format!(
                        "{}\t{}\t{}\t{}",
                        d.did,
                        d.model.as_deref().unwrap_or("-"),
                        d.name.as_deref().unwrap_or("-"),
                        d.localip.as_deref().unwrap_or("-"),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    /// Acknowledgement for a control command.
    pub fn accepted(&self, command: &str, reply: &serde_json::Value) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => render_json(&json!({ "command": command, "reply": reply })),
            OutputFormat::Plain => Ok(format!("{command}: accepted")),
        }
    }

    // ── Field formatting ─────────────────────────────────────────────

    fn state(&self, state: Option<OperationalState>) -> String {
        let Some(state) = state else {
            return "unknown".into();
        };
        let text = state.to_string();
        if !self.color {
            return text;
        }
        match state {
            OperationalState::Cleaning => text.green().to_string(),
            OperationalState::Docked | OperationalState::Idle => text.cyan().to_string(),
            OperationalState::Paused => text.yellow().to_string(),
            OperationalState::Error => text.red().to_string(),
        }
    }

    fn battery(&self, status: &StatusSnapshot) -> String {
        let Some(level) = status.battery else {
            return "unknown".into();
        };
        let text = format!("{level}%");
        if status.low_battery() == Some(true) {
            self.paint_warn(&text)
        } else {
            text
        }
    }

    fn error_code(&self, code: Option<i64>) -> String {
        match code {
            None => "unknown".into(),
            Some(0) => "none".into(),
            Some(code) if self.color => code.red().to_string(),
            Some(code) => code.to_string(),
        }
    }

    fn paint_warn(&self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_owned()
        }
    }
}

fn yes_no(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Pretty-printed JSON.
pub fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
}
