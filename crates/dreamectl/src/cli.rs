//! Clap derive structures for the `dreamectl` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// dreamectl -- control Dreame robot vacuums from the command line
#[derive(Debug, Parser)]
#[command(
    name = "dreamectl",
    version,
    about = "Control Dreame robot vacuums from the command line",
    long_about = "Talks to a Dreame vacuum either through the vendor cloud or directly\n\
        over the LAN with the device token. Devices are configured in config.toml\n\
        (see `dreamectl config path`).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "DREAMECTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device entry to use
    #[arg(long, short = 'd', env = "DREAMECTL_DEVICE", global = true)]
    pub device: Option<String>,

    /// Output format (overrides defaults.output)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Plain,
    /// JSON, one document per result
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Color if stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show battery, state, dock and error status
    #[command(alias = "st")]
    Status,

    /// Start cleaning
    Start,

    /// Pause the current job
    Pause,

    /// Send the vacuum back to its dock
    #[command(alias = "home")]
    Dock,

    /// Make the vacuum announce its position
    Locate,

    /// Set suction power as a percentage (clamped to 0-100)
    Fan(FanArgs),

    /// Clean a single room by segment id or configured name
    Room(RoomArgs),

    /// List devices reachable with the configured credentials
    #[command(alias = "ls")]
    Devices,

    /// Poll status continuously and print every update
    Watch(WatchArgs),

    /// Inspect the configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct FanArgs {
    /// Suction percentage
    #[arg(allow_hyphen_values = true)]
    pub percent: i32,
}

#[derive(Debug, Args)]
pub struct RoomArgs {
    /// Segment id, or a name from the device's [rooms] table
    pub room: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides the configured interval)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration with secrets masked
    Show,
    /// Validate every device entry
    Check,
}
