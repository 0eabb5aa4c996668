//! Command-line arguments for wavecache-cli.

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;
use wavecache_api_types::SwitchKind;

#[derive(Debug, Parser)]
#[command(
    name = "wavecache-cli",
    version,
    about = "Operational client for the wavecache administrative API"
)]
pub struct Cli {
    /// Base URL of the wavecache service.
    #[arg(
        long,
        env = "WAVECACHE_URL",
        default_value = "http://127.0.0.1:8404",
        value_name = "URL"
    )]
    pub url: Url,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show switch states, quota and entry counts.
    Status,
    /// Enable or disable one of the operational switches.
    Switch(SwitchArgs),
    /// Adjust the live precompute quota.
    Quota(QuotaArgs),
    /// Invalidate cached entries.
    Invalidate(InvalidateArgs),
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Which switch to write.
    #[arg(value_enum)]
    pub switch: SwitchName,

    /// Desired state.
    #[arg(value_enum)]
    pub state: SwitchState,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SwitchName {
    Update,
    Invalidate,
    Precompute,
}

impl From<SwitchName> for SwitchKind {
    fn from(name: SwitchName) -> Self {
        match name {
            SwitchName::Update => SwitchKind::Update,
            SwitchName::Invalidate => SwitchKind::Invalidate,
            SwitchName::Precompute => SwitchKind::Precompute,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SwitchState {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct QuotaArgs {
    /// New quota (at least 1).
    pub quota: u32,
}

#[derive(Debug, Args)]
pub struct InvalidateArgs {
    /// Invalidate every valid entry.
    #[arg(long, conflicts_with_all = ["ruleset", "region"])]
    pub all: bool,

    /// Invalidate entries computed under this ruleset.
    #[arg(long, value_name = "RULESET_ID", conflicts_with = "region")]
    pub ruleset: Option<String>,

    /// Invalidate entries near a changed region; repeatable.
    #[arg(long, value_name = "LAT,LON[,KM]")]
    pub region: Vec<String>,
}
