use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use declarative::Operation;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "greenlake")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of GreenLake data services resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Seconds between task polls
    #[arg(long, global = true, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Maximum number of task polls
    #[arg(long, global = true, value_name = "N")]
    pub poll_attempts: Option<u32>,

    /// Indent the JSON report
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Control-plane connection settings. Unset values fall back to the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Config file with host and client credentials (JSON or TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Data services host URL
    #[arg(long, global = true, env = "GREENLAKE_HOST")]
    pub host: Option<String>,

    /// OAuth2 client id
    #[arg(long, global = true, env = "GREENLAKE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, global = true, env = "GREENLAKE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Token endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub token_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage a host
    Host(ResourceArgs),

    /// Manage a host group
    HostGroup(ResourceArgs),

    /// Manage a volume
    Volume(VolumeArgs),

    /// Manage a volume set
    VolumeSet(VolumeSetArgs),

    /// Gather facts about existing resources
    Facts(FactsArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Resource commands
// ============================================================================

#[derive(Args)]
pub struct ResourceArgs {
    /// Desired state
    #[arg(value_enum)]
    pub state: PresenceState,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Resource id
    #[arg(long)]
    pub id: Option<String>,

    /// Resource name
    #[arg(long)]
    pub name: Option<String>,

    /// Desired fields from a JSON or TOML file
    #[arg(long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Desired field as key=value (value parsed as JSON when possible)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(Args)]
pub struct VolumeArgs {
    #[command(flatten)]
    pub resource: ResourceArgs,

    /// Storage system id
    #[arg(long)]
    pub system_id: String,
}

#[derive(Args)]
pub struct VolumeSetArgs {
    /// Desired state
    #[arg(value_enum)]
    pub state: VolumeSetState,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Storage system id
    #[arg(long)]
    pub system_id: String,

    /// Storage device type
    #[arg(long, value_enum, default_value = "1")]
    pub device_type: DeviceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresenceState {
    Present,
    Absent,
}

impl From<PresenceState> for Operation {
    fn from(state: PresenceState) -> Self {
        match state {
            PresenceState::Present => Operation::Present,
            PresenceState::Absent => Operation::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VolumeSetState {
    Present,
    Absent,
    Export,
    Unexport,
}

impl From<VolumeSetState> for Operation {
    fn from(state: VolumeSetState) -> Self {
        match state {
            VolumeSetState::Present => Operation::Present,
            VolumeSetState::Absent => Operation::Absent,
            VolumeSetState::Export => Operation::Export,
            VolumeSetState::Unexport => Operation::Unexport,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceType {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
        }
    }
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Args)]
pub struct FactsArgs {
    /// Resource kind to query
    #[arg(value_enum)]
    pub kind: FactsKind,

    /// Resource id
    #[arg(long)]
    pub id: Option<String>,

    /// Resource name
    #[arg(long)]
    pub name: Option<String>,

    /// Storage system id
    #[arg(long)]
    pub system_id: Option<String>,

    /// Storage device type
    #[arg(long, value_enum)]
    pub device_type: Option<DeviceType>,

    /// Query parameter as key=value (filter, sort, limit, offset, select)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Extra facts to gather: getVolumes, getSnapshots
    #[arg(long = "option", value_name = "NAME")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FactsKind {
    Hosts,
    HostGroups,
    HostInitiators,
    Volumes,
    VolumeSets,
    StorageSystems,
    AuditEvents,
}
