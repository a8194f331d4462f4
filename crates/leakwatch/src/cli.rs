//! Clap derive structures for the `leakwatch` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Only clap types appear here so `build.rs` can include this file to
//! render man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// leakwatch -- water leak monitoring from the command line
#[derive(Debug, Parser)]
#[command(
    name = "leakwatch",
    version,
    about = "Monitor water leaks, sensors, and valves from the command line",
    long_about = "Command-line client for the Leakwatch leak-monitoring backend.\n\n\
        Browse leaks and readings, schedule valve operations, and follow\n\
        realtime leak alerts. Sessions are kept per profile and refreshed\n\
        automatically when the access token expires.",
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
    /// Backend profile to use
    #[arg(long, short = 'p', env = "LEAKWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API base URL (overrides profile)
    #[arg(long, env = "LEAKWATCH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Realtime alert WebSocket URL (overrides profile)
    #[arg(long, env = "LEAKWATCH_WS_URL", global = true)]
    pub ws_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LEAKWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "LEAKWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile and config defaults)
    #[arg(long, env = "LEAKWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session for this profile
    Login(LoginArgs),

    /// Revoke and clear the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Create an account
    Register(RegisterArgs),

    /// Confirm an email address with the emailed code
    VerifyEmail {
        /// Account email
        #[arg(long)]
        email: String,

        /// Verification code from the email
        code: String,
    },

    /// Reset a forgotten password
    PasswordReset(PasswordResetArgs),

    /// ESP boards, device counts, and sensor/valve positions
    #[command(alias = "dev")]
    Devices(DevicesArgs),

    /// Valve schedules and commands
    #[command(alias = "ctl")]
    Control(ControlArgs),

    /// Flow readings
    Readings(ReadingsArgs),

    /// Detected leaks
    Leaks(LeaksArgs),

    /// Follow realtime leak alerts
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ACCOUNT
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email (defaults to the profile's email)
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Display name
    #[arg(long)]
    pub username: String,

    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Debug, Args)]
pub struct PasswordResetArgs {
    #[command(subcommand)]
    pub command: PasswordResetCommand,
}

#[derive(Debug, Subcommand)]
pub enum PasswordResetCommand {
    /// Email a reset link
    Request {
        /// Account email
        #[arg(long)]
        email: String,
    },

    /// Set a new password using the reset token
    Confirm {
        /// Token from the reset email
        token: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

/// Province/district narrowing shared by location listings.
#[derive(Debug, Args)]
pub struct RegionArgs {
    /// Filter by province
    #[arg(long)]
    pub province: Option<String>,

    /// Filter by district
    #[arg(long)]
    pub district: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// Register an ESP board at a location
    Register {
        /// Hardware identifier printed on the board
        device_id: String,

        /// Friendly name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        province: String,

        #[arg(long)]
        district: String,

        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },

    /// Device counts per province
    Provinces,

    /// Device counts per district
    Districts {
        /// Only districts in this province
        #[arg(long)]
        province: Option<String>,
    },

    /// Sensor positions
    Sensors(RegionArgs),

    /// Valve positions
    Valves(RegionArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONTROL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ValveActionArg {
    Open,
    Close,
}

#[derive(Debug, Args)]
pub struct ControlArgs {
    #[command(subcommand)]
    pub command: ControlCommand,
}

#[derive(Debug, Subcommand)]
pub enum ControlCommand {
    /// Schedule a valve operation
    Schedule {
        /// Valve identifier
        valve_id: String,

        /// Operation to perform
        #[arg(long, value_enum)]
        action: ValveActionArg,

        /// Start time (RFC 3339, e.g. 2026-06-01T22:00:00Z)
        #[arg(long, conflicts_with = "after", required_unless_present = "after")]
        at: Option<String>,

        /// Start after a delay (e.g. 30m, 2h)
        #[arg(long = "in", value_name = "DELAY")]
        after: Option<String>,

        /// How long the valve stays in that position (e.g. 90m)
        #[arg(long)]
        duration: Option<String>,
    },

    /// Execution status of a schedule
    ScheduleStatus {
        /// Schedule identifier
        schedule_id: String,
    },

    /// Open or close a valve now
    Command {
        /// Valve identifier
        valve_id: String,

        /// Operation to perform
        #[arg(long, value_enum)]
        action: ValveActionArg,
    },

    /// Previously issued commands
    History {
        /// Page number
        #[arg(long)]
        page: Option<u32>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  READINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ReadingsArgs {
    #[command(subcommand)]
    pub command: ReadingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ReadingsCommand {
    /// Hourly flow readings
    Hourly {
        /// Only this device
        #[arg(long)]
        device: Option<String>,

        /// Day to show (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Readings flagged as critical
    Critical,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LEAKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LeakStatusArg {
    PotentialLeak,
    Investigating,
    Resolved,
}

#[derive(Debug, Args)]
pub struct LeaksArgs {
    #[command(subcommand)]
    pub command: LeaksCommand,
}

#[derive(Debug, Subcommand)]
pub enum LeaksCommand {
    /// List leaks
    #[command(alias = "ls")]
    List {
        #[arg(long, value_enum)]
        status: Option<LeakStatusArg>,

        #[command(flatten)]
        region: RegionArgs,

        /// Page number
        #[arg(long)]
        page: Option<u32>,
    },

    /// Leaks under investigation
    Investigating {
        #[arg(long)]
        page: Option<u32>,
    },

    /// Resolved and historical leaks
    History {
        #[arg(long)]
        page: Option<u32>,
    },

    /// Mark a leak as resolved
    Resolve {
        /// Leak identifier
        leak_id: String,

        /// Resolution note
        #[arg(long)]
        note: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Wait between reconnects in milliseconds (overrides profile)
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,

    /// Reconnects allowed without a successful open (overrides profile)
    #[arg(long)]
    pub max_reconnects: Option<u32>,

    /// Exit after this many alerts
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g., api_url, ws_url, email, timeout)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
