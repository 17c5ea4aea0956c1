use crate::export::ExportFormat;
use crate::models::ids::UserId;
use crate::models::project::ProjectStatus;
use crate::models::role::Role;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line interface for shopfloor
/// Track manufacturing work sessions and notify project owners on completion
#[derive(Parser)]
#[command(
    name = "shopfloor",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track manufacturing work sessions, notify project leads on completion, and watch live changes",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    /// Act as this user id
    #[arg(global = true, long = "as", value_name = "USER_ID")]
    pub as_user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn actor(&self) -> Option<UserId> {
        self.as_user.as_deref().map(UserId::from)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Inspect the configuration file
    Config {
        #[arg(long = "print", help = "Print the effective configuration")]
        print_config: bool,

        #[arg(long = "check", help = "Check configuration file for missing fields")]
        check: bool,
    },

    /// Print the internal audit log
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },

    /// Show the acting user, role and landing view
    Whoami,

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage projects (project leads only)
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage project components
    Component {
        #[command(subcommand)]
        action: ComponentAction,
    },

    /// Manage manufacturing processes
    Process {
        #[command(subcommand)]
        action: ProcessAction,
    },

    /// Start a work session for the acting assembler
    Start {
        #[arg(long, value_name = "PROJECT_ID")]
        project: String,

        #[arg(long, value_name = "COMPONENT_ID")]
        component: String,

        #[arg(long, value_name = "PROCESS_ID")]
        process: String,
    },

    /// Record parts completed so far
    Progress(SessionParts),

    /// Pause an in-progress session
    Pause(SessionRef),

    /// Resume a paused session
    Resume(SessionRef),

    /// Complete a session with the final parts count
    End(SessionParts),

    /// List work sessions
    Sessions {
        #[arg(long, help = "Only in-progress sessions of the acting user")]
        active: bool,

        #[arg(long, value_name = "PROJECT_ID", conflicts_with = "active")]
        project: Option<String>,
    },

    /// List notifications of the acting user
    Notifications {
        #[arg(long = "read", value_name = "NOTIFICATION_ID", help = "Mark a notification as read")]
        read: Option<String>,
    },

    /// Show rollups
    Analytics {
        #[arg(long, value_name = "PROJECT_ID", group = "scope")]
        project: Option<String>,

        #[arg(long, value_name = "USER_ID", group = "scope")]
        assembler: Option<String>,

        #[arg(long, group = "scope")]
        summary: bool,
    },

    /// Export work history
    Export {
        #[arg(long, value_enum, value_name = "FORMAT", default_value = "csv")]
        format: ExportFormat,

        /// Output file path (absolute path required)
        #[arg(long, value_name = "FILE")]
        file: String,

        #[arg(long, value_name = "USER_ID")]
        assembler: Option<String>,

        /// Overwrite output file without confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Print live change events
    Watch {
        #[arg(long, value_name = "PROJECT_ID", conflicts_with = "assembler")]
        project: Option<String>,

        #[arg(long, value_name = "USER_ID")]
        assembler: Option<String>,

        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(long, value_name = "N")]
        seconds: Option<u64>,

        /// Poll interval for changes made by other processes, in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 500)]
        poll_ms: u64,
    },
}

#[derive(Args)]
pub struct SessionRef {
    #[arg(value_name = "SESSION_ID")]
    pub session: String,
}

#[derive(Args)]
pub struct SessionParts {
    #[arg(value_name = "SESSION_ID")]
    pub session: String,

    #[arg(value_name = "PARTS", allow_negative_numbers = true)]
    pub parts: i64,
}

#[derive(Subcommand)]
pub enum UserAction {
    Add {
        name: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, value_enum)]
        role: RoleArg,
    },
    List,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    Add {
        name: String,

        #[arg(long, default_value_t = 0)]
        quantity: i64,
    },
    List,
    Status {
        #[arg(value_name = "PROJECT_ID")]
        project: String,

        #[arg(value_enum)]
        status: ProjectStatusArg,
    },
}

#[derive(Subcommand)]
pub enum ComponentAction {
    Add {
        #[arg(long, value_name = "PROJECT_ID")]
        project: String,

        name: String,

        #[arg(long, default_value_t = 0)]
        quantity: i64,
    },
    List {
        #[arg(long, value_name = "PROJECT_ID")]
        project: String,
    },
}

#[derive(Subcommand)]
pub enum ProcessAction {
    Add { name: String },
    List,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RoleArg {
    Lead,
    Assembler,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Lead => Role::ProjectLead,
            RoleArg::Assembler => Role::Assembler,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ProjectStatusArg {
    Active,
    Paused,
    Completed,
}

impl From<ProjectStatusArg> for ProjectStatus {
    fn from(value: ProjectStatusArg) -> Self {
        match value {
            ProjectStatusArg::Active => ProjectStatus::Active,
            ProjectStatusArg::Paused => ProjectStatus::Paused,
            ProjectStatusArg::Completed => ProjectStatus::Completed,
        }
    }
}
