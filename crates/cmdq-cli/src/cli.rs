use clap::{Args, Parser, Subcommand};
use cmdq_domain::QueueState;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cmdq")]
#[command(about = "Hierarchical command queue with outbox fan-out and interval scheduling", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the SQLite database (or set CMDQ_DB env var)
    #[arg(long, value_name = "FILE", env = "CMDQ_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Path to a TOML runtime config (or set CMDQ_CONFIG env var)
    #[arg(long, value_name = "FILE", env = "CMDQ_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the queue processor, event processor and scheduler until Ctrl-C
    Serve,
    /// Registered command operations
    Command(CommandCommand),
    /// Put a command line on the work queue
    Enqueue(EnqueueArgs),
    /// Work queue operations
    Queue(QueueCommand),
    /// Outbox event operations
    Event(EventCommand),
    /// Event type catalogue operations
    EventType(EventTypeCommand),
    /// Handler operations
    Handler(HandlerCommand),
    /// Handler trigger operations
    Trigger(TriggerCommand),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    pub fn is_long_running(&self) -> bool {
        matches!(self, Commands::Serve)
    }
}

// Command catalogue
#[derive(Args)]
pub struct CommandCommand {
    #[command(subcommand)]
    pub action: CommandAction,
}

#[derive(Subcommand)]
pub enum CommandAction {
    /// List active registered commands
    List,
    /// Register the built-in commands and deactivate stale ones
    Sync,
}

#[derive(Args)]
pub struct EnqueueArgs {
    /// Command line, e.g. "system echo --text=hi"
    #[arg(value_name = "LINE")]
    pub line: String,
    /// Payload handed to the command
    #[arg(long, default_value = "{}")]
    pub payload: String,
}

// Work queue
#[derive(Args)]
pub struct QueueCommand {
    #[command(subcommand)]
    pub action: QueueAction,
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// List queued commands, newest first
    List {
        #[arg(long)]
        state: Option<QueueState>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Get a queued command
    Get {
        #[arg(long)]
        id: i64,
    },
    /// Move a failed command back to pending
    Retry {
        #[arg(long)]
        id: i64,
    },
    /// Claim and run one batch with the built-in commands, then exit
    Process,
}

// Outbox
#[derive(Args)]
pub struct EventCommand {
    #[command(subcommand)]
    pub action: EventAction,
}

#[derive(Subcommand)]
pub enum EventAction {
    /// Append an event to the outbox
    Emit {
        #[arg(long = "type")]
        event_type: String,
        #[arg(long, default_value = "{}")]
        payload: String,
        #[arg(long)]
        aggregate_id: Option<String>,
        #[arg(long)]
        metadata: Option<String>,
    },
    /// List unprocessed events
    Pending {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Fan one batch of pending events out to their handlers, then exit
    Process,
}

// Event types
#[derive(Args)]
pub struct EventTypeCommand {
    #[command(subcommand)]
    pub action: EventTypeAction,
}

#[derive(Subcommand)]
pub enum EventTypeAction {
    /// Register or update an event type
    Register {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List active event types
    List,
    /// Deactivate an event type
    Deactivate {
        #[arg(long)]
        code: String,
    },
}

// Handlers
#[derive(Args)]
pub struct HandlerCommand {
    #[command(subcommand)]
    pub action: HandlerAction,
}

#[derive(Subcommand)]
pub enum HandlerAction {
    /// Register or update a handler targeting a registered command
    Register(HandlerRegisterArgs),
    /// List active handlers
    List,
    /// Deactivate a handler
    Deactivate {
        #[arg(long)]
        code: String,
    },
}

#[derive(Args)]
pub struct HandlerRegisterArgs {
    #[arg(long)]
    pub code: String,
    /// Target command path, e.g. "system echo"
    #[arg(long)]
    pub path: String,
    /// Argument string passed to the command, e.g. "--text=hi"
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub args: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

// Triggers
#[derive(Args)]
pub struct TriggerCommand {
    #[command(subcommand)]
    pub action: TriggerAction,
}

#[derive(Subcommand)]
pub enum TriggerAction {
    /// Run a handler for every event of a type
    OnEvent {
        #[arg(long)]
        handler: String,
        #[arg(long)]
        event: String,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// Run a handler on a fixed interval (dd:hh:mm:ss)
    Scheduled {
        #[arg(long)]
        handler: String,
        #[arg(long)]
        interval: String,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// List a handler's triggers
    List {
        #[arg(long)]
        handler: String,
    },
    /// Deactivate a trigger
    Deactivate {
        #[arg(long)]
        id: i64,
    },
}
