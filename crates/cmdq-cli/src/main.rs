mod builtins;
mod cli;
mod context;
mod handlers;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use context::CliContext;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Ok(log_path) = std::env::var("CMDQ_DEBUG_LOG") {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .init();
    } else {
        let default_level = if cli.command.is_long_running() {
            "info"
        } else {
            "warn"
        };
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .init();
    }

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "cmdq", &mut std::io::stdout());
        return Ok(());
    }

    if let Err(e) = run(cli).await {
        output::output_error(&format!("{:#}", e));
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = CliContext::load(cli.db, cli.config).await?;

    match cli.command {
        Commands::Serve => handlers::serve::handle(&ctx).await?,
        Commands::Command(cmd) => handlers::command::handle(&ctx, cmd.action).await?,
        Commands::Enqueue(args) => handlers::queue::handle_enqueue(&ctx, args).await?,
        Commands::Queue(cmd) => handlers::queue::handle(&ctx, cmd.action).await?,
        Commands::Event(cmd) => handlers::event::handle(&ctx, cmd.action).await?,
        Commands::EventType(cmd) => handlers::event_type::handle(&ctx, cmd.action).await?,
        Commands::Handler(cmd) => handlers::handler::handle(&ctx, cmd.action).await?,
        Commands::Trigger(cmd) => handlers::trigger::handle(&ctx, cmd.action).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
