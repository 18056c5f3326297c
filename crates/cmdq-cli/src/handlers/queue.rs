use crate::cli::{EnqueueArgs, QueueAction};
use crate::context::CliContext;
use crate::output;
use cmdq_domain::{CommandLine, NewQueuedCommand};
use cmdq_persistence::WorkQueueStore;
use cmdq_runtime::{QueueProcessorOptions, WorkQueueProcessor};

pub async fn handle_enqueue(ctx: &CliContext, args: EnqueueArgs) -> anyhow::Result<()> {
    let line = CommandLine::parse(&args.line)?;
    let command = NewQueuedCommand::from_line(&line).with_payload(args.payload);
    let id = ctx.store.enqueue(&command).await?;
    match ctx.store.get(id).await? {
        Some(queued) => output::output_success(&queued),
        None => output::output_error(&format!("Queued command not found after enqueue: {}", id)),
    }
    Ok(())
}

pub async fn handle(ctx: &CliContext, action: QueueAction) -> anyhow::Result<()> {
    match action {
        QueueAction::List { state, limit } => {
            let commands = ctx.store.list(state, limit).await?;
            output::output_list(commands);
        }
        QueueAction::Get { id } => match ctx.store.get(id).await? {
            Some(queued) => output::output_success(&queued),
            None => output::output_error(&format!("Queued command not found: {}", id)),
        },
        QueueAction::Retry { id } => {
            ctx.store.requeue(id).await?;
            match ctx.store.get(id).await? {
                Some(queued) => output::output_success(&queued),
                None => output::output_error(&format!("Queued command not found: {}", id)),
            }
        }
        QueueAction::Process => {
            let tree = ctx.command_tree().await?;
            let processor = WorkQueueProcessor::new(
                ctx.store.clone(),
                tree,
                QueueProcessorOptions::from_config(&ctx.config),
            )?;
            let processed = processor.process_batch().await?;
            output::output_success(serde_json::json!({ "processed": processed }));
        }
    }
    Ok(())
}
