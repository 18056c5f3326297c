use crate::context::CliContext;
use crate::output;
use cmdq_runtime::Runtime;

pub async fn handle(ctx: &CliContext) -> anyhow::Result<()> {
    let tree = ctx.command_tree().await?;
    let runtime = Runtime::with_store(ctx.store.clone(), tree, &ctx.config)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C");
    runtime.shutdown().await?;

    output::output_success(serde_json::json!({ "stopped": true }));
    Ok(())
}
