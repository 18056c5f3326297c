use crate::cli::CommandAction;
use crate::context::CliContext;
use crate::output;
use cmdq_persistence::CommandCatalog;

pub async fn handle(ctx: &CliContext, action: CommandAction) -> anyhow::Result<()> {
    match action {
        CommandAction::List => {
            let commands = ctx.store.active_commands().await?;
            output::output_list(commands);
        }
        CommandAction::Sync => {
            let registry = ctx.command_registry().await?;
            registry.build_tree().await?;
            output::output_list(registry.paths());
        }
    }
    Ok(())
}
