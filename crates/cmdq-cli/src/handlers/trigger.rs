use crate::cli::TriggerAction;
use crate::context::CliContext;
use crate::output;

pub async fn handle(ctx: &CliContext, action: TriggerAction) -> anyhow::Result<()> {
    let handlers = ctx.handlers();
    match action {
        TriggerAction::OnEvent {
            handler,
            event,
            priority,
        } => {
            let trigger = handlers.on_event(&handler, &event, priority).await?;
            output::output_success(&trigger);
        }
        TriggerAction::Scheduled {
            handler,
            interval,
            priority,
        } => {
            let trigger = handlers.scheduled(&handler, &interval, priority).await?;
            output::output_success(&trigger);
        }
        TriggerAction::List { handler } => {
            let triggers = handlers.triggers_for(&handler).await?;
            output::output_list(triggers);
        }
        TriggerAction::Deactivate { id } => {
            if !handlers.deactivate_trigger(id).await? {
                output::output_error(&format!("Trigger not found: {}", id));
            }
            output::output_success(serde_json::json!({ "deactivated": id }));
        }
    }
    Ok(())
}
