use crate::cli::EventTypeAction;
use crate::context::CliContext;
use crate::output;
use cmdq_domain::NewEventType;
use cmdq_persistence::EventTypeStore;

pub async fn handle(ctx: &CliContext, action: EventTypeAction) -> anyhow::Result<()> {
    match action {
        EventTypeAction::Register {
            code,
            name,
            description,
        } => {
            let mut event_type = NewEventType::new(code, name);
            if let Some(description) = description {
                event_type = event_type.with_description(description);
            }
            let event_type = ctx.store.upsert_event_type(&event_type).await?;
            output::output_success(&event_type);
        }
        EventTypeAction::List => {
            let event_types = ctx.store.active_event_types().await?;
            output::output_list(event_types);
        }
        EventTypeAction::Deactivate { code } => {
            if !ctx.store.deactivate_event_type(&code).await? {
                output::output_error(&format!("Event type not found: {}", code));
            }
            output::output_success(serde_json::json!({ "deactivated": code }));
        }
    }
    Ok(())
}
