use crate::cli::EventAction;
use crate::context::CliContext;
use crate::output;
use cmdq_domain::NewOutboxEvent;
use cmdq_persistence::OutboxStore;
use cmdq_runtime::{EventProcessor, EventProcessorOptions};
use std::sync::Arc;

pub async fn handle(ctx: &CliContext, action: EventAction) -> anyhow::Result<()> {
    match action {
        EventAction::Emit {
            event_type,
            payload,
            aggregate_id,
            metadata,
        } => {
            let mut event = NewOutboxEvent::new(event_type, payload);
            if let Some(aggregate_id) = aggregate_id {
                event = event.with_aggregate(aggregate_id);
            }
            if let Some(metadata) = metadata {
                event = event.with_metadata(metadata);
            }
            let id = ctx.store.append_event(&event).await?;
            match ctx.store.get_event(id).await? {
                Some(event) => output::output_success(&event),
                None => output::output_error(&format!("Event not found after append: {}", id)),
            }
        }
        EventAction::Pending { limit } => {
            let events = ctx.store.fetch_pending(limit).await?;
            output::output_list(events);
        }
        EventAction::Process => {
            let processor = EventProcessor::new(
                ctx.store.clone(),
                Arc::new(ctx.handlers()),
                ctx.store.clone(),
                EventProcessorOptions::from_config(&ctx.config),
            )?;
            let processed = processor.process_batch().await?;
            output::output_success(serde_json::json!({ "processed": processed }));
        }
    }
    Ok(())
}
