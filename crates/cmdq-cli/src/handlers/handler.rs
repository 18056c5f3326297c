use crate::cli::{HandlerAction, HandlerRegisterArgs};
use crate::context::CliContext;
use crate::output;
use cmdq_domain::{HandlerConfig, NewHandler};
use cmdq_runtime::HandlerRegistry;

pub async fn handle(ctx: &CliContext, action: HandlerAction) -> anyhow::Result<()> {
    let handlers = ctx.handlers();
    match action {
        HandlerAction::Register(args) => {
            let handler = handle_register(&handlers, args).await?;
            output::output_success(&handler);
        }
        HandlerAction::List => {
            let active = handlers.active_handlers().await?;
            output::output_list(active);
        }
        HandlerAction::Deactivate { code } => {
            if !handlers.deactivate_handler(&code).await? {
                output::output_error(&format!("Handler not found: {}", code));
            }
            output::output_success(serde_json::json!({ "deactivated": code }));
        }
    }
    Ok(())
}

async fn handle_register(
    handlers: &HandlerRegistry,
    args: HandlerRegisterArgs,
) -> anyhow::Result<HandlerConfig> {
    let mut handler = NewHandler::new(args.code, &args.path, args.args);
    if let Some(name) = args.name {
        handler = handler.with_name(name);
    }
    if let Some(description) = args.description {
        handler = handler.with_description(description);
    }
    Ok(handlers.register_handler(&handler).await?)
}
