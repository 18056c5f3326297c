use chrono::{DateTime, Utc};
use cmdq_core::{CmdqError, CmdqResult};
use cmdq_domain::{
    CommandLine, HandlerBinding, HandlerConfig, HandlerTrigger, IntervalSpec, NewHandler,
    NewTrigger,
};
use cmdq_persistence::{CommandCatalog, EventTypeStore, HandlerStore};
use std::sync::Arc;

/// Validating facade over the handler catalogue.
///
/// Handlers must target an active registered command; event triggers must
/// name an active event type; scheduled triggers must carry a parseable
/// interval.
pub struct HandlerRegistry {
    commands: Arc<dyn CommandCatalog>,
    event_types: Arc<dyn EventTypeStore>,
    handlers: Arc<dyn HandlerStore>,
}

impl HandlerRegistry {
    pub fn new(
        commands: Arc<dyn CommandCatalog>,
        event_types: Arc<dyn EventTypeStore>,
        handlers: Arc<dyn HandlerStore>,
    ) -> Self {
        Self {
            commands,
            event_types,
            handlers,
        }
    }

    pub async fn register_handler(&self, handler: &NewHandler) -> CmdqResult<HandlerConfig> {
        CommandLine::from_parts(&handler.path, &handler.args)?;
        match self.commands.find_command(&handler.path).await? {
            Some(command) if command.active => {}
            _ => {
                return Err(CmdqError::NotFound(format!(
                    "no active command registered at '{}'",
                    handler.path
                )))
            }
        }
        let config = self.handlers.register_handler(handler).await?;
        tracing::info!("Registered handler '{}' -> '{}'", config.code, config.path);
        Ok(config)
    }

    pub async fn on_event(
        &self,
        handler_code: &str,
        event_type_code: &str,
        priority: i32,
    ) -> CmdqResult<HandlerTrigger> {
        let handler = self.active_handler(handler_code).await?;
        match self.event_types.find_event_type(event_type_code).await? {
            Some(event_type) if event_type.active => {}
            _ => {
                return Err(CmdqError::NotFound(format!(
                    "no active event type '{}'",
                    event_type_code
                )))
            }
        }
        self.handlers
            .add_trigger(&NewTrigger::on_event(handler.id, event_type_code, priority))
            .await
    }

    pub async fn scheduled(
        &self,
        handler_code: &str,
        interval_expr: &str,
        priority: i32,
    ) -> CmdqResult<HandlerTrigger> {
        let interval = IntervalSpec::parse(interval_expr)?;
        let handler = self.active_handler(handler_code).await?;
        self.handlers
            .add_trigger(&NewTrigger::scheduled(handler.id, interval, priority))
            .await
    }

    pub async fn deactivate_handler(&self, code: &str) -> CmdqResult<bool> {
        self.handlers.deactivate_handler(code).await
    }

    pub async fn deactivate_trigger(&self, trigger_id: i64) -> CmdqResult<bool> {
        self.handlers.deactivate_trigger(trigger_id).await
    }

    pub async fn active_handlers(&self) -> CmdqResult<Vec<HandlerConfig>> {
        self.handlers.active_handlers().await
    }

    pub async fn triggers_for(&self, handler_code: &str) -> CmdqResult<Vec<HandlerTrigger>> {
        let handler = self
            .handlers
            .find_handler(handler_code)
            .await?
            .ok_or_else(|| CmdqError::NotFound(format!("handler '{}'", handler_code)))?;
        self.handlers.triggers_for_handler(handler.id).await
    }

    pub async fn handlers_for_event(&self, event_type_code: &str) -> CmdqResult<Vec<HandlerBinding>> {
        self.handlers.handlers_for_event(event_type_code).await
    }

    pub async fn scheduled_handlers(&self) -> CmdqResult<Vec<HandlerBinding>> {
        self.handlers.scheduled_handlers().await
    }

    pub async fn record_run(&self, trigger_id: i64, at: DateTime<Utc>) -> CmdqResult<()> {
        self.handlers.record_run(trigger_id, at).await
    }

    async fn active_handler(&self, code: &str) -> CmdqResult<HandlerConfig> {
        match self.handlers.find_handler(code).await? {
            Some(handler) if handler.active => Ok(handler),
            _ => Err(CmdqError::NotFound(format!("no active handler '{}'", code))),
        }
    }
}
