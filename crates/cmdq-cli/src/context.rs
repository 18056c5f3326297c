use crate::builtins;
use anyhow::Context;
use cmdq_core::RuntimeConfig;
use cmdq_domain::CommandTree;
use cmdq_persistence::SqliteStore;
use cmdq_runtime::{CommandRegistry, HandlerRegistry};
use std::path::PathBuf;
use std::sync::Arc;

pub struct CliContext {
    pub store: Arc<SqliteStore>,
    pub config: RuntimeConfig,
}

impl CliContext {
    pub async fn load(db: Option<PathBuf>, config: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => RuntimeConfig::load_from(&path)?,
            None => RuntimeConfig::load(),
        };

        let db = match db {
            Some(path) => path,
            None => RuntimeConfig::default_db_path()
                .ok_or_else(|| anyhow::anyhow!("--db is required on this platform"))?,
        };
        if let Some(parent) = db.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let store = Arc::new(SqliteStore::new(&db));
        store.init().await?;
        tracing::debug!("Opened database {}", db.display());
        Ok(Self { store, config })
    }

    pub fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new(self.store.clone(), self.store.clone(), self.store.clone())
    }

    /// Registers the built-in commands and returns the registry
    pub async fn command_registry(&self) -> anyhow::Result<CommandRegistry> {
        let mut registry = CommandRegistry::new(self.store.clone());
        builtins::register(&mut registry).await?;
        Ok(registry)
    }

    /// Registers the built-ins, syncs the catalogue and builds the tree
    pub async fn command_tree(&self) -> anyhow::Result<Arc<CommandTree>> {
        let registry = self.command_registry().await?;
        Ok(Arc::new(registry.build_tree().await?))
    }
}
