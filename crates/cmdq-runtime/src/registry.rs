use cmdq_core::{CmdqError, CmdqResult};
use cmdq_domain::{
    canonical_path, Command, CommandDescriptor, CommandTree, FromArgs, Node, RegisteredCommand,
};
use cmdq_persistence::CommandCatalog;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

struct Registration {
    descriptor: CommandDescriptor,
    node: Node,
}

/// In-process command registrations backed by the persisted catalogue.
///
/// Registration upserts the catalogue row; [`CommandRegistry::build_tree`]
/// assembles a fresh [`CommandTree`] and makes the catalogue match what this
/// process registered. The sync is one way, from process to store.
pub struct CommandRegistry {
    catalog: Arc<dyn CommandCatalog>,
    entries: BTreeMap<String, Registration>,
}

impl CommandRegistry {
    pub fn new(catalog: Arc<dyn CommandCatalog>) -> Self {
        Self {
            catalog,
            entries: BTreeMap::new(),
        }
    }

    pub async fn register(
        &mut self,
        path: &str,
        descriptor: CommandDescriptor,
        node: Node,
    ) -> CmdqResult<RegisteredCommand> {
        let path = canonical_path(path);
        if path.is_empty() {
            return Err(CmdqError::EmptyPath);
        }
        if !node.has_handler() {
            return Err(CmdqError::MisconfiguredNode(path));
        }

        let registered = self.catalog.upsert_command(&path, &descriptor).await?;
        if self
            .entries
            .insert(path.clone(), Registration { descriptor, node })
            .is_some()
        {
            tracing::debug!("Replaced registration for '{}'", path);
        }
        Ok(registered)
    }

    pub async fn register_typed<C>(
        &mut self,
        path: &str,
        descriptor: CommandDescriptor,
    ) -> CmdqResult<RegisteredCommand>
    where
        C: Command + FromArgs + 'static,
    {
        self.register(path, descriptor, Node::typed::<C>()).await
    }

    /// Removes the in-process registration and deactivates the catalogue
    /// row. Unknown paths are a no-op.
    pub async fn deregister(&mut self, path: &str) -> CmdqResult<bool> {
        let path = canonical_path(path);
        let removed = self.entries.remove(&path).is_some();
        let deactivated = self.catalog.deactivate_command(&path).await?;
        Ok(removed || deactivated)
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&canonical_path(path))
    }

    pub async fn build_tree(&self) -> CmdqResult<CommandTree> {
        let mut tree = CommandTree::new();
        for (path, registration) in &self.entries {
            let tokens: Vec<&str> = path.split(' ').collect();
            tree.mount(&tokens, registration.node.clone())?;
        }

        let persisted = self.catalog.active_commands().await?;
        let active: HashSet<&str> = persisted.iter().map(|c| c.path.as_str()).collect();

        for command in &persisted {
            if !self.entries.contains_key(&command.path) {
                self.catalog.deactivate_command(&command.path).await?;
                tracing::info!("Deactivated stale command '{}'", command.path);
            }
        }
        for (path, registration) in &self.entries {
            if !active.contains(path.as_str()) {
                self.catalog
                    .upsert_command(path, &registration.descriptor)
                    .await?;
                tracing::info!("Reactivated command '{}'", path);
            }
        }

        tracing::debug!("Built command tree with {} paths", self.entries.len());
        Ok(tree)
    }
}
