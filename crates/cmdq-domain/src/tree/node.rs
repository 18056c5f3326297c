use crate::args::{ArgSet, FromArgs, Prepare};
use crate::commands::{Command, Hook};
use cmdq_core::{CmdqError, CmdqResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a fresh command instance from bound arguments.
pub type Factory = Arc<dyn Fn(&ArgSet) -> CmdqResult<Box<dyn Command>> + Send + Sync>;

/// One token of a command path. A node may have children, a factory, or
/// both when a partial path is itself invocable.
#[derive(Clone, Default)]
pub struct Node {
    pub(crate) children: HashMap<String, Node>,
    pub(crate) factory: Option<Factory>,
    pub(crate) begin: Option<Hook>,
    pub(crate) end: Option<Hook>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&ArgSet) -> CmdqResult<Box<dyn Command>> + Send + Sync + 'static,
    {
        Self {
            factory: Some(Arc::new(factory)),
            ..Self::default()
        }
    }

    /// Leaf whose command is built with [`FromArgs`] on every resolve.
    pub fn typed<C>() -> Self
    where
        C: Command + FromArgs + 'static,
    {
        Self::with_factory(|args| Ok(Box::new(C::from_args(args)?) as Box<dyn Command>))
    }

    /// Leaf holding a prototype instance. Each resolve clones the prototype
    /// and prepares the clone, so concurrent resolves never share state.
    pub fn prototype<C>(prototype: C) -> Self
    where
        C: Command + Prepare + Clone + 'static,
    {
        Self::with_factory(move |args| {
            let mut instance = prototype.clone();
            instance.prepare(args)?;
            Ok(Box::new(instance) as Box<dyn Command>)
        })
    }

    pub fn on_begin(mut self, hook: Hook) -> Self {
        self.begin = Some(hook);
        self
    }

    pub fn on_end(mut self, hook: Hook) -> Self {
        self.end = Some(hook);
        self
    }

    pub fn has_handler(&self) -> bool {
        self.factory.is_some()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Adds an empty child and returns it for further nesting.
    pub fn add(&mut self, name: &str) -> CmdqResult<&mut Node> {
        self.add_node(name, Node::new())
    }

    pub fn add_node(&mut self, name: &str, node: Node) -> CmdqResult<&mut Node> {
        if self.children.contains_key(name) {
            return Err(CmdqError::DuplicateRegistration(name.to_string()));
        }
        Ok(self.children.entry(name.to_string()).or_insert(node))
    }

    pub(crate) fn child_or_insert(&mut self, name: &str) -> &mut Node {
        self.children.entry(name.to_string()).or_default()
    }

    /// Fails with the first position where both `self` and `other` define
    /// a handler. Leaves both nodes untouched.
    pub(crate) fn check_merge(&self, other: &Node, path: &str) -> CmdqResult<()> {
        if other.factory.is_some() && self.factory.is_some() {
            return Err(CmdqError::DuplicateRegistration(path.to_string()));
        }
        for (name, child) in &other.children {
            if let Some(existing) = self.children.get(name) {
                existing.check_merge(child, &format!("{} {}", path, name))?;
            }
        }
        Ok(())
    }

    /// Folds `other` into this node. Callers run [`Node::check_merge`] first;
    /// on a conflicting handler the existing one is kept.
    pub(crate) fn merge(&mut self, other: Node) {
        if self.factory.is_none() {
            self.factory = other.factory;
        }
        if other.begin.is_some() {
            self.begin = other.begin;
        }
        if other.end.is_some() {
            self.end = other.end;
        }
        for (name, child) in other.children {
            match self.children.get_mut(&name) {
                Some(existing) => existing.merge(child),
                None => {
                    self.children.insert(name, child);
                }
            }
        }
    }

    pub(crate) fn collect_paths(&self, prefix: &mut Vec<String>, out: &mut Vec<String>) {
        if self.factory.is_some() && !prefix.is_empty() {
            out.push(prefix.join(" "));
        }
        for (name, child) in &self.children {
            prefix.push(name.clone());
            child.collect_paths(prefix, out);
            prefix.pop();
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("has_handler", &self.factory.is_some())
            .field("has_begin", &self.begin.is_some())
            .field("has_end", &self.end.is_some())
            .finish()
    }
}
