mod node;

pub use node::{Factory, Node};

use crate::args::ArgSet;
use crate::command_line::CommandLine;
use crate::commands::{Command, HookedCommand};
use cmdq_core::{CmdqError, CmdqResult};

/// Resolves command paths to fresh command instances.
///
/// The tree is built once and then shared read-only; resolving never
/// mutates it.
#[derive(Debug, Clone, Default)]
pub struct CommandTree {
    root: Node,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn add(&mut self, name: &str) -> CmdqResult<&mut Node> {
        self.root.add(name)
    }

    pub fn add_node(&mut self, name: &str, node: Node) -> CmdqResult<&mut Node> {
        self.root.add_node(name, node)
    }

    /// Attaches `node` at `path`, creating or reusing intermediate nodes.
    /// An existing node at the final token is merged with `node`.
    pub fn mount<S: AsRef<str>>(&mut self, path: &[S], node: Node) -> CmdqResult<()> {
        let Some((last, parents)) = path.split_last() else {
            return Err(CmdqError::EmptyPath);
        };

        let full = path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        let mut existing = Some(&self.root);
        for token in path {
            existing = existing.and_then(|n| n.child(token.as_ref()));
        }
        if let Some(existing) = existing {
            existing.check_merge(&node, &full)?;
        }

        let mut current = &mut self.root;
        for token in parents {
            current = current.child_or_insert(token.as_ref());
        }
        current.child_or_insert(last.as_ref()).merge(node);
        Ok(())
    }

    pub fn resolve(&self, line: &CommandLine) -> CmdqResult<Box<dyn Command>> {
        if line.path.is_empty() {
            return Err(CmdqError::EmptyPath);
        }

        let mut current = &self.root;
        for (depth, token) in line.path.iter().enumerate() {
            current = current
                .child(token)
                .ok_or_else(|| CmdqError::NotFound(line.path[..=depth].join(" ")))?;
        }

        let factory = current
            .factory
            .as_ref()
            .ok_or_else(|| CmdqError::MisconfiguredNode(line.path_string()))?;

        let args = ArgSet::parse(&line.args)?;
        let command = factory(&args)?;

        if current.begin.is_none() && current.end.is_none() {
            return Ok(command);
        }
        Ok(Box::new(HookedCommand {
            inner: command,
            begin: current.begin.clone(),
            end: current.end.clone(),
        }))
    }

    /// Every invocable path, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_paths(&mut Vec::new(), &mut out);
        out.sort();
        out
    }
}
