//! Commands every `cmdq` process serves out of the box.

use async_trait::async_trait;
use cmdq_core::{CmdqError, CmdqResult};
use cmdq_domain::{ArgSet, Command, CommandDescriptor, CommandStream, FromArgs};
use cmdq_runtime::CommandRegistry;
use std::time::Duration;

/// Writes `--text`, or the payload when no text is given.
pub struct Echo {
    text: Option<String>,
}

impl FromArgs for Echo {
    fn from_args(args: &ArgSet) -> CmdqResult<Self> {
        Ok(Self {
            text: args.optional("text")?,
        })
    }
}

#[async_trait]
impl Command for Echo {
    async fn execute(&self, stream: &mut CommandStream) -> CmdqResult<()> {
        let output = match &self.text {
            Some(text) => text.clone(),
            None => stream.payload().to_string(),
        };
        stream.succeed(output);
        Ok(())
    }

    fn description(&self) -> String {
        "Echo --text or the payload".to_string()
    }
}

pub struct Sleep {
    duration: Duration,
}

impl FromArgs for Sleep {
    fn from_args(args: &ArgSet) -> CmdqResult<Self> {
        let ms: u64 = args.required("ms")?;
        Ok(Self {
            duration: Duration::from_millis(ms),
        })
    }
}

#[async_trait]
impl Command for Sleep {
    async fn execute(&self, stream: &mut CommandStream) -> CmdqResult<()> {
        tokio::time::sleep(self.duration).await;
        stream.succeed(format!("slept {}ms", self.duration.as_millis()));
        Ok(())
    }
}

/// Always fails; useful for exercising retries.
pub struct Fail {
    message: String,
}

impl FromArgs for Fail {
    fn from_args(args: &ArgSet) -> CmdqResult<Self> {
        Ok(Self {
            message: args
                .optional("message")?
                .unwrap_or_else(|| "requested failure".to_string()),
        })
    }
}

#[async_trait]
impl Command for Fail {
    async fn execute(&self, _stream: &mut CommandStream) -> CmdqResult<()> {
        Err(CmdqError::Execution(self.message.clone()))
    }
}

pub async fn register(registry: &mut CommandRegistry) -> CmdqResult<()> {
    registry
        .register_typed::<Echo>(
            "system echo",
            CommandDescriptor::new("Echo --text or the payload").with_schema(r#"{"text":"string?"}"#),
        )
        .await?;
    registry
        .register_typed::<Sleep>(
            "system sleep",
            CommandDescriptor::new("Sleep for --ms milliseconds").with_schema(r#"{"ms":"u64"}"#),
        )
        .await?;
    registry
        .register_typed::<Fail>(
            "system fail",
            CommandDescriptor::new("Fail with --message").with_schema(r#"{"message":"string?"}"#),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdq_domain::{CommandLine, CommandTree, Node};

    fn tree() -> CommandTree {
        let mut tree = CommandTree::new();
        tree.mount(&["system", "echo"], Node::typed::<Echo>()).unwrap();
        tree.mount(&["system", "sleep"], Node::typed::<Sleep>()).unwrap();
        tree.mount(&["system", "fail"], Node::typed::<Fail>()).unwrap();
        tree
    }

    #[tokio::test]
    async fn test_echo_prefers_text_over_payload() {
        let tree = tree();

        let command = tree
            .resolve(&CommandLine::parse("system echo --text=hi").unwrap())
            .unwrap();
        let mut stream = CommandStream::new(r#"{"a":1}"#);
        command.execute(&mut stream).await.unwrap();
        assert_eq!(stream.outcome().unwrap().output.as_deref(), Some("hi"));

        let command = tree
            .resolve(&CommandLine::parse("system echo").unwrap())
            .unwrap();
        let mut stream = CommandStream::new(r#"{"a":1}"#);
        command.execute(&mut stream).await.unwrap();
        assert_eq!(stream.outcome().unwrap().output.as_deref(), Some(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn test_sleep_requires_ms() {
        let tree = tree();
        assert!(matches!(
            tree.resolve(&CommandLine::parse("system sleep").unwrap()),
            Err(CmdqError::Syntax(_))
        ));

        let command = tree
            .resolve(&CommandLine::parse("system sleep --ms=1").unwrap())
            .unwrap();
        let mut stream = CommandStream::new("{}");
        command.execute(&mut stream).await.unwrap();
        assert!(stream.outcome().unwrap().success);
    }

    #[tokio::test]
    async fn test_fail_returns_execution_error() {
        let command = tree()
            .resolve(&CommandLine::parse("system fail --message=boom").unwrap())
            .unwrap();
        let err = command
            .execute(&mut CommandStream::new("{}"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), CmdqError::Execution("boom".to_string()).to_string());
    }
}
