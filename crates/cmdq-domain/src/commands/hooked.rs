use super::{Command, Hook};
use crate::stream::CommandStream;
use async_trait::async_trait;
use cmdq_core::CmdqResult;

/// Wraps a resolved command with its node's begin/end hooks.
pub(crate) struct HookedCommand {
    pub inner: Box<dyn Command>,
    pub begin: Option<Hook>,
    pub end: Option<Hook>,
}

#[async_trait]
impl Command for HookedCommand {
    async fn execute(&self, stream: &mut CommandStream) -> CmdqResult<()> {
        if let Some(begin) = &self.begin {
            begin().await?;
        }

        let result = self.inner.execute(stream).await;

        // end always runs; the command's own error takes precedence
        let ended = match &self.end {
            Some(end) => end().await,
            None => Ok(()),
        };
        result.and(ended)
    }

    fn description(&self) -> String {
        self.inner.description()
    }
}
