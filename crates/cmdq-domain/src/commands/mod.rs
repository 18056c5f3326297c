use crate::stream::CommandStream;
use async_trait::async_trait;
use cmdq_core::CmdqResult;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

mod hooked;

pub(crate) use hooked::HookedCommand;

/// An executable command resolved from the command tree.
///
/// Implementations report their result by writing a [`CommandOutcome`] to
/// the stream. Returning `Err` is treated as a failed execution carrying the
/// error text.
#[async_trait]
pub trait Command: Send + Sync {
    async fn execute(&self, stream: &mut CommandStream) -> CmdqResult<()>;

    fn description(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Result written by a command to its stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Middleware run before or after a command.
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, CmdqResult<()>> + Send + Sync>;

pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CmdqResult<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}
