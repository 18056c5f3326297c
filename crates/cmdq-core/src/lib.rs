pub mod config;
pub mod error;
pub mod result;

pub use config::RuntimeConfig;
pub use error::CmdqError;
pub use result::CmdqResult;
