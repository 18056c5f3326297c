use crate::error::CmdqError;

pub type CmdqResult<T> = Result<T, CmdqError>;
