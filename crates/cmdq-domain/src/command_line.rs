use cmdq_core::{CmdqError, CmdqResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tokenized invocation: bare path tokens followed by `--name[=value]`
/// argument tokens. The first token starting with `--` ends the path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub path: Vec<String>,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Splits a whitespace separated line such as `orden pagar --orderId=5`.
    pub fn parse(input: &str) -> CmdqResult<Self> {
        Self::from_tokens(input.split_whitespace())
    }

    pub fn from_tokens<I, S>(tokens: I) -> CmdqResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut line = Self::default();
        for token in tokens {
            let token = token.into();
            if token.starts_with("--") {
                validate_arg(&token)?;
                line.args.push(token);
            } else if line.args.is_empty() {
                line.path.push(token);
            } else {
                return Err(CmdqError::Syntax(format!(
                    "unexpected token '{}' after arguments",
                    token
                )));
            }
        }
        Ok(line)
    }

    /// Builds a line from a stored path and argument string, as persisted on
    /// queue rows and handler configurations.
    pub fn from_parts(path: &str, args: &str) -> CmdqResult<Self> {
        let path_tokens: Vec<String> = path.split_whitespace().map(str::to_string).collect();
        if let Some(bad) = path_tokens.iter().find(|t| t.starts_with("--")) {
            return Err(CmdqError::Syntax(format!(
                "path token '{}' looks like an argument",
                bad
            )));
        }

        let mut arg_tokens = Vec::new();
        for token in args.split_whitespace() {
            if !token.starts_with("--") {
                return Err(CmdqError::Syntax(format!(
                    "argument '{}' must start with --",
                    token
                )));
            }
            validate_arg(token)?;
            arg_tokens.push(token.to_string());
        }

        Ok(Self {
            path: path_tokens,
            args: arg_tokens,
        })
    }

    pub fn path_string(&self) -> String {
        self.path.join(" ")
    }

    pub fn args_string(&self) -> String {
        self.args.join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.path_string())
        } else {
            write!(f, "{} {}", self.path_string(), self.args_string())
        }
    }
}

fn validate_arg(token: &str) -> CmdqResult<()> {
    let name = token.trim_start_matches("--");
    let name = name.split_once('=').map_or(name, |(n, _)| n);
    if name.is_empty() {
        return Err(CmdqError::Syntax(format!("argument '{}' has no name", token)));
    }
    Ok(())
}
