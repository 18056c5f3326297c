use chrono::{NaiveDate, NaiveDateTime};
use cmdq_core::{CmdqError, CmdqResult};
use std::collections::BTreeMap;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parsed `--name` / `--name=value` arguments of one invocation.
///
/// Commands read their inputs through the typed accessors below; every
/// accessor reports a malformed or missing value as [`CmdqError::Syntax`]
/// naming the offending flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSet {
    values: BTreeMap<String, Option<String>>,
}

impl ArgSet {
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> CmdqResult<Self> {
        let mut values = BTreeMap::new();
        for token in tokens {
            let token = token.as_ref();
            let body = token.strip_prefix("--").ok_or_else(|| {
                CmdqError::Syntax(format!("argument '{}' must start with --", token))
            })?;
            let (name, value) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (body, None),
            };
            if name.is_empty() {
                return Err(CmdqError::Syntax(format!("argument '{}' has no name", token)));
            }
            if values.insert(name.to_string(), value).is_some() {
                return Err(CmdqError::Syntax(format!("--{} given more than once", name)));
            }
        }
        Ok(Self { values })
    }

    /// Boolean switch: absent is false, bare `--name` is true, and an
    /// explicit `--name=true|false` is honoured.
    pub fn flag(&self, name: &str) -> CmdqResult<bool> {
        match self.values.get(name) {
            None => Ok(false),
            Some(None) => Ok(true),
            Some(Some(raw)) => raw
                .parse::<bool>()
                .map_err(|_| invalid(name, raw)),
        }
    }

    pub fn required<T: FromStr>(&self, name: &str) -> CmdqResult<T> {
        self.optional(name)?
            .ok_or_else(|| CmdqError::Syntax(format!("--{} is required", name)))
    }

    pub fn optional<T: FromStr>(&self, name: &str) -> CmdqResult<Option<T>> {
        match self.raw(name)? {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| invalid(name, raw)),
        }
    }

    pub fn required_date(&self, name: &str) -> CmdqResult<NaiveDateTime> {
        self.optional_date(name)?
            .ok_or_else(|| CmdqError::Syntax(format!("--{} is required", name)))
    }

    /// Accepts `yyyy-mm-dd` (midnight) or `yyyy-mm-ddTHH:MM:SS`.
    pub fn optional_date(&self, name: &str) -> CmdqResult<Option<NaiveDateTime>> {
        let Some(raw) = self.raw(name)? else {
            return Ok(None);
        };
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT) {
            return Ok(Some(dt));
        }
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Some)
            .ok_or_else(|| invalid(name, raw))
    }

    fn raw(&self, name: &str) -> CmdqResult<Option<&str>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(None) => Err(CmdqError::Syntax(format!("--{} must have a value", name))),
            Some(Some(raw)) => Ok(Some(raw.as_str())),
        }
    }
}

fn invalid(name: &str, raw: &str) -> CmdqError {
    CmdqError::Syntax(format!("--{}: invalid value '{}'", name, raw))
}

/// Builds a fresh command from its arguments.
pub trait FromArgs: Sized {
    fn from_args(args: &ArgSet) -> CmdqResult<Self>;
}

/// Binds arguments onto an existing (cloned) command instance.
pub trait Prepare {
    fn prepare(&mut self, args: &ArgSet) -> CmdqResult<()>;
}
