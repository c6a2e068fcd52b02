use std::num::{ParseFloatError, ParseIntError};

/// Boxed error returned by lifecycle hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while binding, parsing, or running a source.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A value couldn't be stored: a map entry that isn't `key=value`, a
    /// timestamp without a configured layout, or a field that went missing
    /// behind an `Option`.
    #[error("invalid value specified")]
    InvalidValue,

    #[error("invalid boolean value {0:?}")]
    InvalidBool(String),

    #[error(transparent)]
    ParseInt(#[from] ParseIntError),

    #[error(transparent)]
    ParseFloat(#[from] ParseFloatError),

    #[error(transparent)]
    Duration(#[from] humantime::DurationError),

    #[error(transparent)]
    Time(#[from] chrono::ParseError),

    #[error("not implemented")]
    NotImplemented,

    #[error("flag redefined: {0}")]
    Redefined(String),

    #[error("bad flag syntax: {0}")]
    BadSyntax(String),

    #[error("flag provided but not defined: -{0}")]
    Undefined(String),

    #[error("flag needs an argument: -{0}")]
    NeedsArgument(String),

    /// A command line value was rejected by the flag's cell
    #[error("invalid value {value:?} for flag -{name}: {source}")]
    Flag {
        name: String,
        value: String,
        #[source]
        source: Box<Error>,
    },

    #[error("argument is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// `-h` or `-help` was given and no such flag is defined
    #[error("flag: help requested")]
    HelpRequested,

    #[error("hook failed: {0}")]
    Hook(#[source] BoxError),
}
