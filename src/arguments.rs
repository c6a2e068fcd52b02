use std::ffi::{OsStr, OsString};

/// Owned command line arguments, including the program name, for a
/// [`FlagSource`][crate::FlagSource] to parse.
#[derive(Debug, Clone, Default)]
pub struct LoadedArguments {
    arguments: Vec<OsString>,
}

impl LoadedArguments {
    pub fn from_env() -> Self {
        Self {
            arguments: std::env::args_os().collect(),
        }
    }

    /// Arguments from somewhere other than the environment. The first one is
    /// the program name.
    pub fn new(arguments: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn argv0(&self) -> Option<&OsStr> {
        self.arguments.first().map(OsString::as_os_str)
    }

    /// The program name, lossily converted to text. Empty if there are no
    /// arguments at all.
    pub fn program_name(&self) -> String {
        self.argv0()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Everything after the program name, as raw bytes
    pub fn flag_args(&self) -> impl Iterator<Item = &[u8]> {
        self.arguments
            .get(1..)
            .unwrap_or(&[])
            .iter()
            .map(|arg| arg.as_encoded_bytes())
    }
}
