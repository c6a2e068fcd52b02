/*!
Text conversions for the primitive types a flag can hold on its own or as
an element of a sequence or map.
 */

use std::fmt::{self, Display};

use crate::error::Error;

/// The primitive kinds a flag can hold. Sequence and map flags record the
/// kinds of their elements so usage text can describe them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Bool,
    Int,
    Int64,
    Uint,
    Uint64,
    Float64,
}

impl ScalarKind {
    /// The word used for this kind in usage text
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Bool => "bool",
            ScalarKind::Int | ScalarKind::Int64 => "int",
            ScalarKind::Uint | ScalarKind::Uint64 => "uint",
            ScalarKind::Float64 => "float",
        }
    }
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A primitive value that round-trips through text.
pub trait Scalar: Sized + 'static {
    const KIND: ScalarKind;

    fn from_text(text: &str) -> Result<Self, Error>;

    fn to_text(&self) -> String;
}

macro_rules! from_str {
    ($($type:ty => $kind:ident,)*) => {
        $(
            impl Scalar for $type {
                const KIND: ScalarKind = ScalarKind::$kind;

                #[inline]
                fn from_text(text: &str) -> Result<Self, Error> {
                    text.parse().map_err(Error::from)
                }

                #[inline]
                fn to_text(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

from_str! {
    isize => Int,
    i64 => Int64,
    usize => Uint,
    u64 => Uint64,
    f64 => Float64,
}

impl Scalar for String {
    const KIND: ScalarKind = ScalarKind::String;

    #[inline]
    fn from_text(text: &str) -> Result<Self, Error> {
        Ok(text.to_owned())
    }

    #[inline]
    fn to_text(&self) -> String {
        self.clone()
    }
}

impl Scalar for bool {
    const KIND: ScalarKind = ScalarKind::Bool;

    fn from_text(text: &str) -> Result<Self, Error> {
        match text {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(Error::InvalidBool(text.to_owned())),
        }
    }

    #[inline]
    fn to_text(&self) -> String {
        self.to_string()
    }
}
