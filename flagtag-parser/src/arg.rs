use core::{fmt, mem, str};

/**
A flag name or a flag value, borrowed from the command line.

Given `-target foo -path=bar`, a [`Visitor`][crate::Visitor] sees `target`,
`foo`, `path`, and `bar` as separate [`Arg`]s. They're raw bytes, because
arguments from the OS needn't be UTF-8; [`to_str`][Arg::to_str] checks.
*/
#[derive(Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Arg([u8]);

impl Arg {
    pub const fn new(bytes: &[u8]) -> &Self {
        // SAFETY: Arg is repr transparent to a byte slice, so it's safe to
        // transmute into it.
        unsafe { mem::transmute(bytes) }
    }

    pub const fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// This argument as text, if it's valid UTF-8
    pub fn to_str(&self) -> Option<&str> {
        str::from_utf8(&self.0).ok()
    }

    /// Split around the first `delimiter`, which belongs to neither half
    pub fn split_once(&self, delimiter: u8) -> Option<(&Arg, &Arg)> {
        memchr::memchr(delimiter, &self.0)
            .map(|i| (Arg::new(&self.0[..i]), Arg::new(&self.0[i + 1..])))
    }
}

impl PartialEq<[u8]> for Arg {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for Arg {
    fn eq(&self, other: &str) -> bool {
        self.0 == *other.as_bytes()
    }
}

impl PartialEq<&str> for Arg {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other.as_bytes()
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_str() {
            Some(s) => write!(f, "{s:?}"),
            None => write!(f, "{:?}", &self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_once() {
        let (name, value) = Arg::new(b"addr=a=b").split_once(b'=').unwrap();
        assert_eq!(name, "addr");
        assert_eq!(value, "a=b");

        assert!(Arg::new(b"verbose").split_once(b'=').is_none());
    }

    #[test]
    fn invalid_utf8() {
        let arg = Arg::new(b"\xff");
        assert!(arg.to_str().is_none());
        assert_eq!(arg, b"\xff" as &[u8]);
    }
}
