#![no_std]

/*!
Low-level tokenizer for single-dash style command line flags, the syntax
where `-name` and `--name` mean the same thing, values are attached as
`-name=value` or given as the following argument, and parsing stops at the
first argument that isn't a flag. No type handling happens here; whether a
flag wants a value is decided by the [`Visitor`].
*/

#[cfg(test)]
extern crate std;

mod arg;

use core::{iter::Peekable, marker::PhantomData};

pub use arg::Arg;

/**
The [`ArgumentsParser`] type operates by passing flags it finds into a
[`Visitor`], to be handled.
 */
pub trait Visitor<'arg> {
    type Value;

    /// A flag with no attached value, such as `-name` or `--name`. The
    /// visitor may take the following argument as the value.
    fn visit_flag(self, name: &'arg Arg, argument: impl ArgAccess<'arg>) -> Self::Value;

    /// A flag that definitely has a value, because it was given as
    /// `-name=value`
    fn visit_flag_with_argument(self, name: &'arg Arg, argument: &'arg Arg) -> Self::Value;

    /// An argument that starts like a flag but can't be one, such as `---x`
    /// or `-=x`
    fn visit_bad_syntax(self, argument: &'arg Arg) -> Self::Value;
}

/**
[`ArgAccess`] allows a visitor to decide if a given flag needs a value, based
on the identity of the flag.

Consider `-verbose file.txt`. If `verbose` is a boolean switch, `file.txt` is
the first positional argument and flag parsing ends there; otherwise it's the
value of `-verbose`. The parser can't tell these apart, so a visitor requests
the value through this trait only for flags that need one.
*/
pub trait ArgAccess<'arg>: Sized {
    /**
    Take the next command line argument, whatever it looks like, as the value
    of the current flag. Returns [`None`] if the arguments are exhausted.
    */
    fn take(self) -> Option<&'arg Arg>;
}

/**
An `ArgumentsParser` is the main entry point into `flagtag_parser`. Each call
to [`next_arg`][ArgumentsParser::next_arg] sends one flag to the given
[`Visitor`], until a terminator is reached:

- the arguments are exhausted;
- an argument doesn't start with `-`, or is exactly `-`. This argument is
  left in place, and is the first item of [`remaining`][Self::remaining];
- an argument is exactly `--`. This argument is consumed.

[flagtag-parser][crate] operates entirely on borrowed data. The `'arg`
lifetime refers to this borrowed command line data.
*/
#[derive(Debug, Clone)]
pub struct ArgumentsParser<'arg, I>
where
    I: Iterator<Item = &'arg [u8]>,
{
    args: Peekable<I>,
    finished: bool,
    phantom: PhantomData<&'arg [u8]>,
}

impl<'arg, I> ArgumentsParser<'arg, I>
where
    I: Iterator<Item = &'arg [u8]>,
{
    /**
    Create a new [`ArgumentsParser`] from an iterator of byte slices, where
    each byte slice is a single argument received from the command line. This
    list should *exclude* the name of the program.
     */
    #[inline]
    #[must_use]
    pub fn new(args: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            args: args.into_iter().peekable(),
            finished: false,
            phantom: PhantomData,
        }
    }

    /// True once a terminator has been reached. After this, `next_arg` always
    /// returns `None`.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn next_arg<V>(&mut self, visitor: V) -> Option<V::Value>
    where
        V: Visitor<'arg>,
    {
        if self.finished {
            return None;
        }

        let argument = match self.args.peek() {
            Some(&argument) => argument,
            None => {
                self.finished = true;
                return None;
            }
        };

        let name = match argument {
            b"--" => {
                self.args.next();
                self.finished = true;
                return None;
            }
            [b'-', b'-', name @ ..] => name,
            [b'-', name @ ..] if !name.is_empty() => name,
            _ => {
                self.finished = true;
                return None;
            }
        };

        self.args.next();

        Some(match name {
            [] | [b'-' | b'=', ..] => visitor.visit_bad_syntax(Arg::new(argument)),
            name => {
                let name = Arg::new(name);

                match name.split_once(b'=') {
                    Some((name, value)) => visitor.visit_flag_with_argument(name, value),
                    None => visitor.visit_flag(name, StandardArgAccess { parent: self }),
                }
            }
        })
    }

    /// Consume the parser, returning the arguments that weren't parsed as
    /// flags.
    pub fn remaining(self) -> impl Iterator<Item = &'arg Arg> {
        self.args.map(Arg::new)
    }
}

/// ArgAccess implementation that gets the next argument from the list.
struct StandardArgAccess<'a, 'arg, I>
where
    I: Iterator<Item = &'arg [u8]>,
{
    parent: &'a mut ArgumentsParser<'arg, I>,
}

impl<'arg, I> ArgAccess<'arg> for StandardArgAccess<'_, 'arg, I>
where
    I: Iterator<Item = &'arg [u8]>,
{
    fn take(self) -> Option<&'arg Arg> {
        self.parent.args.next().map(Arg::new)
    }
}
