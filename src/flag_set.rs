use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt,
    io::{self, Write as _},
    mem, process,
    rc::Rc,
};

use flagtag_parser::{Arg, ArgAccess, ArgumentsParser};

use crate::{error::Error, printers, value::Value};

/// What a [`FlagSet`] does when parsing fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorHandling {
    /// Return the error to the caller
    ContinueOnError,

    /// Exit the process with status 2, or 0 if help was requested
    #[default]
    ExitOnError,

    /// Panic with the error
    PanicOnError,
}

/// Custom usage printer. It gets the flag set, the current state of the
/// target (for current values), and the output to write to.
pub type UsageFn<S> = Rc<dyn Fn(&FlagSet<S>, &S, &mut dyn io::Write) -> io::Result<()>>;

/// One registered flag
pub struct Flag<S> {
    name: String,
    usage: String,
    default: String,
    value: Box<dyn Value<S>>,
}

impl<S> Flag<S> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// The default, as text
    #[inline]
    pub fn default_text(&self) -> &str {
        &self.default
    }

    #[inline]
    pub fn value(&self) -> &dyn Value<S> {
        &*self.value
    }

    /// Set the value from text, attaching the flag name and the offending
    /// text to any error.
    fn assign(&self, target: &mut S, text: &str) -> Result<(), Error> {
        self.value
            .set(target, text)
            .map_err(|error| Error::Flag {
                name: self.name.clone(),
                value: text.to_owned(),
                source: Box::new(error),
            })
    }
}

impl<S> fmt::Debug for Flag<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/**
A set of named flags whose values live in a target structure `S`.

A `FlagSet` doesn't hold on to the target: it's passed in to every operation
that reads or writes values. Flags are visited in lexicographic order.
*/
pub struct FlagSet<S> {
    name: String,
    error_handling: ErrorHandling,
    flags: BTreeMap<String, Flag<S>>,
    output: Box<dyn io::Write>,
    usage: Option<UsageFn<S>>,
    parsed: bool,
    args: Vec<String>,
}

impl<S> FlagSet<S> {
    pub fn new(name: impl Into<String>, error_handling: ErrorHandling) -> Self {
        Self {
            name: name.into(),
            error_handling,
            flags: BTreeMap::new(),
            output: Box::new(io::stderr()),
            usage: None,
            parsed: false,
            args: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    pub fn set_error_handling(&mut self, error_handling: ErrorHandling) {
        self.error_handling = error_handling;
    }

    /// Where errors and usage text are written. Defaults to stderr.
    pub fn set_output(&mut self, output: impl io::Write + 'static) {
        self.output = Box::new(output);
    }

    pub fn set_usage(&mut self, usage: UsageFn<S>) {
        self.usage = Some(usage);
    }

    /// Register a flag. Names are unique; registering a name twice is an
    /// error and leaves the original flag in place.
    pub fn var(
        &mut self,
        name: impl Into<String>,
        usage: impl Into<String>,
        default: impl Into<String>,
        value: Box<dyn Value<S>>,
    ) -> Result<(), Error> {
        match self.flags.entry(name.into()) {
            Entry::Occupied(entry) => Err(Error::Redefined(entry.key().clone())),
            Entry::Vacant(entry) => {
                let name = entry.key().clone();
                entry.insert(Flag {
                    name,
                    usage: usage.into(),
                    default: default.into(),
                    value,
                });
                Ok(())
            }
        }
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<&Flag<S>> {
        self.flags.get(name)
    }

    /// Set a flag by name, as if it were given on the command line
    pub fn set(&self, target: &mut S, name: &str, text: &str) -> Result<(), Error> {
        self.lookup(name)
            .ok_or_else(|| Error::Undefined(name.to_owned()))?
            .assign(target, text)
    }

    /// All flags, in lexicographic order
    pub fn iter(&self) -> impl Iterator<Item = &Flag<S>> {
        self.flags.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// True once [`parse`][Self::parse] has been called
    #[inline]
    pub fn parsed(&self) -> bool {
        self.parsed
    }

    /// The arguments left over after flag parsing stopped
    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Write the usage message, using the custom usage function if one was
    /// set.
    pub fn write_usage(&self, target: &S, out: &mut dyn io::Write) -> io::Result<()> {
        match self.usage {
            Some(ref usage) => usage(self, target, out),
            None => printers::write_usage(out, self, target),
        }
    }

    /**
    Parse flags from `arguments`, which should not include the program name,
    storing values into `target`. Parsing stops at the first argument that
    isn't a flag, or after `--`; the rest are available from
    [`args`][Self::args].

    On failure the error and the usage message are written to the output,
    and then the [`ErrorHandling`] policy decides what happens.
    */
    pub fn parse<'arg, I, A>(&mut self, target: &mut S, arguments: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = &'arg A>,
        A: AsRef<[u8]> + ?Sized + 'arg,
    {
        self.parsed = true;

        let mut parser =
            ArgumentsParser::new(arguments.into_iter().map(|arg: &'arg A| arg.as_ref()));

        let result = loop {
            match parser.next_arg(Visitor {
                flags: &*self,
                target: &mut *target,
            }) {
                None => break Ok(()),
                Some(Ok(())) => continue,
                Some(Err(error)) => break Err(error),
            }
        };

        self.args = parser.remaining().map(lossy).collect();

        match result {
            Ok(()) => Ok(()),
            Err(error) => self.fail(target, error),
        }
    }

    fn fail(&mut self, target: &S, error: Error) -> Result<(), Error> {
        let help = matches!(error, Error::HelpRequested);

        // The usage function borrows the whole set, so the output is moved
        // out while it runs.
        let mut output = mem::replace(&mut self.output, Box::new(io::sink()));
        if !help {
            let _ = writeln!(output, "{error}");
        }
        let _ = self.write_usage(target, &mut *output);
        self.output = output;

        match self.error_handling {
            ErrorHandling::ContinueOnError => Err(error),
            ErrorHandling::ExitOnError => process::exit(if help { 0 } else { 2 }),
            ErrorHandling::PanicOnError => panic!("{error}"),
        }
    }

    fn resolve(&self, name: &str) -> Result<&Flag<S>, Error> {
        match self.flags.get(name) {
            Some(flag) => Ok(flag),
            None if name == "help" || name == "h" => Err(Error::HelpRequested),
            None => Err(Error::Undefined(name.to_owned())),
        }
    }
}

impl<S> fmt::Debug for FlagSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name)
            .field("error_handling", &self.error_handling)
            .field("flags", &self.flags)
            .field("parsed", &self.parsed)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

fn lossy(arg: &Arg) -> String {
    String::from_utf8_lossy(arg.bytes()).into_owned()
}

fn arg_as_str(arg: &Arg) -> Result<&str, Error> {
    arg.to_str().ok_or_else(|| Error::InvalidUtf8(lossy(arg)))
}

struct Visitor<'a, S> {
    flags: &'a FlagSet<S>,
    target: &'a mut S,
}

impl<'arg, S> flagtag_parser::Visitor<'arg> for Visitor<'_, S> {
    type Value = Result<(), Error>;

    fn visit_flag(self, name: &'arg Arg, argument: impl ArgAccess<'arg>) -> Self::Value {
        let name = arg_as_str(name)?;
        let flag = self.flags.resolve(name)?;

        if flag.value.is_bool_flag() {
            return flag.assign(self.target, "true");
        }

        let argument = argument
            .take()
            .ok_or_else(|| Error::NeedsArgument(name.to_owned()))?;

        tracing::trace!(flag = name, "parsed flag");
        flag.assign(self.target, arg_as_str(argument)?)
    }

    fn visit_flag_with_argument(self, name: &'arg Arg, argument: &'arg Arg) -> Self::Value {
        let name = arg_as_str(name)?;
        let flag = self.flags.resolve(name)?;

        tracing::trace!(flag = name, "parsed flag");
        flag.assign(self.target, arg_as_str(argument)?)
    }

    fn visit_bad_syntax(self, argument: &'arg Arg) -> Self::Value {
        Err(Error::BadSyntax(lossy(argument)))
    }
}
