use std::{
    fmt::Display,
    io::{self, Write as _},
};

use indent_write::io::IndentWriter;
use lazy_format::lazy_format;

use crate::flag_set::{Flag, FlagSet};

/// Describe how a flag's default relates to its current value
fn default_note<'a>(default: &'a str, current: Option<&'a str>) -> impl Display + 'a {
    let changed = current.filter(|&current| current != default);

    lazy_format! {
        match (changed) {
            Some(current) => " (default {default:?} current {current:?})",
            None => " (default {default:?})",
        }
    }
}

/// Write the description of a single flag: a header line with the name and
/// type label, then the indented usage text and default.
fn describe<S>(out: &mut (impl io::Write + ?Sized), flag: &Flag<S>, target: &S) -> io::Result<()> {
    write!(
        out,
        "  -{name} {label}",
        name = flag.name(),
        label = flag.value().type_label()
    )?;

    let current = flag.value().get(target);

    {
        // Four spaces before the tab aligns with both 4- and 8-space tab
        // stops.
        let mut out = IndentWriter::new("    \t", &mut *out);
        write!(
            out,
            "\n{usage}{note}",
            usage = flag.usage(),
            note = default_note(flag.default_text(), current.as_deref())
        )?;
    }

    writeln!(out)
}

/// Write every flag's description, in name order.
pub fn write_defaults<S>(
    out: &mut (impl io::Write + ?Sized),
    flags: &FlagSet<S>,
    target: &S,
) -> io::Result<()> {
    flags
        .iter()
        .try_for_each(|flag| describe(&mut *out, flag, target))
}

/// The default usage message: a `Usage of <name>:` header followed by every
/// flag.
pub fn write_usage<S>(
    out: &mut (impl io::Write + ?Sized),
    flags: &FlagSet<S>,
    target: &S,
) -> io::Result<()> {
    match flags.name() {
        "" => writeln!(out, "Usage:")?,
        name => writeln!(out, "Usage of {name}:")?,
    }

    write_defaults(out, flags, target)
}
