/*!
Parser for the tag strings attached to struct fields.

A tag is a comma separated list of `key=value` segments with the keys `name`,
`desc`, and `default`:

```text
name=broker,desc='description with, comma',default='127.0.0.1:9092'
```

A value that starts with `'` runs to the next unescaped `'`, so it may
contain commas. Empty segments, from a trailing or doubled comma, are
ignored. Other segments that don't start with a known key are glued, comma
included, onto the value of the key before them, which means an unquoted
`default=a,b,c` still comes out as `a,b,c`.
*/

use memchr::memchr;

/// The name, description, and default value parsed out of one tag string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    pub desc: String,
    pub default: String,
}

#[derive(Debug, Clone, Copy)]
enum Key {
    Name,
    Desc,
    Default,
}

impl FlagSpec {
    /// Parse a tag string. This never fails: unknown segments are folded into
    /// the previous value, and a tag with no known keys produces an empty
    /// spec.
    pub fn parse(tag: &str) -> Self {
        let mut spec = Self::default();
        let mut current = None;

        for segment in Segments::new(tag) {
            // Trailing and doubled commas separate nothing
            if segment.is_empty() {
                continue;
            }

            let (key, value) = match segment.split_once('=') {
                Some(("name", value)) => (Some(Key::Name), value),
                Some(("desc", value)) => (Some(Key::Desc), value),
                Some(("default", value)) => (Some(Key::Default), value),
                _ => (None, segment),
            };

            match (key, current) {
                (Some(key), _) => {
                    let slot = spec.slot(key);
                    slot.clear();
                    slot.push_str(value);
                    current = Some(key);
                }
                (None, Some(key)) => {
                    let slot = spec.slot(key);
                    slot.push(',');
                    slot.push_str(value);
                }
                (None, None) => {}
            }
        }

        Self {
            name: unquote(&spec.name),
            desc: unquote(&spec.desc),
            default: unquote(&spec.default),
        }
    }

    fn slot(&mut self, key: Key) -> &mut String {
        match key {
            Key::Name => &mut self.name,
            Key::Desc => &mut self.desc,
            Key::Default => &mut self.default,
        }
    }
}

/// Strip one leading and one trailing quote, and unescape `\'`
fn unquote(value: &str) -> String {
    let value = value.strip_prefix('\'').unwrap_or(value);
    let value = value.strip_suffix('\'').unwrap_or(value);

    value.replace("\\'", "'")
}

/// Iterator over the comma separated segments of a tag, treating a quoted
/// value as a single unit.
struct Segments<'a> {
    rest: Option<&'a str>,
}

impl<'a> Segments<'a> {
    fn new(tag: &'a str) -> Self {
        Self {
            rest: (!tag.is_empty()).then_some(tag),
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        let bytes = rest.as_bytes();

        // If this segment's value is quoted, the comma search starts after
        // the closing quote. An unterminated quote runs to the end.
        let search_from = match memchr(b'=', bytes) {
            Some(eq)
                if bytes.get(eq + 1) == Some(&b'\'') && memchr(b',', &bytes[..eq]).is_none() =>
            {
                closing_quote(bytes, eq + 2).map_or(bytes.len(), |quote| quote + 1)
            }
            _ => 0,
        };

        match memchr(b',', &bytes[search_from..]) {
            Some(i) => {
                let end = search_from + i;
                self.rest = Some(&rest[end + 1..]);
                Some(&rest[..end])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

/// Find the first `'` at or after `from` that isn't preceded by a backslash
fn closing_quote(bytes: &[u8], mut from: usize) -> Option<usize> {
    loop {
        let found = from + memchr(b'\'', bytes.get(from..)?)?;

        match bytes[found - 1] {
            b'\\' => from = found + 1,
            _ => return Some(found),
        }
    }
}
