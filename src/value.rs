/*!
Flag cells: the typed, mutable slots a [`FlagSet`][crate::FlagSet] stores
its flags in. A cell doesn't own its value; it converts text and writes it
into the target structure through an [`Accessor`].
*/

use std::{borrow::Cow, marker::PhantomData, rc::Rc, time::Duration};

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};

use crate::{
    error::Error,
    field::{Accessor, Collection},
    impls::{Scalar, ScalarKind},
};

/// A flag cell living in a `FlagSet<S>`. Implement this to register flags
/// of your own types.
pub trait Value<S> {
    /// Convert `text` and store it in the target
    fn set(&self, target: &mut S, text: &str) -> Result<(), Error>;

    /// The current value as text, or `None` if it can't be reached
    fn get(&self, target: &S) -> Option<String>;

    /// Short description of the expected value, for usage text
    fn type_label(&self) -> Cow<'static, str>;

    /// Boolean flags may be given without a value: `-verbose` means
    /// `-verbose=true`.
    fn is_bool_flag(&self) -> bool {
        false
    }
}

/// Conversion between text and a single value
pub trait Codec {
    type Target: 'static;

    fn decode(&self, text: &str) -> Result<Self::Target, Error>;

    fn encode(&self, value: &Self::Target) -> String;

    fn label(&self) -> &'static str;

    fn is_bool(&self) -> bool {
        false
    }
}

/// Codec for any [`Scalar`]
pub struct Text<T>(PhantomData<fn() -> T>);

impl<T> Text<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Text<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Codec for Text<T> {
    type Target = T;

    #[inline]
    fn decode(&self, text: &str) -> Result<T, Error> {
        T::from_text(text)
    }

    #[inline]
    fn encode(&self, value: &T) -> String {
        value.to_text()
    }

    fn label(&self) -> &'static str {
        T::KIND.label()
    }

    fn is_bool(&self) -> bool {
        T::KIND == ScalarKind::Bool
    }
}

/// Codec for durations written like `300ms`, `5s`, or `1h 30m`.
///
/// Units take whole numbers only: write `1s 500ms`, not `1.5s`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationCodec;

impl Codec for DurationCodec {
    type Target = Duration;

    fn decode(&self, text: &str) -> Result<Duration, Error> {
        humantime::parse_duration(text).map_err(Error::from)
    }

    fn encode(&self, value: &Duration) -> String {
        humantime::format_duration(*value).to_string()
    }

    fn label(&self) -> &'static str {
        "duration"
    }
}

/// How timestamps are written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeLayout {
    /// `2006-01-02T15:04:05+07:00`
    Rfc3339,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc2822,
    /// A `strftime` style format string. If it has no UTC offset, values are
    /// read as UTC.
    Format(Cow<'static, str>),
}

impl TimeLayout {
    /// `02 Jan 06 15:04 -0700`
    pub const RFC822Z: Self = Self::Format(Cow::Borrowed("%d %b %y %H:%M %z"));

    /// `2006-01-02 15:04:05`, read as UTC
    pub const DATE_TIME: Self = Self::Format(Cow::Borrowed("%Y-%m-%d %H:%M:%S"));

    pub fn format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::Format(format.into())
    }

    pub fn parse(&self, text: &str) -> Result<DateTime<FixedOffset>, Error> {
        match self {
            TimeLayout::Rfc3339 => Ok(DateTime::parse_from_rfc3339(text)?),
            TimeLayout::Rfc2822 => Ok(DateTime::parse_from_rfc2822(text)?),
            TimeLayout::Format(format) => match DateTime::parse_from_str(text, format) {
                Ok(time) => Ok(time),
                Err(error) => match NaiveDateTime::parse_from_str(text, format) {
                    Ok(time) => Ok(time.and_utc().fixed_offset()),
                    Err(_) => Err(error.into()),
                },
            },
        }
    }

    pub fn render(&self, time: &DateTime<FixedOffset>) -> String {
        match self {
            TimeLayout::Rfc3339 => time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            TimeLayout::Rfc2822 => time.to_rfc2822(),
            TimeLayout::Format(format) => time.format(format).to_string(),
        }
    }
}

/// Codec for timestamps in a fixed [`TimeLayout`]
#[derive(Debug, Clone)]
pub struct TimeCodec {
    layout: TimeLayout,
}

impl TimeCodec {
    pub const fn new(layout: TimeLayout) -> Self {
        Self { layout }
    }
}

impl Codec for TimeCodec {
    type Target = DateTime<FixedOffset>;

    fn decode(&self, text: &str) -> Result<Self::Target, Error> {
        self.layout.parse(text)
    }

    fn encode(&self, value: &Self::Target) -> String {
        self.layout.render(value)
    }

    fn label(&self) -> &'static str {
        "time"
    }
}

/// A cell holding a single value, converted by a [`Codec`]
pub struct CodecValue<S, C: Codec> {
    accessor: Accessor<S, C::Target>,
    codec: C,
}

impl<S: 'static, C: Codec> CodecValue<S, C> {
    pub fn new(accessor: Accessor<S, C::Target>, codec: C) -> Self {
        Self { accessor, codec }
    }
}

impl<S: 'static, C: Codec> Value<S> for CodecValue<S, C> {
    fn set(&self, target: &mut S, text: &str) -> Result<(), Error> {
        let value = self.codec.decode(text)?;
        *self.accessor.get_mut(target).ok_or(Error::InvalidValue)? = value;
        Ok(())
    }

    fn get(&self, target: &S) -> Option<String> {
        self.accessor
            .get(target)
            .map(|value| self.codec.encode(value))
    }

    fn type_label(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.codec.label())
    }

    fn is_bool_flag(&self) -> bool {
        self.codec.is_bool()
    }
}

/// A sequence or map cell, read from a single delimited string
pub struct DelimitedValue<S> {
    collection: Rc<dyn Collection<S>>,
    delimiter: String,
    label: String,
}

impl<S> DelimitedValue<S> {
    pub fn new(
        collection: Rc<dyn Collection<S>>,
        delimiter: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            collection,
            delimiter: delimiter.into(),
            label: label.into(),
        }
    }
}

impl<S> Value<S> for DelimitedValue<S> {
    fn set(&self, target: &mut S, text: &str) -> Result<(), Error> {
        self.collection.assign(target, text, &self.delimiter)
    }

    fn get(&self, target: &S) -> Option<String> {
        self.collection.render(target, &self.delimiter)
    }

    fn type_label(&self) -> Cow<'static, str> {
        Cow::Owned(self.label.clone())
    }
}
