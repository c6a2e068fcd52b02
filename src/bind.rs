/*!
The typed binder: wires one field to one flag.

For each field the binder picks a cell by the field's kind, converts the
tag's default and writes it into the field, and registers the cell under the
tag's name. Registration only happens if the default converts.
*/

use std::rc::Rc;

use crate::{
    error::Error,
    field::{Accessor, BoundField, Collection},
    flag_set::FlagSet,
    impls::{Scalar, ScalarKind},
    tag::FlagSpec,
    value::{Codec, CodecValue, DelimitedValue, DurationCodec, Text, TimeCodec, TimeLayout, Value},
};

pub const DEFAULT_SLICE_DELIMITER: &str = ",";
pub const DEFAULT_MAP_DELIMITER: &str = ",";

/// Settings that affect how values are converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOptions {
    /// Separates the elements of a sequence flag
    pub slice_delimiter: String,

    /// Separates the `key=value` entries of a map flag
    pub map_delimiter: String,

    /// Required for timestamp fields
    pub time_layout: Option<TimeLayout>,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            slice_delimiter: DEFAULT_SLICE_DELIMITER.to_owned(),
            map_delimiter: DEFAULT_MAP_DELIMITER.to_owned(),
            time_layout: None,
        }
    }
}

/// What [`bind`] did with a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// A flag was registered
    Registered,

    /// The field's kind can't be bound, so it was left alone
    Ignored,
}

fn codec<S: 'static, C: Codec + 'static>(
    accessor: &Accessor<S, C::Target>,
    codec: C,
) -> Box<dyn Value<S>> {
    Box::new(CodecValue::new(accessor.clone(), codec))
}

fn scalar<S: 'static, T: Scalar>(accessor: &Accessor<S, T>) -> Box<dyn Value<S>> {
    codec(accessor, Text::<T>::new())
}

fn sequence<S: 'static>(
    element: ScalarKind,
    collection: &Rc<dyn Collection<S>>,
    delimiter: &str,
) -> Box<dyn Value<S>> {
    let label = format!("{element} with {delimiter:?} as separator");
    Box::new(DelimitedValue::new(Rc::clone(collection), delimiter, label))
}

fn map<S: 'static>(
    key: ScalarKind,
    value: ScalarKind,
    collection: &Rc<dyn Collection<S>>,
    delimiter: &str,
) -> Box<dyn Value<S>> {
    let label = format!("{key}={value} with {delimiter:?} as separator");
    Box::new(DelimitedValue::new(Rc::clone(collection), delimiter, label))
}

/**
Bind one field to a new flag in `flags`, named and described by `spec`.

The default is applied to the field before the flag is registered, so a
default that doesn't convert aborts binding with the conversion error and
nothing is registered. Timestamps are the exception: they need a
[`TimeLayout`] in `options`, and an empty default leaves the field as it is.
*/
pub fn bind<S: 'static>(
    flags: &mut FlagSet<S>,
    target: &mut S,
    binding: &BoundField<S>,
    spec: &FlagSpec,
    options: &BindOptions,
) -> Result<Bound, Error> {
    let mut apply_default = true;

    let value = match binding {
        BoundField::Duration(accessor) => codec(accessor, DurationCodec),
        BoundField::Timestamp(accessor) => {
            let layout = options.time_layout.clone().ok_or(Error::InvalidValue)?;
            apply_default = !spec.default.is_empty();
            codec(accessor, TimeCodec::new(layout))
        }
        BoundField::String(accessor) => scalar(accessor),
        BoundField::Bool(accessor) => scalar(accessor),
        BoundField::Int(accessor) => scalar(accessor),
        BoundField::Int64(accessor) => scalar(accessor),
        BoundField::Uint(accessor) => scalar(accessor),
        BoundField::Uint64(accessor) => scalar(accessor),
        BoundField::Float64(accessor) => scalar(accessor),
        BoundField::Sequence {
            element,
            collection,
        } => sequence(*element, collection, &options.slice_delimiter),
        BoundField::Map {
            key,
            value,
            collection,
        } => map(*key, *value, collection, &options.map_delimiter),
        BoundField::Unsupported => {
            tracing::debug!(flag = %spec.name, "field kind can't be bound, ignoring");
            return Ok(Bound::Ignored);
        }
    };

    if apply_default {
        value.set(target, &spec.default)?;
    }

    flags.var(&*spec.name, &*spec.desc, &*spec.default, value)?;

    tracing::debug!(flag = %spec.name, default = %spec.default, "registered flag");
    Ok(Bound::Registered)
}
