/*!
Bind the fields of a configuration structure to command line flags, driven by
per-field tag text.

Each field carries a tag like
`name=broker,desc='broker address',default='127.0.0.1:9092'`. [`FlagSpec`]
parses that grammar; [`bind`] picks a typed cell for the field, applies the
default, and registers a flag in a [`FlagSet`]; [`FlagSource`] drives the
whole thing as one [`Source`] of a configuration loader, with init, load,
save and watch stages.

Fields are enumerated with [`#[derive(Fields)]`][derive@Fields]:

```no_run
use std::{collections::HashMap, time::Duration};

use flagtag::{Fields, FlagSource, Source as _};

#[derive(Fields, Default)]
struct Config {
    #[tags(flag = "name=broker,desc='description with, comma',default='127.0.0.1:9092'")]
    broker: String,

    #[tags(flag = "name=addr,desc='addresses',default='127.0.0.1:9092'")]
    addr: Vec<String>,

    #[tags(flag = "name=wait,desc='wait time',default='2s'", env = "WAIT")]
    wait: Duration,

    #[tags(flag = "name=metadata,desc='some meta',default=''")]
    metadata: HashMap<String, isize>,
}

let mut config = Config::default();
FlagSource::new(&mut config).init_and_load()?;
# Ok::<(), flagtag::Error>(())
```

Supported field kinds are `String`, `bool`, `isize`, `i64`, `usize`, `u64`,
`f64`, [`Duration`][std::time::Duration], `DateTime<FixedOffset>`, `Vec`s of
the scalar kinds, and `HashMap`s or `BTreeMap`s from scalar to scalar. Any of
these may sit behind `Option` or `Box`; a `None` field is skipped.

Tagging a field of any other type is a compile error, since the derive needs
its [`Bindable`] impl:

```compile_fail
#[derive(flagtag::Fields)]
struct Config {
    #[tags(flag = "name=port,default=80")]
    port: u32,
}
```

A type can opt out instead, with a [`Bindable`] impl that returns
[`BoundField::Unsupported`]. Its fields are then left alone and reported as
[`SkipReason::Unsupported`].
*/

extern crate self as flagtag;

mod arguments;
mod bind;
mod error;
mod field;
mod flag_set;
mod impls;
mod printers;
mod source;
mod tag;
mod value;

pub use arguments::LoadedArguments;
pub use bind::{BindOptions, Bound, DEFAULT_MAP_DELIMITER, DEFAULT_SLICE_DELIMITER, bind};
pub use error::{BoxError, Error};
pub use field::{Accessor, Bindable, BoundField, Collection, Field, Fields, Nested, flatten};
pub use flag_set::{ErrorHandling, Flag, FlagSet, UsageFn};
pub use impls::{Scalar, ScalarKind};
pub use printers::{write_defaults, write_usage};
pub use source::{
    DEFAULT_ENV_TAG, DEFAULT_STRUCT_TAG, FieldReport, FieldState, FlagSource, Hook, Hooks,
    Predicate, SkipReason, Source, Stage, Watcher,
};
pub use tag::FlagSpec;
pub use value::{Codec, CodecValue, DelimitedValue, DurationCodec, Text, TimeCodec, TimeLayout, Value};

pub use flagtag_derive::Fields;
