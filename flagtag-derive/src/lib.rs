/*!
Derive macro for `flagtag`. See the [`flagtag`](https://docs.rs/flagtag)
crate for documentation; this crate is an implementation detail.
*/

mod fields;

use proc_macro::TokenStream;

/// Enumerate the tagged fields of a struct so they can be bound to flags.
///
/// Fields are tagged with `#[tags(flag = "...", env = "...")]`; other keys
/// are given as `tag(key = "...", value = "...")`. A `#[tags(flatten)]` field
/// holds another `Fields` struct, possibly behind `Option` or `Box`, whose
/// fields are enumerated in its place. Fields without tags are left out.
///
/// The type of every tagged field must implement `flagtag::Bindable`, or the
/// derive doesn't compile. Kinds like `u32` or `f32` aren't bindable; to keep
/// such a field tagged anyway, wrap it in a type whose `Bindable` impl
/// returns `BoundField::Unsupported`, which leaves it alone at bind time.
#[proc_macro_derive(Fields, attributes(tags))]
pub fn derive_fields(item: TokenStream) -> TokenStream {
    match fields::derive_fields_result(item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
