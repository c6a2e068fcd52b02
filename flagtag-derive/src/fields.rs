use std::collections::{HashMap, hash_map::Entry};
use std::fmt::Display;
use std::hash::Hash;

use darling::{FromAttributes as _, FromMeta, util::SpannedValue};
use itertools::Itertools as _;
use lazy_format::lazy_format;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    DeriveInput, Field, Fields, Ident, Token, Type, ext::IdentExt as _, punctuated::Punctuated,
    spanned::Spanned as _,
};

fn detect_collision<T: Hash + Eq + Copy + Display>(
    known_keys: &mut HashMap<T, Span>,
    new_key: SpannedValue<T>,
) -> syn::Result<()> {
    match known_keys.entry(*new_key) {
        Entry::Occupied(entry) => {
            let mut err1 = syn::Error::new(
                new_key.span(),
                lazy_format!("duplicate tag key `{key}`", key = *new_key),
            );
            let err2 = syn::Error::new(*entry.get(), "original use here");

            err1.combine(err2);
            Err(err1)
        }
        Entry::Vacant(entry) => {
            entry.insert(new_key.span());
            Ok(())
        }
    }
}

#[derive(FromMeta, Debug)]
struct ExtraTag {
    key: SpannedValue<String>,
    value: String,
}

#[derive(darling::FromAttributes, Debug)]
#[darling(attributes(tags))]
struct RawTags {
    flag: Option<SpannedValue<String>>,
    env: Option<SpannedValue<String>>,
    #[darling(multiple)]
    tag: Vec<ExtraTag>,
    flatten: Option<()>,
}

enum FieldInfo<'a> {
    Tagged {
        ident: &'a Ident,
        ty: &'a Type,
        tags: Vec<(SpannedValue<String>, String)>,
    },
    Flatten {
        ident: &'a Ident,
        ty: &'a Type,
    },
}

impl<'a> FieldInfo<'a> {
    /// Returns `None` for fields with no tags at all
    fn from_field(field: &'a Field) -> syn::Result<Option<Self>> {
        let raw = RawTags::from_attributes(&field.attrs)?;
        let ty = &field.ty;
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new(field.span(), "only named fields can be tagged"))?;

        if let Some(()) = raw.flatten {
            if raw.flag.is_some() || raw.env.is_some() || !raw.tag.is_empty() {
                return Err(syn::Error::new(
                    field.span(),
                    "`flatten` can't be combined with other tags",
                ));
            }

            return Ok(Some(Self::Flatten { ident, ty }));
        }

        let tags = [("flag", raw.flag), ("env", raw.env)]
            .into_iter()
            .filter_map(|(key, value)| {
                value.map(|value| {
                    let span = value.span();
                    (SpannedValue::new(key.to_owned(), span), (*value).clone())
                })
            })
            .chain(raw.tag.into_iter().map(|tag| (tag.key, tag.value)))
            .collect_vec();

        if tags.is_empty() {
            return Ok(None);
        }

        let mut known_keys = HashMap::new();

        tags.iter().try_for_each(|(key, _)| {
            if key.is_empty() {
                Err(syn::Error::new(key.span(), "tag keys can't be empty"))
            } else {
                detect_collision(&mut known_keys, SpannedValue::new(key.as_str(), key.span()))
            }
        })?;

        Ok(Some(Self::Tagged { ident, ty, tags }))
    }

    fn enumerate(&self) -> TokenStream2 {
        match *self {
            FieldInfo::Tagged {
                ident,
                ty,
                ref tags,
            } => {
                let path = ident.unraw().to_string();
                let keys = tags.iter().map(|(key, _)| key.as_str());
                let values = tags.iter().map(|(_, value)| value.as_str());
                let accessor = field_accessor(ident);

                quote! {
                    fields.push(::flagtag::Field::new(
                        #path,
                        &[#((#keys, #values)),*],
                        <#ty as ::flagtag::Bindable>::bound_field(#accessor),
                    ));
                }
            }
            FieldInfo::Flatten { ident, ty } => {
                let path = ident.unraw().to_string();
                let accessor = field_accessor(ident);

                quote! {
                    fields.extend(::flagtag::flatten::<Self, #ty>(#path, #accessor));
                }
            }
        }
    }
}

fn field_accessor(ident: &Ident) -> TokenStream2 {
    quote! {
        ::flagtag::Accessor::new(
            |this: &Self| ::core::option::Option::Some(&this.#ident),
            |this: &mut Self| ::core::option::Option::Some(&mut this.#ident),
        )
    }
}

fn derive_fields_struct(
    ident: &Ident,
    fields: &Punctuated<Field, Token![,]>,
) -> syn::Result<TokenStream2> {
    let fields: Vec<FieldInfo> = fields
        .iter()
        .map(FieldInfo::from_field)
        .filter_map_ok(|info| info)
        .collect::<syn::Result<_>>()?;

    let enumerate = fields.iter().map(FieldInfo::enumerate);

    Ok(quote! {
        impl ::flagtag::Fields for #ident {
            fn fields() -> ::std::vec::Vec<::flagtag::Field<Self>> {
                let mut fields = ::std::vec::Vec::new();
                #(#enumerate)*
                fields
            }
        }

        impl ::flagtag::Nested for #ident {
            type Target = Self;

            fn accessor() -> ::flagtag::Accessor<Self, Self> {
                ::flagtag::Accessor::new(
                    |this: &Self| ::core::option::Option::Some(this),
                    |this: &mut Self| ::core::option::Option::Some(this),
                )
            }
        }
    })
}

pub fn derive_fields_result(item: TokenStream2) -> syn::Result<TokenStream2> {
    let input: DeriveInput = syn::parse2(item)?;

    if let Some(param) = input.generics.params.first() {
        return Err(syn::Error::new(
            param.span(),
            "generic types aren't supported by `derive(Fields)`",
        ));
    }

    match input.data {
        syn::Data::Struct(ref data) => match data.fields {
            Fields::Named(ref fields) => derive_fields_struct(&input.ident, &fields.named),
            Fields::Unnamed(_) => Err(syn::Error::new(
                input.span(),
                "can't derive `Fields` on a tuple struct",
            )),
            Fields::Unit => Err(syn::Error::new(
                input.span(),
                "can't derive `Fields` on a unit struct",
            )),
        },
        syn::Data::Enum(_) => Err(syn::Error::new(
            input.span(),
            "can't derive `Fields` on an enum",
        )),
        syn::Data::Union(_) => Err(syn::Error::new(
            input.span(),
            "can't derive `Fields` on a union",
        )),
    }
}
