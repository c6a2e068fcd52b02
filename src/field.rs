/*!
Typed access to the fields of a caller-owned structure.

A [`Field`] describes one tagged field: its path, its tags, and a
[`BoundField`] that knows the field's kind and how to reach it through an
[`Accessor`]. The binder never owns the structure; every read and write goes
through the accessor, which yields `None` when the field sits behind an
`Option` that is currently empty.

Usually these are produced by `#[derive(Fields)]` rather than by hand.
*/

use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
    marker::PhantomData,
    rc::Rc,
    time::Duration,
};

use chrono::{DateTime, FixedOffset};
use joinery::JoinableIterator as _;

use crate::{
    error::Error,
    impls::{Scalar, ScalarKind},
};

type Getter<S, T> = Rc<dyn Fn(&S) -> Option<&T>>;
type Setter<S, T> = Rc<dyn Fn(&mut S) -> Option<&mut T>>;

/// A shared and a mutable projection from `S` to one of its parts, `T`.
pub struct Accessor<S, T> {
    get: Getter<S, T>,
    get_mut: Setter<S, T>,
}

impl<S, T> Clone for Accessor<S, T> {
    fn clone(&self) -> Self {
        Self {
            get: Rc::clone(&self.get),
            get_mut: Rc::clone(&self.get_mut),
        }
    }
}

impl<S: 'static, T: 'static> Accessor<S, T> {
    pub fn new(
        get: impl Fn(&S) -> Option<&T> + 'static,
        get_mut: impl Fn(&mut S) -> Option<&mut T> + 'static,
    ) -> Self {
        Self {
            get: Rc::new(get),
            get_mut: Rc::new(get_mut),
        }
    }

    #[inline]
    pub fn get<'s>(&self, target: &'s S) -> Option<&'s T> {
        (self.get)(target)
    }

    #[inline]
    pub fn get_mut<'s>(&self, target: &'s mut S) -> Option<&'s mut T> {
        (self.get_mut)(target)
    }

    /// Compose with an accessor into `T`, producing one that reaches from
    /// `S` all the way to `U`.
    pub fn then<U: 'static>(&self, inner: Accessor<T, U>) -> Accessor<S, U> {
        let (outer_get, inner_get) = (Rc::clone(&self.get), inner.get);
        let (outer_mut, inner_mut) = (Rc::clone(&self.get_mut), inner.get_mut);

        Accessor::new(
            move |target: &S| outer_get(target).and_then(|part| inner_get(part)),
            move |target: &mut S| outer_mut(target).and_then(|part| inner_mut(part)),
        )
    }
}

impl<T: 'static> Accessor<Option<T>, T> {
    /// Reach through an `Option`
    pub fn optional() -> Self {
        Accessor::new(|this: &Option<T>| this.as_ref(), |this: &mut Option<T>| this.as_mut())
    }
}

impl<T: 'static> Accessor<Box<T>, T> {
    /// Reach through a `Box`
    pub fn boxed() -> Self {
        Accessor::new(|this: &Box<T>| Some(&**this), |this: &mut Box<T>| Some(&mut **this))
    }
}

/// A sequence or map field, which is assigned from and rendered to a single
/// delimited string.
pub trait Collection<S> {
    /// Decode `text` completely, then replace the field's contents with the
    /// result. On error the field is left untouched.
    fn assign(&self, target: &mut S, text: &str, delimiter: &str) -> Result<(), Error>;

    fn render(&self, target: &S, delimiter: &str) -> Option<String>;

    fn is_present(&self, target: &S) -> bool;
}

struct SequenceCollection<S, E> {
    accessor: Accessor<S, Vec<E>>,
}

impl<S: 'static, E: Scalar> Collection<S> for SequenceCollection<S, E> {
    fn assign(&self, target: &mut S, text: &str, delimiter: &str) -> Result<(), Error> {
        let values = match text {
            "" => Vec::new(),
            text => text
                .split(delimiter)
                .map(E::from_text)
                .collect::<Result<Vec<E>, Error>>()?,
        };

        *self.accessor.get_mut(target).ok_or(Error::InvalidValue)? = values;
        Ok(())
    }

    fn render(&self, target: &S, delimiter: &str) -> Option<String> {
        self.accessor
            .get(target)
            .map(|values| values.iter().map(E::to_text).join_with(delimiter).to_string())
    }

    fn is_present(&self, target: &S) -> bool {
        self.accessor.get(target).is_some()
    }
}

struct MapCollection<S, M, K, V> {
    accessor: Accessor<S, M>,
    entries: PhantomData<fn() -> (K, V)>,
}

impl<S, M, K, V> Collection<S> for MapCollection<S, M, K, V>
where
    S: 'static,
    M: Default + Extend<(K, V)> + 'static,
    for<'m> &'m M: IntoIterator<Item = (&'m K, &'m V)>,
    K: Scalar,
    V: Scalar,
{
    fn assign(&self, target: &mut S, text: &str, delimiter: &str) -> Result<(), Error> {
        let mut entries = M::default();

        for entry in text.split(delimiter) {
            if entry.is_empty() {
                continue;
            }

            let mut parts = entry.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => {
                    entries.extend([(K::from_text(key)?, V::from_text(value)?)])
                }
                _ => return Err(Error::InvalidValue),
            }
        }

        *self.accessor.get_mut(target).ok_or(Error::InvalidValue)? = entries;
        Ok(())
    }

    fn render(&self, target: &S, delimiter: &str) -> Option<String> {
        let map = self.accessor.get(target)?;
        let mut entries: Vec<String> = map
            .into_iter()
            .map(|(key, value)| format!("{}={}", key.to_text(), value.to_text()))
            .collect();

        entries.sort_unstable();
        Some(entries.iter().join_with(delimiter).to_string())
    }

    fn is_present(&self, target: &S) -> bool {
        self.accessor.get(target).is_some()
    }
}

/// A collection living inside a nested structure
struct ProjectedCollection<O, S> {
    outer: Accessor<O, S>,
    inner: Rc<dyn Collection<S>>,
}

impl<O: 'static, S: 'static> Collection<O> for ProjectedCollection<O, S> {
    fn assign(&self, target: &mut O, text: &str, delimiter: &str) -> Result<(), Error> {
        let target = self.outer.get_mut(target).ok_or(Error::InvalidValue)?;
        self.inner.assign(target, text, delimiter)
    }

    fn render(&self, target: &O, delimiter: &str) -> Option<String> {
        self.inner.render(self.outer.get(target)?, delimiter)
    }

    fn is_present(&self, target: &O) -> bool {
        self.outer
            .get(target)
            .is_some_and(|target| self.inner.is_present(target))
    }
}

/// The kind of a field, together with an accessor that reaches it.
pub enum BoundField<S> {
    String(Accessor<S, String>),
    Bool(Accessor<S, bool>),
    Int(Accessor<S, isize>),
    Int64(Accessor<S, i64>),
    Uint(Accessor<S, usize>),
    Uint64(Accessor<S, u64>),
    Float64(Accessor<S, f64>),
    Duration(Accessor<S, Duration>),
    Timestamp(Accessor<S, DateTime<FixedOffset>>),
    Sequence {
        element: ScalarKind,
        collection: Rc<dyn Collection<S>>,
    },
    Map {
        key: ScalarKind,
        value: ScalarKind,
        collection: Rc<dyn Collection<S>>,
    },
    /// A field of a kind that can't be bound. It's left alone.
    Unsupported,
}

impl<S> Clone for BoundField<S> {
    fn clone(&self) -> Self {
        match self {
            BoundField::String(accessor) => BoundField::String(accessor.clone()),
            BoundField::Bool(accessor) => BoundField::Bool(accessor.clone()),
            BoundField::Int(accessor) => BoundField::Int(accessor.clone()),
            BoundField::Int64(accessor) => BoundField::Int64(accessor.clone()),
            BoundField::Uint(accessor) => BoundField::Uint(accessor.clone()),
            BoundField::Uint64(accessor) => BoundField::Uint64(accessor.clone()),
            BoundField::Float64(accessor) => BoundField::Float64(accessor.clone()),
            BoundField::Duration(accessor) => BoundField::Duration(accessor.clone()),
            BoundField::Timestamp(accessor) => BoundField::Timestamp(accessor.clone()),
            BoundField::Sequence {
                element,
                collection,
            } => BoundField::Sequence {
                element: *element,
                collection: Rc::clone(collection),
            },
            BoundField::Map {
                key,
                value,
                collection,
            } => BoundField::Map {
                key: *key,
                value: *value,
                collection: Rc::clone(collection),
            },
            BoundField::Unsupported => BoundField::Unsupported,
        }
    }
}

impl<S: 'static> BoundField<S> {
    /// False if the field is behind an empty `Option`
    pub fn is_present(&self, target: &S) -> bool {
        match self {
            BoundField::String(accessor) => accessor.get(target).is_some(),
            BoundField::Bool(accessor) => accessor.get(target).is_some(),
            BoundField::Int(accessor) => accessor.get(target).is_some(),
            BoundField::Int64(accessor) => accessor.get(target).is_some(),
            BoundField::Uint(accessor) => accessor.get(target).is_some(),
            BoundField::Uint64(accessor) => accessor.get(target).is_some(),
            BoundField::Float64(accessor) => accessor.get(target).is_some(),
            BoundField::Duration(accessor) => accessor.get(target).is_some(),
            BoundField::Timestamp(accessor) => accessor.get(target).is_some(),
            BoundField::Sequence { collection, .. } | BoundField::Map { collection, .. } => {
                collection.is_present(target)
            }
            BoundField::Unsupported => true,
        }
    }

    /// Re-root this binding so it's reached from an outer structure `O`.
    pub fn project<O: 'static>(self, outer: &Accessor<O, S>) -> BoundField<O> {
        let project = |collection| -> Rc<dyn Collection<O>> {
            Rc::new(ProjectedCollection {
                outer: outer.clone(),
                inner: collection,
            })
        };

        match self {
            BoundField::String(accessor) => BoundField::String(outer.then(accessor)),
            BoundField::Bool(accessor) => BoundField::Bool(outer.then(accessor)),
            BoundField::Int(accessor) => BoundField::Int(outer.then(accessor)),
            BoundField::Int64(accessor) => BoundField::Int64(outer.then(accessor)),
            BoundField::Uint(accessor) => BoundField::Uint(outer.then(accessor)),
            BoundField::Uint64(accessor) => BoundField::Uint64(outer.then(accessor)),
            BoundField::Float64(accessor) => BoundField::Float64(outer.then(accessor)),
            BoundField::Duration(accessor) => BoundField::Duration(outer.then(accessor)),
            BoundField::Timestamp(accessor) => BoundField::Timestamp(outer.then(accessor)),
            BoundField::Sequence {
                element,
                collection,
            } => BoundField::Sequence {
                element,
                collection: project(collection),
            },
            BoundField::Map {
                key,
                value,
                collection,
            } => BoundField::Map {
                key,
                value,
                collection: project(collection),
            },
            BoundField::Unsupported => BoundField::Unsupported,
        }
    }
}

/// A type that can be the target of a flag.
pub trait Bindable: Sized + 'static {
    fn bound_field<S: 'static>(accessor: Accessor<S, Self>) -> BoundField<S>;
}

macro_rules! bindable {
    ($($type:ty => $variant:ident,)*) => {
        $(
            impl Bindable for $type {
                #[inline]
                fn bound_field<S: 'static>(accessor: Accessor<S, Self>) -> BoundField<S> {
                    BoundField::$variant(accessor)
                }
            }
        )*
    };
}

bindable! {
    String => String,
    bool => Bool,
    isize => Int,
    i64 => Int64,
    usize => Uint,
    u64 => Uint64,
    f64 => Float64,
    Duration => Duration,
    DateTime<FixedOffset> => Timestamp,
}

impl<E: Scalar> Bindable for Vec<E> {
    fn bound_field<S: 'static>(accessor: Accessor<S, Self>) -> BoundField<S> {
        BoundField::Sequence {
            element: E::KIND,
            collection: Rc::new(SequenceCollection { accessor }),
        }
    }
}

impl<K: Scalar + Hash + Eq, V: Scalar> Bindable for HashMap<K, V> {
    fn bound_field<S: 'static>(accessor: Accessor<S, Self>) -> BoundField<S> {
        BoundField::Map {
            key: K::KIND,
            value: V::KIND,
            collection: Rc::new(MapCollection::<S, Self, K, V> {
                accessor,
                entries: PhantomData,
            }),
        }
    }
}

impl<K: Scalar + Ord, V: Scalar> Bindable for BTreeMap<K, V> {
    fn bound_field<S: 'static>(accessor: Accessor<S, Self>) -> BoundField<S> {
        BoundField::Map {
            key: K::KIND,
            value: V::KIND,
            collection: Rc::new(MapCollection::<S, Self, K, V> {
                accessor,
                entries: PhantomData,
            }),
        }
    }
}

/// A field behind an `Option` is bound when it's `Some`, and skipped when
/// it's `None`.
impl<T: Bindable> Bindable for Option<T> {
    fn bound_field<S: 'static>(accessor: Accessor<S, Self>) -> BoundField<S> {
        T::bound_field(accessor.then(Accessor::optional()))
    }
}

impl<T: Bindable> Bindable for Box<T> {
    fn bound_field<S: 'static>(accessor: Accessor<S, Self>) -> BoundField<S> {
        T::bound_field(accessor.then(Accessor::boxed()))
    }
}

/// One enumerated field of `S`
pub struct Field<S> {
    path: String,
    tags: &'static [(&'static str, &'static str)],
    binding: BoundField<S>,
}

impl<S: 'static> Field<S> {
    pub fn new(
        path: impl Into<String>,
        tags: &'static [(&'static str, &'static str)],
        binding: BoundField<S>,
    ) -> Self {
        Self {
            path: path.into(),
            tags,
            binding,
        }
    }

    /// Dotted path from the root structure, such as `nested.value`
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Look up a tag by key. If a key appears more than once, the first one
    /// wins.
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|&&(tag, _)| tag == key)
            .map(|&(_, value)| value)
    }

    #[inline]
    pub fn binding(&self) -> &BoundField<S> {
        &self.binding
    }

    #[inline]
    pub fn is_present(&self, target: &S) -> bool {
        self.binding.is_present(target)
    }

    /// Re-root this field under `prefix` in an outer structure `O`
    pub fn project<O: 'static>(self, prefix: &str, outer: &Accessor<O, S>) -> Field<O> {
        Field {
            path: format!("{prefix}.{}", self.path),
            tags: self.tags,
            binding: self.binding.project(outer),
        }
    }
}

/// A structure whose tagged fields can be enumerated.
pub trait Fields: Sized + 'static {
    fn fields() -> Vec<Field<Self>>;
}

/// A field that holds a [`Fields`] structure, possibly behind some number of
/// `Option`s and `Box`es. Flattening reaches through these to the structure.
pub trait Nested: Sized + 'static {
    type Target: Fields;

    fn accessor() -> Accessor<Self, Self::Target>;
}

impl<T: Nested> Nested for Option<T> {
    type Target = T::Target;

    fn accessor() -> Accessor<Self, Self::Target> {
        Accessor::optional().then(T::accessor())
    }
}

impl<T: Nested> Nested for Box<T> {
    type Target = T::Target;

    fn accessor() -> Accessor<Self, Self::Target> {
        Accessor::boxed().then(T::accessor())
    }
}

/// Enumerate the fields of a nested structure reached through `accessor`,
/// re-rooted under `name`.
pub fn flatten<S: 'static, N: Nested>(name: &str, accessor: Accessor<S, N>) -> Vec<Field<S>> {
    let outer = accessor.then(N::accessor());

    N::Target::fields()
        .into_iter()
        .map(|field| field.project(name, &outer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Inner {
        addr: Vec<String>,
        meta: BTreeMap<String, isize>,
    }

    #[derive(Default)]
    struct Outer {
        inner: Option<Box<Inner>>,
    }

    fn addr() -> Accessor<Inner, Vec<String>> {
        Accessor::new(|this: &Inner| Some(&this.addr), |this: &mut Inner| Some(&mut this.addr))
    }

    fn meta() -> Accessor<Inner, BTreeMap<String, isize>> {
        Accessor::new(|this: &Inner| Some(&this.meta), |this: &mut Inner| Some(&mut this.meta))
    }

    fn collection<S>(binding: BoundField<S>) -> Rc<dyn Collection<S>> {
        match binding {
            BoundField::Sequence { collection, .. } | BoundField::Map { collection, .. } => {
                collection
            }
            _ => panic!("not a collection"),
        }
    }

    #[test]
    fn sequence_assign_and_render() {
        let addr = collection(Vec::<String>::bound_field(addr()));
        let mut inner = Inner::default();

        addr.assign(&mut inner, "33,44", ",").unwrap();
        assert_eq!(inner.addr, ["33", "44"]);
        assert_eq!(addr.render(&inner, ";").unwrap(), "33;44");

        addr.assign(&mut inner, "", ",").unwrap();
        assert!(inner.addr.is_empty());
    }

    #[test]
    fn sequence_failure_leaves_field_untouched() {
        let mut numbers = vec![1_i64];
        let accessor = Accessor::new(|this: &Vec<i64>| Some(this), |this: &mut Vec<i64>| Some(this));
        let numbers_field = collection(Vec::<i64>::bound_field(accessor));

        assert!(numbers_field.assign(&mut numbers, "2,x", ",").is_err());
        assert_eq!(numbers, [1]);
    }

    #[test]
    fn map_assign_replaces_contents() {
        let meta = collection(BTreeMap::<String, isize>::bound_field(meta()));
        let mut inner = Inner::default();

        meta.assign(&mut inner, "key=20", ",").unwrap();
        meta.assign(&mut inner, "a=1,b=2", ",").unwrap();
        assert_eq!(inner.meta.len(), 2);
        assert_eq!(inner.meta["b"], 2);
        assert_eq!(meta.render(&inner, ",").unwrap(), "a=1,b=2");
    }

    #[test]
    fn map_entries() {
        let meta = collection(BTreeMap::<String, isize>::bound_field(meta()));
        let mut inner = Inner::default();

        meta.assign(&mut inner, "", ",").unwrap();
        assert!(inner.meta.is_empty());

        assert!(matches!(
            meta.assign(&mut inner, "keyonly", ","),
            Err(Error::InvalidValue)
        ));
        assert!(matches!(
            meta.assign(&mut inner, "a=1=2", ","),
            Err(Error::InvalidValue)
        ));
        assert!(matches!(
            meta.assign(&mut inner, "a=x", ","),
            Err(Error::ParseInt(_))
        ));
    }

    #[test]
    fn projection_through_option_and_box() {
        let outer_accessor = Accessor::new(
            |this: &Outer| Some(&this.inner),
            |this: &mut Outer| Some(&mut this.inner),
        )
        .then(Accessor::optional())
        .then(Accessor::boxed());

        let addr = Vec::<String>::bound_field(addr()).project(&outer_accessor);
        let mut outer = Outer::default();
        assert!(!addr.is_present(&outer));

        outer.inner = Some(Box::default());
        assert!(addr.is_present(&outer));

        collection(addr).assign(&mut outer, "x", ",").unwrap();
        assert_eq!(outer.inner.unwrap().addr, ["x"]);
    }

    #[test]
    fn optional_scalar() {
        struct Target {
            port: Option<u64>,
        }

        let binding = Option::<u64>::bound_field(Accessor::new(
            |this: &Target| Some(&this.port),
            |this: &mut Target| Some(&mut this.port),
        ));

        let BoundField::Uint64(accessor) = binding else {
            panic!("expected a u64 binding");
        };

        let mut target = Target { port: None };
        assert!(accessor.get(&target).is_none());

        target.port = Some(1);
        *accessor.get_mut(&mut target).unwrap() = 2;
        assert_eq!(target.port, Some(2));
    }

    #[test]
    fn tag_lookup_first_wins() {
        let field: Field<Inner> = Field::new(
            "addr",
            &[("flag", "name=a"), ("env", "ADDR"), ("flag", "name=b")],
            BoundField::Unsupported,
        );

        assert_eq!(field.tag("flag"), Some("name=a"));
        assert_eq!(field.tag("env"), Some("ADDR"));
        assert_eq!(field.tag("yaml"), None);
    }
}
