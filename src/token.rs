use crate::error::CoerceError;
use crate::mapper::BoxedValue;
use ahash::AHashMap;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Shorthand for the type-erased value all container operations work over.
pub(crate) type AnyRef = dyn Any + Send + Sync;

/// Runtime descriptor for a source value class.
///
/// Carries the erased identity used for dispatch plus the ancestor walk,
/// declared most-derived-first. The walk is what the mapper store traverses
/// when no mapper is registered for the concrete class itself.
///
/// Node classes shipped by this crate build theirs once behind a `OnceLock`
/// (see `IntNode::source_type()`); custom source models do the same.
#[derive(Debug)]
pub struct SourceType {
    id: TypeId,
    name: &'static str,
    ancestors: Vec<&'static SourceType>,
}

impl SourceType {
    /// Creates a descriptor for `T` with the given ancestor walk.
    pub fn new<T: Any>(name: &'static str, ancestors: Vec<&'static SourceType>) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            ancestors,
        }
    }

    /// The erased identity of the described class.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The display name of the described class.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The ancestor walk, most-derived-first.
    pub fn ancestors(&self) -> &[&'static SourceType] {
        &self.ancestors
    }
}

/// Marker for "any host value": the root every registered target type is
/// assignable to. Registration target of the shared null/missing mapper.
pub struct AnyValue;

/// Marker for text-like host targets. `String` is registered assignable to
/// it, so a request for `AnyText` is satisfied by the string mappers.
pub struct AnyText;

/// Marker for numeric host targets; the primitive numeric types are
/// registered assignable to it.
pub struct AnyNumber;

type NewFn = Arc<dyn Fn() -> BoxedValue + Send + Sync>;
type LenFn = Arc<dyn Fn(&AnyRef) -> usize + Send + Sync>;
type DrainFn = Arc<dyn Fn(&mut AnyRef) -> Vec<Option<BoxedValue>> + Send + Sync>;
type PushFn = Arc<dyn Fn(&mut AnyRef, Option<BoxedValue>) -> Result<(), CoerceError> + Send + Sync>;
type CollectFn = Arc<dyn Fn(Vec<Option<BoxedValue>>) -> Result<BoxedValue, CoerceError> + Send + Sync>;
type TakeEntryFn = Arc<dyn Fn(&mut AnyRef, &AnyRef) -> Option<BoxedValue> + Send + Sync>;
type InsertFn =
    Arc<dyn Fn(&mut AnyRef, BoxedValue, Option<BoxedValue>) -> Result<(), CoerceError> + Send + Sync>;
type CloneKeyFn = Arc<dyn Fn(&AnyRef) -> Option<BoxedValue> + Send + Sync>;
type RetainKeysFn = Arc<dyn Fn(&mut AnyRef, &[BoxedValue]) + Send + Sync>;
type EnumLookupFn = Arc<dyn Fn(&str) -> Option<BoxedValue> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct ArrayShape {
    pub(crate) elem: Box<TypeToken>,
    pub(crate) len: LenFn,
    pub(crate) drain: DrainFn,
    pub(crate) collect: CollectFn,
}

#[derive(Clone)]
pub(crate) struct ListShape {
    pub(crate) elem: Option<Box<TypeToken>>,
    pub(crate) new_list: NewFn,
    pub(crate) drain: DrainFn,
    pub(crate) push: PushFn,
}

#[derive(Clone)]
pub(crate) struct MapShape {
    pub(crate) key: Option<Box<TypeToken>>,
    pub(crate) value: Option<Box<TypeToken>>,
    pub(crate) string_keys: bool,
    pub(crate) new_map: NewFn,
    pub(crate) take_entry: TakeEntryFn,
    pub(crate) insert: InsertFn,
    pub(crate) clone_key: CloneKeyFn,
    pub(crate) retain_keys: RetainKeysFn,
}

#[derive(Clone)]
pub(crate) struct EnumShape {
    pub(crate) lookup: EnumLookupFn,
}

/// Structural classification of a target type, driving mapper synthesis.
#[derive(Clone)]
pub(crate) enum Shape {
    Scalar,
    Array(ArrayShape),
    List(ListShape),
    Map(MapShape),
    Enum(EnumShape),
}

/// Descriptor for a conversion target type.
///
/// A token carries the erased identity of the target (a plain [`TypeId`];
/// monomorphization already makes `Vec<i32>` and `Vec<String>` distinct),
/// a display name for diagnostics, any declared host supertypes, and the
/// structural shape used when a mapper has to be synthesized. Container
/// tokens capture a small vtable over the concrete container type at
/// construction, which is what stands in for reflection here.
///
/// # Examples
///
/// ```
/// use sovran_coerce::TypeToken;
///
/// let scalar = TypeToken::of::<i32>();
/// let list = TypeToken::vec_of::<i32>(TypeToken::of::<i32>());
/// assert_ne!(scalar.id(), list.id());
/// ```
#[derive(Clone)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
    supers: Vec<TypeId>,
    shape: Shape,
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeToken").field("name", &self.name).finish()
    }
}

impl TypeToken {
    /// Descriptor for a plain (non-container, non-enum) target type.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            supers: Vec::new(),
            shape: Shape::Scalar,
        }
    }

    /// Declares the described type assignable to the marker type `S`.
    ///
    /// The relation is recorded when the token passes through registration
    /// and is what lets a mapper registered for a narrower target satisfy a
    /// request for the marker (e.g. `String` satisfying [`AnyText`]).
    pub fn assignable_to<S: Any>(mut self) -> Self {
        self.supers.push(TypeId::of::<S>());
        self
    }

    /// Descriptor for a growable `Vec<T>` target with a typed element.
    ///
    /// Absent elements (null/missing sources) become `T::default()`.
    pub fn vec_of<T>(elem: TypeToken) -> Self
    where
        T: Any + Send + Sync + Default,
    {
        let shape = ListShape {
            elem: Some(Box::new(elem)),
            new_list: Arc::new(|| Box::new(Vec::<T>::new())),
            drain: Arc::new(|list| match list.downcast_mut::<Vec<T>>() {
                Some(v) => std::mem::take(v)
                    .into_iter()
                    .map(|e| Some(Box::new(e) as BoxedValue))
                    .collect(),
                None => Vec::new(),
            }),
            push: Arc::new(|list, elem| {
                let v = list
                    .downcast_mut::<Vec<T>>()
                    .ok_or(CoerceError::TypeMismatch)?;
                let value = match elem {
                    Some(boxed) => *boxed
                        .downcast::<T>()
                        .map_err(|_| CoerceError::TypeMismatch)?,
                    None => T::default(),
                };
                v.push(value);
                Ok(())
            }),
        };
        Self {
            id: TypeId::of::<Vec<T>>(),
            name: type_name::<Vec<T>>(),
            supers: Vec::new(),
            shape: Shape::List(shape),
        }
    }

    /// Descriptor for the untyped list target, `Vec<Option<BoxedValue>>`.
    ///
    /// With no element token, each element's target type is resolved through
    /// default-type resolution, and absent elements stay `None`. This is the
    /// default target for array-like sources.
    pub fn any_vec() -> Self {
        type AnyList = Vec<Option<BoxedValue>>;
        let shape = ListShape {
            elem: None,
            new_list: Arc::new(|| Box::new(AnyList::new())),
            drain: Arc::new(|list| {
                list.downcast_mut::<AnyList>()
                    .map(std::mem::take)
                    .unwrap_or_default()
            }),
            push: Arc::new(|list, elem| {
                let v = list
                    .downcast_mut::<AnyList>()
                    .ok_or(CoerceError::TypeMismatch)?;
                v.push(elem);
                Ok(())
            }),
        };
        Self {
            id: TypeId::of::<AnyList>(),
            name: "Vec<Option<BoxedValue>>",
            supers: Vec::new(),
            shape: Shape::List(shape),
        }
    }

    /// Descriptor for a fixed-length `Box<[T]>` target.
    ///
    /// Element values from an existing slice are reused as mutation targets
    /// only when its length matches the source; the result slice is always
    /// collected fresh. Absent elements become `T::default()`.
    pub fn boxed_slice_of<T>(elem: TypeToken) -> Self
    where
        T: Any + Send + Sync + Default,
    {
        let shape = ArrayShape {
            elem: Box::new(elem),
            len: Arc::new(|arr| arr.downcast_ref::<Box<[T]>>().map_or(0, |a| a.len())),
            drain: Arc::new(|arr| match arr.downcast_mut::<Box<[T]>>() {
                Some(a) => std::mem::take(a)
                    .into_vec()
                    .into_iter()
                    .map(|e| Some(Box::new(e) as BoxedValue))
                    .collect(),
                None => Vec::new(),
            }),
            collect: Arc::new(|elems| {
                let mut out = Vec::with_capacity(elems.len());
                for elem in elems {
                    out.push(match elem {
                        Some(boxed) => *boxed
                            .downcast::<T>()
                            .map_err(|_| CoerceError::TypeMismatch)?,
                        None => T::default(),
                    });
                }
                Ok(Box::new(out.into_boxed_slice()) as BoxedValue)
            }),
        };
        Self {
            id: TypeId::of::<Box<[T]>>(),
            name: type_name::<Box<[T]>>(),
            supers: Vec::new(),
            shape: Shape::Array(shape),
        }
    }

    /// Descriptor for a `HashMap<K, V>` target with typed keys and values.
    ///
    /// String keys take the source field name directly; any other key type is
    /// produced by mapping the field name as a text value. Absent values
    /// become `V::default()`.
    pub fn map_of<K, V>(key: TypeToken, value: TypeToken) -> Self
    where
        K: Any + Send + Sync + Clone + Eq + Hash,
        V: Any + Send + Sync + Default,
    {
        let string_keys = TypeId::of::<K>() == TypeId::of::<String>();
        let shape = MapShape {
            key: Some(Box::new(key)),
            value: Some(Box::new(value)),
            string_keys,
            new_map: Arc::new(|| Box::new(HashMap::<K, V>::new())),
            take_entry: Arc::new(|map, key| {
                let m = map.downcast_mut::<HashMap<K, V>>()?;
                let k = key.downcast_ref::<K>()?;
                m.remove(k).map(|v| Box::new(v) as BoxedValue)
            }),
            insert: Arc::new(|map, key, value| {
                let m = map
                    .downcast_mut::<HashMap<K, V>>()
                    .ok_or(CoerceError::TypeMismatch)?;
                let k = *key.downcast::<K>().map_err(|_| CoerceError::TypeMismatch)?;
                let v = match value {
                    Some(boxed) => *boxed
                        .downcast::<V>()
                        .map_err(|_| CoerceError::TypeMismatch)?,
                    None => V::default(),
                };
                m.insert(k, v);
                Ok(())
            }),
            clone_key: Arc::new(|key| {
                key.downcast_ref::<K>()
                    .map(|k| Box::new(k.clone()) as BoxedValue)
            }),
            retain_keys: Arc::new(|map, keys| {
                if let Some(m) = map.downcast_mut::<HashMap<K, V>>() {
                    let keep: Vec<&K> = keys.iter().filter_map(|b| b.downcast_ref::<K>()).collect();
                    m.retain(|k, _| keep.iter().any(|kept| *kept == k));
                }
            }),
        };
        Self {
            id: TypeId::of::<HashMap<K, V>>(),
            name: type_name::<HashMap<K, V>>(),
            supers: Vec::new(),
            shape: Shape::Map(shape),
        }
    }

    /// Descriptor for the untyped map target,
    /// `HashMap<String, Option<BoxedValue>>`.
    ///
    /// Field values resolve their target types through default-type
    /// resolution; absent values stay `None` under their key. This is the
    /// default target for object-like sources.
    pub fn any_map() -> Self {
        type AnyMap = HashMap<String, Option<BoxedValue>>;
        let shape = MapShape {
            key: None,
            value: None,
            string_keys: true,
            new_map: Arc::new(|| Box::new(AnyMap::new())),
            take_entry: Arc::new(|map, key| {
                let m = map.downcast_mut::<AnyMap>()?;
                let k = key.downcast_ref::<String>()?;
                m.remove(k).flatten()
            }),
            insert: Arc::new(|map, key, value| {
                let m = map
                    .downcast_mut::<AnyMap>()
                    .ok_or(CoerceError::TypeMismatch)?;
                let k = *key
                    .downcast::<String>()
                    .map_err(|_| CoerceError::TypeMismatch)?;
                m.insert(k, value);
                Ok(())
            }),
            clone_key: Arc::new(|key| {
                key.downcast_ref::<String>()
                    .map(|k| Box::new(k.clone()) as BoxedValue)
            }),
            retain_keys: Arc::new(|map, keys| {
                if let Some(m) = map.downcast_mut::<AnyMap>() {
                    let keep: Vec<&String> =
                        keys.iter().filter_map(|b| b.downcast_ref::<String>()).collect();
                    m.retain(|k, _| keep.iter().any(|kept| *kept == k));
                }
            }),
        };
        Self {
            id: TypeId::of::<AnyMap>(),
            name: "HashMap<String, Option<BoxedValue>>",
            supers: Vec::new(),
            shape: Shape::Map(shape),
        }
    }

    /// Descriptor for an enum target.
    ///
    /// The constant table is captured up front; mapping a text value not in
    /// the table fails with
    /// [`CoerceError::UnknownEnumValue`](crate::CoerceError::UnknownEnumValue),
    /// never a silent default.
    ///
    /// # Examples
    ///
    /// ```
    /// use sovran_coerce::TypeToken;
    ///
    /// #[derive(Debug, Clone, PartialEq)]
    /// enum Color { Red, Green, Blue }
    ///
    /// let token = TypeToken::enum_of::<Color>(&[
    ///     ("RED", Color::Red),
    ///     ("GREEN", Color::Green),
    ///     ("BLUE", Color::Blue),
    /// ]);
    /// ```
    pub fn enum_of<E>(constants: &[(&'static str, E)]) -> Self
    where
        E: Any + Send + Sync + Clone,
    {
        let table: AHashMap<&'static str, E> = constants
            .iter()
            .map(|(name, value)| (*name, value.clone()))
            .collect();
        let lookup: EnumLookupFn =
            Arc::new(move |name| table.get(name).map(|v| Box::new(v.clone()) as BoxedValue));
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
            supers: Vec::new(),
            shape: Shape::Enum(EnumShape { lookup }),
        }
    }

    /// The erased identity of the target type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The display name of the target type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn supers(&self) -> &[TypeId] {
        &self.supers
    }

    pub(crate) fn shape(&self) -> &Shape {
        &self.shape
    }
}
