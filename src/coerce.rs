// src/coerce.rs
use crate::error::CoerceError;
use crate::mapper::{BoxedValue, FnMapper, Mapper};
use crate::node::{
    AnyArrayNode, AnyNode, AnyObjectNode, BoolNode, DoubleNode, IntNode, LongNode, MissingNode,
    Node, NullNode, TextNode,
};
use crate::store::MapperStore;
use crate::token::{
    AnyNumber, AnyText, AnyValue, ArrayShape, EnumShape, ListShape, MapShape, Shape, SourceType,
    TypeToken,
};
use std::any::Any;
use std::sync::Arc;

fn unmappable(from: &dyn Node, target: &str) -> CoerceError {
    let mut value = String::new();
    from.write_text(&mut value);
    CoerceError::Unmappable {
        value,
        target: target.to_string(),
    }
}

fn downcast_opt<T: Any>(value: Option<BoxedValue>) -> Result<Option<T>, CoerceError> {
    match value {
        Some(boxed) => boxed
            .downcast::<T>()
            .map(|b| Some(*b))
            .map_err(|_| CoerceError::TypeMismatch),
        None => Ok(None),
    }
}

// Shared by every text-producing registration: the String target is also the
// in-place builder target, cleared and refilled rather than reallocated.
fn render_text(
    _cx: &Coercer,
    from: &dyn Node,
    target: Option<BoxedValue>,
) -> Result<Option<BoxedValue>, CoerceError> {
    let mut out = match target.and_then(|b| b.downcast::<String>().ok()) {
        Some(existing) => {
            let mut s = *existing;
            s.clear();
            s
        }
        None => String::new(),
    };
    from.write_text(&mut out);
    Ok(Some(Box::new(out)))
}

/// The node-to-host coercion engine.
///
/// Owns a [`MapperStore`] seeded with the one-to-one primitive mappings and
/// extends its lookup with structural synthesis: array, list, enum, identity
/// and map targets get their mappers built on demand, registered back into
/// the store, and reused for the life of the engine. The engine itself is
/// `Send + Sync` and is meant to be created once and shared. The store only
/// ever grows, which is acceptable because the type universe a process
/// observes is small and finite.
///
/// # Examples
///
/// ```
/// use sovran_coerce::{Coercer, IntNode, TypeToken};
///
/// let coercer = Coercer::new();
/// let value = coercer.coerce_as::<i32>(&IntNode(7), &TypeToken::of::<i32>())?;
/// assert_eq!(value, Some(7));
/// # Ok::<(), sovran_coerce::CoerceError>(())
/// ```
pub struct Coercer {
    store: MapperStore<dyn Mapper>,
    absent: Arc<dyn Mapper>,
    identity: Arc<dyn Mapper>,
}

impl Coercer {
    /// Creates an engine seeded with the primitive mapper matrix and the
    /// default target types for every node class.
    pub fn new() -> Self {
        let coercer = Self {
            store: MapperStore::new(),
            absent: Arc::new(AbsentMapper),
            identity: Arc::new(SelfMapper),
        };
        coercer.seed_default_types();
        coercer.seed_mappers();
        coercer
    }

    fn seed_default_types(&self) {
        let store = &self.store;
        store.add_default_type(
            IntNode::source_type(),
            TypeToken::of::<i32>().assignable_to::<AnyNumber>(),
        );
        store.add_default_type(
            LongNode::source_type(),
            TypeToken::of::<i64>().assignable_to::<AnyNumber>(),
        );
        store.add_default_type(
            DoubleNode::source_type(),
            TypeToken::of::<f64>().assignable_to::<AnyNumber>(),
        );
        store.add_default_type(
            TextNode::source_type(),
            TypeToken::of::<String>().assignable_to::<AnyText>(),
        );
        store.add_default_type(BoolNode::source_type(), TypeToken::of::<bool>());
        store.add_default_type(AnyObjectNode::source_type(), TypeToken::any_map());
        store.add_default_type(AnyArrayNode::source_type(), TypeToken::any_vec());
        // Untargeted null/missing conversions resolve to the host root and
        // land on the shared absent mapper instead of failing.
        store.add_default_type(NullNode::source_type(), TypeToken::of::<AnyValue>());
        store.add_default_type(MissingNode::source_type(), TypeToken::of::<AnyValue>());
    }

    fn add(&self, from: &SourceType, target: &TypeToken, mapper: FnMapper) {
        self.store.add_mapper(from, target, Arc::new(mapper));
    }

    fn seed_mappers(&self) {
        let any_value = TypeToken::of::<AnyValue>();
        self.store
            .add_mapper(NullNode::source_type(), &any_value, Arc::clone(&self.absent));
        self.store
            .add_mapper(MissingNode::source_type(), &any_value, Arc::clone(&self.absent));

        self.add(
            BoolNode::source_type(),
            &TypeToken::of::<bool>(),
            FnMapper::new(|_, from, _| Ok(from.as_bool().map(|b| Box::new(b) as BoxedValue))),
        );

        // Each numeric node maps to its natural width; narrower targets get
        // the native truncating cast.
        let int = IntNode::source_type();
        self.add(
            int,
            &TypeToken::of::<i32>().assignable_to::<AnyNumber>(),
            FnMapper::new(|_, from, _| {
                Ok(from.as_i64().map(|v| Box::new(v as i32) as BoxedValue))
            }),
        );
        self.add(
            int,
            &TypeToken::of::<i16>().assignable_to::<AnyNumber>(),
            FnMapper::new(|_, from, _| {
                Ok(from.as_i64().map(|v| Box::new(v as i16) as BoxedValue))
            }),
        );
        self.add(
            int,
            &TypeToken::of::<i8>().assignable_to::<AnyNumber>(),
            FnMapper::new(|_, from, _| Ok(from.as_i64().map(|v| Box::new(v as i8) as BoxedValue))),
        );

        self.add(
            LongNode::source_type(),
            &TypeToken::of::<i64>().assignable_to::<AnyNumber>(),
            FnMapper::new(|_, from, _| Ok(from.as_i64().map(|v| Box::new(v) as BoxedValue))),
        );

        let double = DoubleNode::source_type();
        self.add(
            double,
            &TypeToken::of::<f64>().assignable_to::<AnyNumber>(),
            FnMapper::new(|_, from, _| Ok(from.as_f64().map(|v| Box::new(v) as BoxedValue))),
        );
        self.add(
            double,
            &TypeToken::of::<f32>().assignable_to::<AnyNumber>(),
            FnMapper::new(|_, from, _| {
                Ok(from.as_f64().map(|v| Box::new(v as f32) as BoxedValue))
            }),
        );

        let text = TextNode::source_type();
        let string_token = TypeToken::of::<String>().assignable_to::<AnyText>();
        self.add(
            text,
            &string_token,
            FnMapper::with_default(|| Box::new(String::new()), render_text),
        );
        self.add(text, &TypeToken::of::<AnyText>(), FnMapper::new(render_text));
        // Char arrays must match the text length exactly, so they are
        // allocated fresh on every call.
        self.add(
            text,
            &TypeToken::of::<Box<[char]>>(),
            FnMapper::new(|_, from, _| {
                Ok(from
                    .as_text()
                    .map(|t| Box::new(t.chars().collect::<Box<[char]>>()) as BoxedValue))
            }),
        );

        // Any node renders to text.
        let any = AnyNode::source_type();
        self.add(
            any,
            &string_token,
            FnMapper::with_default(|| Box::new(String::new()), render_text),
        );
        self.add(any, &TypeToken::of::<AnyText>(), FnMapper::new(render_text));
    }

    // The synthesis pipeline, run once per hierarchy candidate: absent
    // sources first (so null propagation can never misfire into a container
    // mapper), then the structural target shapes, then identity, then the
    // store's base lookup. Everything synthesized is registered immediately
    // under the candidate pair; the outer lookup additionally memoizes under
    // the original concrete pair.
    fn synthesize(
        &self,
        candidate: &SourceType,
        origin: &SourceType,
        target: &TypeToken,
    ) -> Option<Arc<dyn Mapper>> {
        if candidate.id() == NullNode::source_type().id()
            || candidate.id() == MissingNode::source_type().id()
        {
            let mapper = Arc::clone(&self.absent);
            self.store.add_mapper(candidate, target, Arc::clone(&mapper));
            return Some(mapper);
        }

        let synthesized: Option<Arc<dyn Mapper>> = match target.shape() {
            Shape::Array(shape) => Some(Arc::new(ArrayMapper {
                shape: shape.clone(),
                target_name: target.name(),
            })),
            Shape::List(shape) => Some(Arc::new(ListMapper {
                shape: shape.clone(),
                target_name: target.name(),
            })),
            Shape::Enum(shape) => Some(Arc::new(EnumMapper {
                shape: shape.clone(),
                enum_name: target.name(),
            })),
            _ if candidate.id() == target.id() => Some(Arc::clone(&self.identity)),
            Shape::Map(shape) => Some(Arc::new(MapMapper {
                shape: shape.clone(),
                target_name: target.name(),
            })),
            Shape::Scalar => None,
        };

        if let Some(mapper) = synthesized {
            self.store.add_mapper(candidate, target, Arc::clone(&mapper));
            return Some(mapper);
        }

        self.store.find_base(candidate, origin, target, &|c, o, t| {
            self.synthesize(c, o, t)
        })
    }

    /// Returns the mapper that converts values of class `from` into
    /// `target`, synthesizing and memoizing one if needed. `None` means the
    /// pair is unmappable.
    pub fn mapper_for(&self, from: &SourceType, target: &TypeToken) -> Option<Arc<dyn Mapper>> {
        self.store
            .mapper_for_with(from, target, &|candidate, origin, token| {
                self.synthesize(candidate, origin, token)
            })
    }

    /// The registered or inherited default target type for `from`.
    pub fn default_type_for(&self, from: &SourceType) -> Option<TypeToken> {
        self.store.default_type_for(from)
    }

    /// Registers a mapper for `(from, target)`, replacing any previous entry.
    pub fn register_mapper(&self, from: &SourceType, target: &TypeToken, mapper: Arc<dyn Mapper>) {
        self.store.add_mapper(from, target, mapper);
    }

    /// Registers the default target type for `from`.
    pub fn register_default_type(&self, from: &SourceType, target: TypeToken) {
        self.store.add_default_type(from, target);
    }

    // The universal conversion path: resolve the target type if unspecified,
    // look up or synthesize the mapper, instantiate the mapper's default
    // target when the caller supplied nothing, and delegate the transfer.
    fn convert(
        &self,
        from: &dyn Node,
        existing: Option<BoxedValue>,
        target: Option<&TypeToken>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        let source = from.runtime_type();
        let resolved;
        let token = match target {
            Some(token) => token,
            None => {
                resolved = self
                    .default_type_for(source)
                    .ok_or_else(|| unmappable(from, "<no default target type>"))?;
                &resolved
            }
        };
        let mapper = self
            .mapper_for(source, token)
            .ok_or_else(|| unmappable(from, token.name()))?;
        let target_value = match existing {
            Some(value) => Some(value),
            None => mapper.default_target(),
        };
        mapper.map_into(self, from, target_value)
    }

    /// Converts `from` into a freshly produced value of the target type.
    ///
    /// `Ok(None)` is the absent result (null/missing sources).
    ///
    /// # Errors
    ///
    /// [`CoerceError::Unmappable`] if no mapper exists for the pair even
    /// after hierarchy search and synthesis;
    /// [`CoerceError::UnknownEnumValue`] from enum targets.
    pub fn coerce(
        &self,
        from: &dyn Node,
        target: &TypeToken,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        self.convert(from, None, Some(target))
    }

    /// Converts `from` into the target type, reusing `existing` as the
    /// mutation target where the mapper supports it.
    ///
    /// The existing instance is owned by this call for its duration; the
    /// result is the (possibly reused, possibly replaced) finished value.
    ///
    /// # Errors
    ///
    /// As [`coerce`](Self::coerce).
    pub fn coerce_into(
        &self,
        from: &dyn Node,
        existing: BoxedValue,
        target: &TypeToken,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        self.convert(from, Some(existing), Some(target))
    }

    /// Converts `from` using its class's default target type.
    ///
    /// # Errors
    ///
    /// As [`coerce`](Self::coerce); additionally [`CoerceError::Unmappable`]
    /// when no default target type is registered anywhere in the source's
    /// hierarchy.
    pub fn coerce_default(&self, from: &dyn Node) -> Result<Option<BoxedValue>, CoerceError> {
        self.convert(from, None, None)
    }

    /// [`coerce`](Self::coerce), downcast to `T`.
    ///
    /// # Errors
    ///
    /// As [`coerce`](Self::coerce); [`CoerceError::TypeMismatch`] if the
    /// produced value is not a `T` (the token describes a different type).
    pub fn coerce_as<T: Any + Send + Sync>(
        &self,
        from: &dyn Node,
        target: &TypeToken,
    ) -> Result<Option<T>, CoerceError> {
        downcast_opt(self.convert(from, None, Some(target))?)
    }

    /// [`coerce_into`](Self::coerce_into), typed end to end.
    ///
    /// # Errors
    ///
    /// As [`coerce_as`](Self::coerce_as).
    pub fn coerce_into_as<T: Any + Send + Sync>(
        &self,
        from: &dyn Node,
        existing: T,
        target: &TypeToken,
    ) -> Result<Option<T>, CoerceError> {
        downcast_opt(self.convert(from, Some(Box::new(existing)), Some(target))?)
    }
}

impl Default for Coercer {
    fn default() -> Self {
        Self::new()
    }
}

// Null and missing sources produce the absent result for every target type.
// One shared instance is enough: the outcome never depends on the target.
struct AbsentMapper;

impl Mapper for AbsentMapper {
    fn map_into(
        &self,
        _cx: &Coercer,
        _from: &dyn Node,
        _target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        Ok(None)
    }
}

// The identity seam: the source already is a host value of the requested
// class, so hand back an owned copy of it.
struct SelfMapper;

impl Mapper for SelfMapper {
    fn map_into(
        &self,
        _cx: &Coercer,
        from: &dyn Node,
        _target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        Ok(Some(from.clone_value()))
    }
}

// Element-wise mapper into a fixed-length slice target. Prior element values
// are reused as mutation targets only when the existing length matches the
// source; the finished slice is collected fresh either way.
struct ArrayMapper {
    shape: ArrayShape,
    target_name: &'static str,
}

impl Mapper for ArrayMapper {
    fn map_into(
        &self,
        cx: &Coercer,
        from: &dyn Node,
        mut target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        let array = from
            .as_array()
            .ok_or_else(|| unmappable(from, self.target_name))?;
        let length = array.len();

        let mut prior = match target.as_mut() {
            Some(existing) if (self.shape.len)(&**existing) == length => {
                (self.shape.drain)(&mut **existing)
            }
            _ => Vec::new(),
        };

        let mut mapped = Vec::with_capacity(length);
        for (index, element) in array.iter().enumerate() {
            let previous = prior.get_mut(index).and_then(Option::take);
            mapped.push(cx.convert(element, previous, Some(&self.shape.elem))?);
        }
        Ok(Some((self.shape.collect)(mapped)?))
    }
}

// Element-wise mapper into a growable list target: drain the existing
// elements out (the buffer survives), then push one mapped element per
// source element, reusing the positional prior value as the mutation target.
// The list ends at exactly the source length.
struct ListMapper {
    shape: ListShape,
    target_name: &'static str,
}

impl Mapper for ListMapper {
    fn default_target(&self) -> Option<BoxedValue> {
        Some((self.shape.new_list)())
    }

    fn map_into(
        &self,
        cx: &Coercer,
        from: &dyn Node,
        target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        let array = from
            .as_array()
            .ok_or_else(|| unmappable(from, self.target_name))?;
        let mut target = target.unwrap_or_else(|| (self.shape.new_list)());

        let mut prior = (self.shape.drain)(&mut *target);
        for (index, element) in array.iter().enumerate() {
            let previous = prior.get_mut(index).and_then(Option::take);
            let mapped = cx.convert(element, previous, self.shape.elem.as_deref())?;
            (self.shape.push)(&mut *target, mapped)?;
        }
        Ok(Some(target))
    }
}

// Key/value mapper into a map target. Field names become keys directly when
// the key type is textual, otherwise each name is mapped as a text value to
// the declared key type. Values reuse the displaced prior entry as their
// mutation target. The per-call `seen` list drives the final retain pass:
// after mapping, the target's key set equals the source's field set exactly.
struct MapMapper {
    shape: MapShape,
    target_name: &'static str,
}

impl Mapper for MapMapper {
    fn default_target(&self) -> Option<BoxedValue> {
        Some((self.shape.new_map)())
    }

    fn map_into(
        &self,
        cx: &Coercer,
        from: &dyn Node,
        target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        let object = from
            .as_object()
            .ok_or_else(|| unmappable(from, self.target_name))?;
        let mut target = target.unwrap_or_else(|| (self.shape.new_map)());

        let mut seen: Vec<BoxedValue> = Vec::with_capacity(object.len());
        for (name, value) in object.fields() {
            let key: BoxedValue = if self.shape.string_keys {
                Box::new(name.to_string())
            } else {
                match self.shape.key.as_deref() {
                    Some(key_token) => {
                        let key_node = TextNode::from(name);
                        cx.convert(&key_node, None, Some(key_token))?
                            .ok_or_else(|| unmappable(&key_node, key_token.name()))?
                    }
                    None => Box::new(name.to_string()),
                }
            };

            let existing = (self.shape.take_entry)(&mut *target, &*key);
            let mapped = cx.convert(value, existing, self.shape.value.as_deref())?;
            if let Some(copy) = (self.shape.clone_key)(&*key) {
                seen.push(copy);
            }
            (self.shape.insert)(&mut *target, key, mapped)?;
        }
        (self.shape.retain_keys)(&mut *target, &seen);
        Ok(Some(target))
    }
}

// Text-to-constant mapper with the constant table precomputed at synthesis.
// An unknown name is a hard error naming both sides; it never defaults.
struct EnumMapper {
    shape: EnumShape,
    enum_name: &'static str,
}

impl Mapper for EnumMapper {
    fn map_into(
        &self,
        _cx: &Coercer,
        from: &dyn Node,
        _target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        let text = from
            .as_text()
            .ok_or_else(|| unmappable(from, self.enum_name))?;
        match (self.shape.lookup)(text) {
            Some(constant) => Ok(Some(constant)),
            None => Err(CoerceError::UnknownEnumValue {
                value: text.to_string(),
                enum_type: self.enum_name.to_string(),
            }),
        }
    }
}
