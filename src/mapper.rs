use crate::coerce::Coercer;
use crate::error::CoerceError;
use crate::node::Node;
use std::any::Any;

/// A type-erased host value.
///
/// Every conversion result travels as one of these; callers downcast to the
/// concrete type they asked for (or use the typed accessors on
/// [`Coercer`](crate::Coercer), which do it for them).
pub type BoxedValue = Box<dyn Any + Send + Sync>;

/// A unit of conversion logic bound to one (source capability, target shape)
/// pair.
///
/// Mappers are created once per distinct source/target combination, registered
/// into the store, and shared across arbitrarily many concurrent conversions,
/// so implementations must not keep per-conversion state. Anything a single
/// call needs lives on its own stack; the engine is passed in explicitly for
/// recursion into nested values.
pub trait Mapper: Send + Sync {
    /// A fresh instance of the mapper's default-constructible target type,
    /// used as the mutation target when the caller supplies no existing
    /// instance. `None` means the mapper produces its own value.
    fn default_target(&self) -> Option<BoxedValue> {
        None
    }

    /// Transfers `from` into `target`, returning the finished value.
    ///
    /// `Ok(None)` is the absent result: the source had no value to give
    /// (null/missing nodes).
    fn map_into(
        &self,
        cx: &Coercer,
        from: &dyn Node,
        target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError>;
}

type MapFn =
    Box<dyn Fn(&Coercer, &dyn Node, Option<BoxedValue>) -> Result<Option<BoxedValue>, CoerceError> + Send + Sync>;
type DefaultFn = Box<dyn Fn() -> BoxedValue + Send + Sync>;

/// Closure-backed mapper, used for the seeded one-to-one conversions.
pub struct FnMapper {
    default_target: Option<DefaultFn>,
    map: MapFn,
}

impl FnMapper {
    /// Creates a mapper from a conversion closure with no default target type.
    pub fn new<F>(map: F) -> Self
    where
        F: Fn(&Coercer, &dyn Node, Option<BoxedValue>) -> Result<Option<BoxedValue>, CoerceError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            default_target: None,
            map: Box::new(map),
        }
    }

    /// Creates a mapper whose target type is default-constructible; `default`
    /// is invoked whenever a conversion starts without an existing instance.
    pub fn with_default<D, F>(default: D, map: F) -> Self
    where
        D: Fn() -> BoxedValue + Send + Sync + 'static,
        F: Fn(&Coercer, &dyn Node, Option<BoxedValue>) -> Result<Option<BoxedValue>, CoerceError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            default_target: Some(Box::new(default)),
            map: Box::new(map),
        }
    }
}

impl Mapper for FnMapper {
    fn default_target(&self) -> Option<BoxedValue> {
        self.default_target.as_ref().map(|f| f())
    }

    fn map_into(
        &self,
        cx: &Coercer,
        from: &dyn Node,
        target: Option<BoxedValue>,
    ) -> Result<Option<BoxedValue>, CoerceError> {
        (self.map)(cx, from, target)
    }
}
