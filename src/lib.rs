//! # sovran-coerce
//!
//! Type-directed coercion from JSON-like node trees into host values, built
//! on a cached, hierarchy-aware mapper registry.
//!
//! Given a source node and a target type descriptor, the engine locates (or
//! lazily synthesizes) a mapper that transforms the node into an instance of
//! the target type, reusing a supplied instance where possible to avoid
//! allocation. Dispatch is joint over the runtime class of the source value
//! and the requested target type: when no exact mapping is registered, the
//! engine searches the source's type hierarchy, applies default-type
//! substitution, and synthesizes structural mappers (arrays, lists, maps,
//! enums, identity) on demand, caching every result for O(1) future lookup.
//!
//! ## Key Features
//!
//! - **Type-safe**: values travel as `Any` boxes checked at runtime; typed
//!   accessors downcast for you
//! - **Thread-safe**: the registry is a process-wide concurrent cache with
//!   idempotent writes; no lock is held across a conversion
//! - **In-place reuse**: containers and string builders supplied by the
//!   caller are resized and refilled rather than reallocated
//! - **Extensible**: register your own mappers and default target types next
//!   to the seeded primitive matrix
//! - **No macros**: pure runtime solution without complex macro magic
//!
//! ## Usage Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use sovran_coerce::{Coercer, CoerceError, IntNode, TextNode, TypeToken};
//!
//! fn main() -> Result<(), CoerceError> {
//!     let coercer = Coercer::new();
//!
//!     // Scalar conversions
//!     let n = coercer.coerce_as::<i32>(&IntNode(42), &TypeToken::of::<i32>())?;
//!     assert_eq!(n, Some(42));
//!
//!     let s = coercer.coerce_as::<String>(&TextNode::from("hello"), &TypeToken::of::<String>())?;
//!     assert_eq!(s, Some("hello".to_string()));
//!
//!     // Every node renders to text
//!     let rendered = coercer.coerce_as::<String>(&IntNode(42), &TypeToken::of::<String>())?;
//!     assert_eq!(rendered, Some("42".to_string()));
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Containers and In-Place Reuse
//!
//! ```rust
//! use sovran_coerce::{ArrayNode, Coercer, IntNode, TypeToken};
//!
//! fn main() -> Result<(), sovran_coerce::CoerceError> {
//!     let coercer = Coercer::new();
//!
//!     let mut arr = ArrayNode::new();
//!     arr.push(IntNode(1));
//!     arr.push(IntNode(2));
//!     arr.push(IntNode(3));
//!
//!     let token = TypeToken::vec_of::<i32>(TypeToken::of::<i32>());
//!     let values = coercer.coerce_as::<Vec<i32>>(&arr, &token)?.unwrap();
//!     assert_eq!(values, vec![1, 2, 3]);
//!
//!     // An existing vector is resized to the source length and refilled.
//!     let recycled = coercer
//!         .coerce_into_as::<Vec<i32>>(&arr, vec![9, 9, 9, 9, 9], &token)?
//!         .unwrap();
//!     assert_eq!(recycled, vec![1, 2, 3]);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Enum Targets
//!
//! ```rust
//! use sovran_coerce::{Coercer, CoerceError, TextNode, TypeToken};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Color {
//!     Red,
//!     Green,
//!     Blue,
//! }
//!
//! let coercer = Coercer::new();
//! let token = TypeToken::enum_of::<Color>(&[
//!     ("RED", Color::Red),
//!     ("GREEN", Color::Green),
//!     ("BLUE", Color::Blue),
//! ]);
//!
//! let green = coercer.coerce_as::<Color>(&TextNode::from("GREEN"), &token).unwrap();
//! assert_eq!(green, Some(Color::Green));
//!
//! // Unknown names are a hard error, never a silent default.
//! let err = coercer.coerce_as::<Color>(&TextNode::from("MAUVE"), &token).unwrap_err();
//! assert!(matches!(err, CoerceError::UnknownEnumValue { .. }));
//! ```
//!
//! ### Null Propagation
//!
//! ```rust
//! use sovran_coerce::{Coercer, NullNode, TypeToken};
//!
//! let coercer = Coercer::new();
//!
//! // Null maps to the absent result for any target type, never an error.
//! let absent = coercer.coerce_as::<i32>(&NullNode, &TypeToken::of::<i32>()).unwrap();
//! assert_eq!(absent, None);
//! ```

mod coerce;
mod error;
mod mapper;
mod node;
mod store;
mod token;

pub use coerce::Coercer;
pub use error::CoerceError;
pub use mapper::{BoxedValue, FnMapper, Mapper};
pub use node::{
    AnyArrayNode, AnyNode, AnyNumericNode, AnyObjectNode, ArrayNode, BoolNode, DoubleNode,
    IntNode, LongNode, MissingNode, Node, NullNode, ObjectNode, TextNode,
};
pub use store::{FindFn, MapperStore};
pub use token::{AnyNumber, AnyText, AnyValue, SourceType, TypeToken};

// Re-export std::any for convenience
pub use std::any::{Any, TypeId};
