use crate::mapper::BoxedValue;
use crate::token::SourceType;
use std::any::Any;
use std::fmt::Debug;
use std::sync::OnceLock;

/// A value in the JSON-like source data model.
///
/// Each concrete node type is a distinct Rust struct so that the runtime
/// class of a value is a real [`TypeId`](std::any::TypeId); that identity,
/// together with the declared ancestor walk, is what the mapper store
/// dispatches on. The accessor methods expose exactly the capabilities the
/// coercion engine needs: field enumeration for object-like nodes, indexed
/// access and size for array-like nodes, and raw value access for leaves.
pub trait Node: Any + Debug + Send + Sync {
    /// The runtime type descriptor of this value, used for dispatch.
    fn runtime_type(&self) -> &'static SourceType;

    /// This value as `Any`, for callers that need to downcast.
    fn as_any(&self) -> &dyn Any;

    /// An owned boxed copy of this node behind its concrete type.
    fn clone_value(&self) -> BoxedValue;

    /// An owned copy behind the `Node` trait.
    fn clone_node(&self) -> Box<dyn Node>;

    /// Appends a textual rendering of this value to `out`.
    fn write_text(&self, out: &mut String);

    /// Object capability, if this node has named fields.
    fn as_object(&self) -> Option<&ObjectNode> {
        None
    }

    /// Array capability, if this node has indexed elements.
    fn as_array(&self) -> Option<&ArrayNode> {
        None
    }

    /// The raw text, if this is a text leaf.
    fn as_text(&self) -> Option<&str> {
        None
    }

    /// The raw boolean, if this is a boolean leaf.
    fn as_bool(&self) -> Option<bool> {
        None
    }

    /// The integral value, if this is an integral numeric leaf.
    fn as_i64(&self) -> Option<i64> {
        None
    }

    /// The floating-point value, if this is a numeric leaf.
    fn as_f64(&self) -> Option<f64> {
        None
    }
}

impl Clone for Box<dyn Node> {
    fn clone(&self) -> Self {
        (**self).clone_node()
    }
}

// Renders a child inside a container, quoting text leaves.
fn write_child(node: &dyn Node, out: &mut String) {
    if let Some(text) = node.as_text() {
        out.push('"');
        out.push_str(text);
        out.push('"');
    } else {
        node.write_text(out);
    }
}

/// Abstract root of the node hierarchy; registration key for mappers that
/// apply to any source value.
pub struct AnyNode;

impl AnyNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| SourceType::new::<AnyNode>("AnyNode", Vec::new()))
    }
}

/// Abstract class of the numeric leaves.
pub struct AnyNumericNode;

impl AnyNumericNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<AnyNumericNode>("AnyNumericNode", vec![AnyNode::source_type()])
        })
    }
}

/// Abstract class of object-like nodes.
pub struct AnyObjectNode;

impl AnyObjectNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<AnyObjectNode>("AnyObjectNode", vec![AnyNode::source_type()])
        })
    }
}

/// Abstract class of array-like nodes.
pub struct AnyArrayNode;

impl AnyArrayNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<AnyArrayNode>("AnyArrayNode", vec![AnyNode::source_type()])
        })
    }
}

/// An object-like node: insertion-ordered named fields.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    entries: Vec<(String, Box<dyn Node>)>,
}

impl ObjectNode {
    /// Creates an empty object node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<ObjectNode>(
                "ObjectNode",
                vec![AnyObjectNode::source_type(), AnyNode::source_type()],
            )
        })
    }

    /// Sets a field, replacing any previous value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Node) -> &mut Self {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = Box::new(value);
        } else {
            self.entries.push((name, Box::new(value)));
        }
        self
    }

    /// The value of the named field, if present.
    pub fn get(&self, name: &str) -> Option<&dyn Node> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| &**v as &dyn Node)
    }

    /// The field names, in insertion order.
    pub fn field_names<'a>(&'a self) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// The fields as `(name, value)` pairs, in insertion order.
    pub fn fields<'a>(&'a self) -> impl Iterator<Item = (&'a str, &'a dyn Node)> + 'a {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), &**v as &dyn Node))
    }

    /// The number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Node for ObjectNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(self.clone())
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn write_text(&self, out: &mut String) {
        out.push('{');
        for (index, (name, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(name);
            out.push_str("\":");
            write_child(&**value, out);
        }
        out.push('}');
    }

    fn as_object(&self) -> Option<&ObjectNode> {
        Some(self)
    }
}

/// An array-like node: ordered elements.
#[derive(Debug, Clone, Default)]
pub struct ArrayNode {
    elements: Vec<Box<dyn Node>>,
}

impl ArrayNode {
    /// Creates an empty array node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<ArrayNode>(
                "ArrayNode",
                vec![AnyArrayNode::source_type(), AnyNode::source_type()],
            )
        })
    }

    /// Appends an element.
    pub fn push(&mut self, value: impl Node) -> &mut Self {
        self.elements.push(Box::new(value));
        self
    }

    /// The element at `index`, if in bounds.
    pub fn get(&self, index: usize) -> Option<&dyn Node> {
        self.elements.get(index).map(|e| &**e as &dyn Node)
    }

    /// The elements, in order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a dyn Node> + 'a {
        self.elements.iter().map(|e| &**e as &dyn Node)
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Node for ArrayNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(self.clone())
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn write_text(&self, out: &mut String) {
        out.push('[');
        for (index, element) in self.elements.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            write_child(&**element, out);
        }
        out.push(']');
    }

    fn as_array(&self) -> Option<&ArrayNode> {
        Some(self)
    }
}

/// A text leaf.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextNode(pub String);

impl TextNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| SourceType::new::<TextNode>("TextNode", vec![AnyNode::source_type()]))
    }
}

impl From<&str> for TextNode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TextNode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Node for TextNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(self.clone())
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn write_text(&self, out: &mut String) {
        out.push_str(&self.0);
    }

    fn as_text(&self) -> Option<&str> {
        Some(&self.0)
    }
}

/// A 32-bit integer leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntNode(pub i32);

impl IntNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<IntNode>(
                "IntNode",
                vec![AnyNumericNode::source_type(), AnyNode::source_type()],
            )
        })
    }
}

impl Node for IntNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(*self)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(*self)
    }

    fn write_text(&self, out: &mut String) {
        out.push_str(&self.0.to_string());
    }

    fn as_i64(&self) -> Option<i64> {
        Some(i64::from(self.0))
    }

    fn as_f64(&self) -> Option<f64> {
        Some(f64::from(self.0))
    }
}

/// A 64-bit integer leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LongNode(pub i64);

impl LongNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<LongNode>(
                "LongNode",
                vec![AnyNumericNode::source_type(), AnyNode::source_type()],
            )
        })
    }
}

impl Node for LongNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(*self)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(*self)
    }

    fn write_text(&self, out: &mut String) {
        out.push_str(&self.0.to_string());
    }

    fn as_i64(&self) -> Option<i64> {
        Some(self.0)
    }

    fn as_f64(&self) -> Option<f64> {
        Some(self.0 as f64)
    }
}

/// A double-precision float leaf.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DoubleNode(pub f64);

impl DoubleNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<DoubleNode>(
                "DoubleNode",
                vec![AnyNumericNode::source_type(), AnyNode::source_type()],
            )
        })
    }
}

impl Node for DoubleNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(*self)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(*self)
    }

    fn write_text(&self, out: &mut String) {
        out.push_str(&self.0.to_string());
    }

    fn as_f64(&self) -> Option<f64> {
        Some(self.0)
    }
}

/// A boolean leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoolNode(pub bool);

impl BoolNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| SourceType::new::<BoolNode>("BoolNode", vec![AnyNode::source_type()]))
    }
}

impl Node for BoolNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(*self)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(*self)
    }

    fn write_text(&self, out: &mut String) {
        out.push_str(if self.0 { "true" } else { "false" });
    }

    fn as_bool(&self) -> Option<bool> {
        Some(self.0)
    }
}

/// The explicit null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullNode;

impl NullNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| SourceType::new::<NullNode>("NullNode", vec![AnyNode::source_type()]))
    }
}

impl Node for NullNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(*self)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(*self)
    }

    fn write_text(&self, out: &mut String) {
        out.push_str("null");
    }
}

/// The absent value, distinct from an explicit null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissingNode;

impl MissingNode {
    /// Runtime type descriptor for this node class.
    pub fn source_type() -> &'static SourceType {
        static TYPE: OnceLock<SourceType> = OnceLock::new();
        TYPE.get_or_init(|| {
            SourceType::new::<MissingNode>("MissingNode", vec![AnyNode::source_type()])
        })
    }
}

impl Node for MissingNode {
    fn runtime_type(&self) -> &'static SourceType {
        Self::source_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_value(&self) -> BoxedValue {
        Box::new(*self)
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(*self)
    }

    fn write_text(&self, _out: &mut String) {}
}
