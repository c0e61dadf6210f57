use sovran_coerce::{
    AnyNumericNode, AnyText, ArrayNode, BoolNode, BoxedValue, CoerceError, Coercer, DoubleNode,
    FnMapper, IntNode, MissingNode, NullNode, ObjectNode, TextNode, TypeToken,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Color {
    Red,
    Green,
    Blue,
}

fn color_token() -> TypeToken {
    TypeToken::enum_of::<Color>(&[
        ("RED", Color::Red),
        ("GREEN", Color::Green),
        ("BLUE", Color::Blue),
    ])
}

#[test]
fn test_primitive_conversions() {
    let coercer = Coercer::new();

    assert_eq!(
        coercer
            .coerce_as::<i32>(&IntNode(42), &TypeToken::of::<i32>())
            .unwrap(),
        Some(42)
    );
    assert_eq!(
        coercer
            .coerce_as::<f64>(&DoubleNode(2.5), &TypeToken::of::<f64>())
            .unwrap(),
        Some(2.5)
    );
    assert_eq!(
        coercer
            .coerce_as::<bool>(&BoolNode(true), &TypeToken::of::<bool>())
            .unwrap(),
        Some(true)
    );
    assert_eq!(
        coercer
            .coerce_as::<String>(&TextNode::from("hello"), &TypeToken::of::<String>())
            .unwrap(),
        Some("hello".to_string())
    );
}

#[test]
fn test_numeric_narrowing_truncates() {
    let coercer = Coercer::new();

    // Narrowing uses the native truncating cast, no overflow check.
    assert_eq!(
        coercer
            .coerce_as::<i8>(&IntNode(300), &TypeToken::of::<i8>())
            .unwrap(),
        Some(300i32 as i8)
    );
    assert_eq!(
        coercer
            .coerce_as::<i16>(&IntNode(70_000), &TypeToken::of::<i16>())
            .unwrap(),
        Some(70_000i32 as i16)
    );
    assert_eq!(
        coercer
            .coerce_as::<f32>(&DoubleNode(3.75), &TypeToken::of::<f32>())
            .unwrap(),
        Some(3.75f32)
    );
}

#[test]
fn test_string_builder_reuse() {
    let coercer = Coercer::new();

    // A supplied String is cleared and refilled rather than replaced.
    let refilled = coercer
        .coerce_into_as::<String>(
            &TextNode::from("fresh"),
            String::from("stale contents"),
            &TypeToken::of::<String>(),
        )
        .unwrap();
    assert_eq!(refilled, Some("fresh".to_string()));
}

#[test]
fn test_char_array_target() {
    let coercer = Coercer::new();

    let chars = coercer
        .coerce_as::<Box<[char]>>(&TextNode::from("abc"), &TypeToken::of::<Box<[char]>>())
        .unwrap()
        .unwrap();
    assert_eq!(&*chars, &['a', 'b', 'c']);
}

#[test]
fn test_any_node_renders_to_text() {
    let coercer = Coercer::new();

    assert_eq!(
        coercer
            .coerce_as::<String>(&IntNode(42), &TypeToken::of::<String>())
            .unwrap(),
        Some("42".to_string())
    );
    assert_eq!(
        coercer
            .coerce_as::<String>(&BoolNode(true), &TypeToken::of::<AnyText>())
            .unwrap(),
        Some("true".to_string())
    );

    let mut obj = ObjectNode::new();
    obj.set("a", IntNode(1));
    assert_eq!(
        coercer
            .coerce_as::<String>(&obj, &TypeToken::of::<String>())
            .unwrap(),
        Some(r#"{"a":1}"#.to_string())
    );
}

#[test]
fn test_default_target_types() {
    let coercer = Coercer::new();

    let value = coercer.coerce_default(&IntNode(5)).unwrap().unwrap();
    assert_eq!(value.downcast_ref::<i32>(), Some(&5));

    let value = coercer.coerce_default(&TextNode::from("t")).unwrap().unwrap();
    assert_eq!(value.downcast_ref::<String>(), Some(&"t".to_string()));

    let value = coercer.coerce_default(&BoolNode(false)).unwrap().unwrap();
    assert_eq!(value.downcast_ref::<bool>(), Some(&false));
}

#[test]
fn test_array_round_trip_length_mismatch() {
    let coercer = Coercer::new();

    let mut arr = ArrayNode::new();
    for v in 1..=5 {
        arr.push(IntNode(v));
    }

    // A 5-element source into a 3-element target yields a fresh 5-element
    // slice with the mapped values in order.
    let token = TypeToken::boxed_slice_of::<i32>(TypeToken::of::<i32>());
    let existing: Box<[i32]> = vec![7, 8, 9].into_boxed_slice();
    let result = coercer
        .coerce_into_as::<Box<[i32]>>(&arr, existing, &token)
        .unwrap()
        .unwrap();
    assert_eq!(&*result, &[1, 2, 3, 4, 5]);
}

#[test]
fn test_list_adjusts_to_source_length() {
    let coercer = Coercer::new();

    let mut arr = ArrayNode::new();
    arr.push(IntNode(1));
    arr.push(IntNode(2));

    let token = TypeToken::vec_of::<i32>(TypeToken::of::<i32>());

    // Shrinks a longer target...
    let shrunk = coercer
        .coerce_into_as::<Vec<i32>>(&arr, vec![9, 9, 9, 9, 9], &token)
        .unwrap()
        .unwrap();
    assert_eq!(shrunk, vec![1, 2]);

    // ...and grows a shorter one.
    let grown = coercer
        .coerce_into_as::<Vec<i32>>(&arr, vec![], &token)
        .unwrap()
        .unwrap();
    assert_eq!(grown, vec![1, 2]);

    // Without an existing instance the default list is constructed.
    let fresh = coercer.coerce_as::<Vec<i32>>(&arr, &token).unwrap().unwrap();
    assert_eq!(fresh, vec![1, 2]);
}

#[test]
fn test_null_elements_become_zero_in_typed_lists() {
    let coercer = Coercer::new();

    let mut arr = ArrayNode::new();
    arr.push(IntNode(1));
    arr.push(NullNode);
    arr.push(IntNode(3));

    let token = TypeToken::vec_of::<i32>(TypeToken::of::<i32>());
    let values = coercer.coerce_as::<Vec<i32>>(&arr, &token).unwrap().unwrap();
    assert_eq!(values, vec![1, 0, 3]);
}

#[test]
fn test_untyped_list_resolves_element_defaults() {
    let coercer = Coercer::new();

    let mut arr = ArrayNode::new();
    arr.push(IntNode(1));
    arr.push(TextNode::from("x"));
    arr.push(NullNode);

    let value = coercer.coerce_default(&arr).unwrap().unwrap();
    let list = value.downcast::<Vec<Option<BoxedValue>>>().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0].as_ref().unwrap().downcast_ref::<i32>(), Some(&1));
    assert_eq!(
        list[1].as_ref().unwrap().downcast_ref::<String>(),
        Some(&"x".to_string())
    );
    assert!(list[2].is_none());
}

#[test]
fn test_map_key_set_pruning() {
    let coercer = Coercer::new();

    let mut obj = ObjectNode::new();
    obj.set("a", IntNode(1));
    obj.set("b", IntNode(2));

    let mut existing = HashMap::new();
    existing.insert("a".to_string(), 10);
    existing.insert("b".to_string(), 20);
    existing.insert("c".to_string(), 30);

    // Mapping into a reused target makes its key set match the source's
    // field set exactly: the stale "c" entry is removed.
    let token = TypeToken::map_of::<String, i32>(TypeToken::of::<String>(), TypeToken::of::<i32>());
    let result = coercer
        .coerce_into_as::<HashMap<String, i32>>(&obj, existing, &token)
        .unwrap()
        .unwrap();

    let mut keys: Vec<&str> = result.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(result["a"], 1);
    assert_eq!(result["b"], 2);
}

#[test]
fn test_untyped_map_default() {
    let coercer = Coercer::new();

    let mut obj = ObjectNode::new();
    obj.set("count", IntNode(7));
    obj.set("label", TextNode::from("tag"));
    obj.set("gone", NullNode);

    let value = coercer.coerce_default(&obj).unwrap().unwrap();
    let map = value
        .downcast::<HashMap<String, Option<BoxedValue>>>()
        .unwrap();
    assert_eq!(map.len(), 3);
    assert_eq!(map["count"].as_ref().unwrap().downcast_ref::<i32>(), Some(&7));
    assert_eq!(
        map["label"].as_ref().unwrap().downcast_ref::<String>(),
        Some(&"tag".to_string())
    );
    assert!(map["gone"].is_none());
}

#[test]
fn test_enum_typed_map_keys() {
    let coercer = Coercer::new();

    let mut obj = ObjectNode::new();
    obj.set("RED", IntNode(1));
    obj.set("BLUE", IntNode(2));

    // Non-string keys are produced by mapping each field name as text.
    let token = TypeToken::map_of::<Color, i32>(color_token(), TypeToken::of::<i32>());
    let result = coercer
        .coerce_as::<HashMap<Color, i32>>(&obj, &token)
        .unwrap()
        .unwrap();
    assert_eq!(result[&Color::Red], 1);
    assert_eq!(result[&Color::Blue], 2);
    assert_eq!(result.len(), 2);
}

#[test]
fn test_nested_structures() {
    let coercer = Coercer::new();

    let mut inner = ObjectNode::new();
    inner.set("x", IntNode(9));

    let mut items = ArrayNode::new();
    items.push(inner);

    let mut obj = ObjectNode::new();
    obj.set("items", items);

    let value = coercer.coerce_default(&obj).unwrap().unwrap();
    let map = value
        .downcast::<HashMap<String, Option<BoxedValue>>>()
        .unwrap();
    let list = map["items"]
        .as_ref()
        .unwrap()
        .downcast_ref::<Vec<Option<BoxedValue>>>()
        .unwrap();
    let nested = list[0]
        .as_ref()
        .unwrap()
        .downcast_ref::<HashMap<String, Option<BoxedValue>>>()
        .unwrap();
    assert_eq!(nested["x"].as_ref().unwrap().downcast_ref::<i32>(), Some(&9));
}

#[test]
fn test_enum_conversion() {
    let coercer = Coercer::new();
    let token = color_token();

    assert_eq!(
        coercer
            .coerce_as::<Color>(&TextNode::from("GREEN"), &token)
            .unwrap(),
        Some(Color::Green)
    );
}

#[test]
fn test_unknown_enum_value_is_an_error() {
    let coercer = Coercer::new();
    let token = color_token();

    let err = coercer
        .coerce_as::<Color>(&TextNode::from("UNKNOWN"), &token)
        .unwrap_err();
    match &err {
        CoerceError::UnknownEnumValue { value, enum_type } => {
            assert_eq!(value, "UNKNOWN");
            assert!(enum_type.contains("Color"));
        }
        other => panic!("expected UnknownEnumValue, got {other:?}"),
    }
    // The message names both the offending text and the enum type.
    let message = err.to_string();
    assert!(message.contains("UNKNOWN"));
    assert!(message.contains("Color"));
}

#[test]
fn test_null_propagation_never_errors() {
    let coercer = Coercer::new();

    assert_eq!(
        coercer
            .coerce_as::<i32>(&NullNode, &TypeToken::of::<i32>())
            .unwrap(),
        None
    );
    assert_eq!(
        coercer
            .coerce_as::<Vec<i32>>(&NullNode, &TypeToken::vec_of::<i32>(TypeToken::of::<i32>()))
            .unwrap(),
        None
    );
    let map_token =
        TypeToken::map_of::<String, i32>(TypeToken::of::<String>(), TypeToken::of::<i32>());
    assert_eq!(
        coercer
            .coerce_as::<HashMap<String, i32>>(&NullNode, &map_token)
            .unwrap(),
        None
    );
    assert_eq!(
        coercer
            .coerce_as::<String>(&MissingNode, &TypeToken::of::<String>())
            .unwrap(),
        None
    );
    // Untargeted null resolves through its default type and stays absent.
    assert!(coercer.coerce_default(&NullNode).unwrap().is_none());
}

#[test]
fn test_identity_conversion() {
    let coercer = Coercer::new();

    let mut obj = ObjectNode::new();
    obj.set("a", IntNode(1));

    // Source class equals target class: the value comes back as itself.
    let copy = coercer
        .coerce_as::<ObjectNode>(&obj, &TypeToken::of::<ObjectNode>())
        .unwrap()
        .unwrap();
    assert_eq!(copy.get("a").and_then(|n| n.as_i64()), Some(1));
}

#[test]
fn test_hierarchy_fallback_through_ancestor_registration() {
    #[derive(Debug, PartialEq)]
    struct Magnitude(f64);

    let coercer = Coercer::new();

    // Registered only for the abstract numeric class; concrete numeric
    // nodes reach it through the ancestor walk.
    coercer.register_mapper(
        AnyNumericNode::source_type(),
        &TypeToken::of::<Magnitude>(),
        Arc::new(FnMapper::new(|_, from, _| {
            Ok(from
                .as_f64()
                .map(|v| Box::new(Magnitude(v.abs())) as BoxedValue))
        })),
    );

    assert_eq!(
        coercer
            .coerce_as::<Magnitude>(&IntNode(-3), &TypeToken::of::<Magnitude>())
            .unwrap(),
        Some(Magnitude(3.0))
    );
    assert_eq!(
        coercer
            .coerce_as::<Magnitude>(&DoubleNode(-2.5), &TypeToken::of::<Magnitude>())
            .unwrap(),
        Some(Magnitude(2.5))
    );
}

#[test]
fn test_unmappable_conversion() {
    let coercer = Coercer::new();

    // No mapper converts a boolean to a char array, anywhere in the
    // hierarchy.
    let err = coercer
        .coerce_as::<Box<[char]>>(&BoolNode(true), &TypeToken::of::<Box<[char]>>())
        .unwrap_err();
    match err {
        CoerceError::Unmappable { value, .. } => assert_eq!(value, "true"),
        other => panic!("expected Unmappable, got {other:?}"),
    }
}

#[test]
fn test_synthesized_mappers_are_cached() {
    let coercer = Coercer::new();
    let token = TypeToken::vec_of::<i32>(TypeToken::of::<i32>());

    let first = coercer
        .mapper_for(ArrayNode::source_type(), &token)
        .unwrap();
    let second = coercer
        .mapper_for(ArrayNode::source_type(), &token)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_synthesis_is_idempotent() {
    let coercer = Arc::new(Coercer::new());

    // Two threads race to synthesize the same never-before-seen mapper.
    // Both conversions succeed and the memoized mapper is stable afterward.
    let mut handles = vec![];
    for _ in 0..2 {
        let coercer = Arc::clone(&coercer);
        handles.push(thread::spawn(move || {
            let token = color_token();
            coercer
                .coerce_as::<Color>(&TextNode::from("RED"), &token)
                .unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(Color::Red));
    }

    let token = color_token();
    let first = coercer
        .mapper_for(TextNode::source_type(), &token)
        .unwrap();
    let second = coercer
        .mapper_for(TextNode::source_type(), &token)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}
