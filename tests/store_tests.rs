use sovran_coerce::{AnyNumber, AnyText, MapperStore, SourceType, TypeToken};
use std::sync::{Arc, OnceLock};

// A tiny three-level source model for exercising the hierarchy walk:
// LeafSource -> MiddleSource -> BaseSource.
struct BaseSource;
struct MiddleSource;
struct LeafSource;

fn base_type() -> &'static SourceType {
    static TYPE: OnceLock<SourceType> = OnceLock::new();
    TYPE.get_or_init(|| SourceType::new::<BaseSource>("BaseSource", Vec::new()))
}

fn middle_type() -> &'static SourceType {
    static TYPE: OnceLock<SourceType> = OnceLock::new();
    TYPE.get_or_init(|| SourceType::new::<MiddleSource>("MiddleSource", vec![base_type()]))
}

fn leaf_type() -> &'static SourceType {
    static TYPE: OnceLock<SourceType> = OnceLock::new();
    TYPE.get_or_init(|| {
        SourceType::new::<LeafSource>("LeafSource", vec![middle_type(), base_type()])
    })
}

// The store is generic over the mapper payload; plain strings are enough to
// tell entries apart here.
fn store() -> MapperStore<str> {
    MapperStore::new()
}

#[test]
fn test_exact_match_is_deterministic() {
    let store = store();
    let token = TypeToken::of::<i32>();
    store.add_mapper(leaf_type(), &token, Arc::from("leaf-to-i32"));

    let first = store.mapper_for(leaf_type(), &token).unwrap();
    assert_eq!(&*first, "leaf-to-i32");

    // Every subsequent lookup lands on the same entry.
    for _ in 0..100 {
        let again = store.mapper_for(leaf_type(), &token).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
}

#[test]
fn test_later_registration_replaces() {
    let store = store();
    let token = TypeToken::of::<i32>();
    store.add_mapper(leaf_type(), &token, Arc::from("first"));
    store.add_mapper(leaf_type(), &token, Arc::from("second"));

    assert_eq!(&*store.mapper_for(leaf_type(), &token).unwrap(), "second");
}

#[test]
fn test_hierarchy_fallback_finds_ancestor_entry() {
    let store = store();
    let token = TypeToken::of::<String>();
    store.add_mapper(base_type(), &token, Arc::from("base-to-string"));

    // Nothing registered for the leaf itself; the ancestor entry satisfies
    // the lookup and the result is memoized under the concrete pair.
    let resolved = store.mapper_for(leaf_type(), &token).unwrap();
    assert_eq!(&*resolved, "base-to-string");

    let memoized = store.mapper_for(leaf_type(), &token).unwrap();
    assert!(Arc::ptr_eq(&resolved, &memoized));
}

#[test]
fn test_most_derived_ancestor_wins() {
    let store = store();
    let token = TypeToken::of::<String>();
    store.add_mapper(base_type(), &token, Arc::from("base"));
    store.add_mapper(middle_type(), &token, Arc::from("middle"));

    assert_eq!(&*store.mapper_for(leaf_type(), &token).unwrap(), "middle");
}

#[test]
fn test_missing_mapper_is_none() {
    let store = store();
    assert!(store
        .mapper_for(leaf_type(), &TypeToken::of::<bool>())
        .is_none());
}

#[test]
fn test_default_type_inheritance() {
    let store = store();
    store.add_default_type(base_type(), TypeToken::of::<String>());

    // Subclasses inherit the nearest registered ancestor's default.
    let inherited = store.default_type_for(leaf_type()).unwrap();
    assert_eq!(inherited.id(), TypeToken::of::<String>().id());

    // The ancestor walk result is memoized; a repeat query agrees.
    let again = store.default_type_for(leaf_type()).unwrap();
    assert_eq!(again.id(), inherited.id());
}

#[test]
fn test_default_type_most_derived_wins() {
    let store = store();
    store.add_default_type(base_type(), TypeToken::of::<String>());
    store.add_default_type(middle_type(), TypeToken::of::<i64>());

    // The walk is most-derived-first, so the middle entry shadows the base.
    let inherited = store.default_type_for(leaf_type()).unwrap();
    assert_eq!(inherited.id(), TypeToken::of::<i64>().id());
}

#[test]
fn test_no_default_type_is_none() {
    let store = store();
    assert!(store.default_type_for(leaf_type()).is_none());
}

#[test]
fn test_narrower_registered_target_satisfies_supertype_request() {
    let store = store();
    let string_token = TypeToken::of::<String>().assignable_to::<AnyText>();
    store.add_mapper(base_type(), &string_token, Arc::from("to-string"));

    // A request for the marker is satisfied by the narrower String entry.
    let resolved = store
        .mapper_for(leaf_type(), &TypeToken::of::<AnyText>())
        .unwrap();
    assert_eq!(&*resolved, "to-string");
}

#[test]
fn test_default_type_substitution_narrows_the_target() {
    let store = store();
    let i32_token = TypeToken::of::<i32>().assignable_to::<AnyNumber>();
    store.add_default_type(leaf_type(), i32_token.clone());
    store.add_mapper(leaf_type(), &i32_token, Arc::from("to-i32"));

    // Requesting the broad numeric marker re-resolves through the source's
    // default type and lands on the narrower i32 entry.
    let resolved = store
        .mapper_for(leaf_type(), &TypeToken::of::<AnyNumber>())
        .unwrap();
    assert_eq!(&*resolved, "to-i32");
}

#[test]
fn test_assignability_is_declared_not_inferred() {
    let store = store();
    let string_token = TypeToken::of::<String>().assignable_to::<AnyText>();
    store.add_mapper(base_type(), &string_token, Arc::from("to-string"));

    assert!(store.is_assignable(string_token.id(), TypeToken::of::<AnyText>().id()));
    // Nothing was declared about numbers.
    assert!(!store.is_assignable(string_token.id(), TypeToken::of::<AnyNumber>().id()));
}
