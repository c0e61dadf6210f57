// src/store.rs
use crate::token::{SourceType, TypeToken};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

/// The pluggable lookup hook: `(candidate source, original source, target)`.
///
/// The store calls it once per hierarchy candidate, most-derived-first. The
/// default behavior is [`MapperStore::find_base`]; the coercion engine wraps
/// that with its synthesis strategies.
pub type FindFn<'a, M> =
    &'a dyn Fn(&SourceType, &SourceType, &TypeToken) -> Option<Arc<M>>;

/// A type-hierarchy-aware store of mapper entries keyed by source and
/// target type, plus a secondary default-target-type table per source.
///
/// The store is domain-agnostic: it knows nothing about the node model, only
/// about type descriptors. Both indices are process-wide, lazily populated
/// caches: entries are inserted or replaced, never retracted, and a resolved
/// lookup is memoized under the concrete pair that asked for it so repeat
/// queries are a single map hit. Writes are idempotent: two threads racing
/// to memoize the same pair insert behaviorally equivalent mappers, and the
/// last write wins. No lock is held around check/synthesize/insert, and
/// none is ever held across a recursive lookup.
pub struct MapperStore<M: ?Sized> {
    mappers: DashMap<(TypeId, TypeId), Arc<M>>,
    targets_by_source: DashMap<TypeId, Vec<TypeId>>,
    default_types: DashMap<TypeId, TypeToken>,
    supers: DashMap<TypeId, Arc<[TypeId]>>,
}

impl<M: ?Sized + Send + Sync> MapperStore<M> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            mappers: DashMap::new(),
            targets_by_source: DashMap::new(),
            default_types: DashMap::new(),
            supers: DashMap::new(),
        }
    }

    // Records the token's declared supertypes; keyed by erased id, so
    // declaring them once at seeding time covers every later bare token.
    fn note_token(&self, token: &TypeToken) {
        if !token.supers().is_empty() {
            self.supers.insert(token.id(), Arc::from(token.supers()));
        }
    }

    /// Inserts or replaces the mapper for `(from, target)`.
    ///
    /// No compatibility validation is performed; the caller is trusted.
    /// Replacement is how synthesized mappers are memoized; entries are never
    /// retracted.
    pub fn add_mapper(&self, from: &SourceType, target: &TypeToken, mapper: Arc<M>) {
        self.note_token(target);
        let replaced = self.mappers.insert((from.id(), target.id()), mapper);
        if replaced.is_none() {
            self.targets_by_source
                .entry(from.id())
                .or_default()
                .push(target.id());
        }
    }

    /// Inserts or replaces the default target type for `from`.
    pub fn add_default_type(&self, from: &SourceType, target: TypeToken) {
        self.note_token(&target);
        self.default_types.insert(from.id(), target);
    }

    /// The registered or hierarchy-inherited default target type for `from`.
    ///
    /// An exact entry wins; otherwise the queried type's own ancestor walk is
    /// traversed most-derived-first and the nearest registered ancestor's
    /// default is used. The result of that walk is memoized under the queried
    /// type, so the ancestor search runs at most once per distinct source.
    pub fn default_type_for(&self, from: &SourceType) -> Option<TypeToken> {
        if let Some(token) = self.default_types.get(&from.id()) {
            return Some(token.clone());
        }
        let inherited = from
            .ancestors()
            .iter()
            .find_map(|ancestor| self.default_types.get(&ancestor.id()).map(|t| t.clone()))?;
        self.default_types.insert(from.id(), inherited.clone());
        Some(inherited)
    }

    /// Whether `sub` was declared assignable to `sup`.
    pub fn is_assignable(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        self.supers.get(&sub).is_some_and(|s| s.contains(&sup))
    }

    fn exact(&self, from: TypeId, target: TypeId) -> Option<Arc<M>> {
        self.mappers.get(&(from, target)).map(|m| Arc::clone(&m))
    }

    // Runs `find` on the source itself, then on each ancestor
    // most-derived-first; first hit wins.
    fn search(&self, from: &SourceType, target: &TypeToken, find: FindFn<'_, M>) -> Option<Arc<M>> {
        if let Some(mapper) = find(from, from, target) {
            return Some(mapper);
        }
        from.ancestors()
            .iter()
            .find_map(|ancestor| find(ancestor, from, target))
    }

    /// Returns a mapper for converting a value of class `from` to `target`,
    /// running `find` at each hierarchy candidate on a cache miss.
    ///
    /// Whichever ancestor satisfies the search, the result is memoized under
    /// the concrete `(from, target)` pair, so repeated queries are O(1).
    /// `None` means the entire walk came up dry; no negative result is
    /// cached; the search is deterministic, so a repeat miss costs the same
    /// walk and nothing more.
    pub fn mapper_for_with(
        &self,
        from: &SourceType,
        target: &TypeToken,
        find: FindFn<'_, M>,
    ) -> Option<Arc<M>> {
        if let Some(mapper) = self.exact(from.id(), target.id()) {
            return Some(mapper);
        }
        let found = self.search(from, target, find)?;
        self.add_mapper(from, target, Arc::clone(&found));
        Some(found)
    }

    /// Resolves a mapper using only the store's own registrations, i.e. the
    /// hierarchy walk with [`find_base`](Self::find_base) at every candidate.
    pub fn mapper_for(&self, from: &SourceType, target: &TypeToken) -> Option<Arc<M>> {
        self.mapper_for_with(from, target, &|candidate, origin, token| {
            self.base_find(candidate, origin, token)
        })
    }

    fn base_find(
        &self,
        candidate: &SourceType,
        origin: &SourceType,
        target: &TypeToken,
    ) -> Option<Arc<M>> {
        self.find_base(candidate, origin, target, &|c, o, t| self.base_find(c, o, t))
    }

    /// The default lookup behavior for one hierarchy candidate.
    ///
    /// `None` when nothing at all is registered under `candidate`; the
    /// caller keeps walking up the hierarchy. With entries present, an exact
    /// target match wins; otherwise two fallbacks run in order:
    ///
    /// 1. If the *original* source's default target type is a declared
    ///    subtype of the requested target (and differs from it), the search
    ///    restarts for that narrower default type.
    /// 2. Otherwise the candidate's registered targets are scanned in
    ///    registration order for one declared assignable to the requested
    ///    target, and that entry is used. This is what lets a broad mapper
    ///    (say, anything to `String`) satisfy a request for a supertype
    ///    target such as [`AnyText`](crate::AnyText).
    pub fn find_base(
        &self,
        candidate: &SourceType,
        origin: &SourceType,
        target: &TypeToken,
        find: FindFn<'_, M>,
    ) -> Option<Arc<M>> {
        let registered = self
            .targets_by_source
            .get(&candidate.id())
            .map(|targets| targets.clone())?;

        if let Some(mapper) = self.exact(candidate.id(), target.id()) {
            return Some(mapper);
        }

        if let Some(default_token) = self.default_type_for(origin) {
            if default_token.id() != target.id()
                && self.is_assignable(default_token.id(), target.id())
            {
                if let Some(mapper) = self.search(origin, &default_token, find) {
                    return Some(mapper);
                }
            }
        }

        let narrower = registered
            .iter()
            .copied()
            .find(|registered_target| self.is_assignable(*registered_target, target.id()))?;
        self.exact(candidate.id(), narrower)
    }
}

impl<M: ?Sized + Send + Sync> Default for MapperStore<M> {
    fn default() -> Self {
        Self::new()
    }
}
