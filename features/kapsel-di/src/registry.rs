use std::{
    any::TypeId,
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, OnceLock},
};

use crate::{
    errors::{InstallError, ScopeError},
    factories::{FactoryId, InstanceFactory, ScopeFactory, SiblingType},
    types::{Instance, TypeInfo},
};

/// Contiguous run of the factory table serving one (type, classifier)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Range {
    pub(crate) from: usize,
    pub(crate) count: usize,
    pub(crate) classifier: String,
}

/// Index entry of one produced type
pub(crate) enum TypeIndex {
    /// All factories of the type share one classifier
    Single(Range),
    /// The type is bound under several classifiers
    Classified(HashMap<String, Range>),
}

/// Filter callback applied to candidate factories during lookup
pub(crate) type FactoryFilter<'a> = dyn FnMut(&InstanceFactory) -> Result<bool, ScopeError> + 'a;

/// Flat factory table plus its lookup index.
///
/// Built once, consumed as data: the registry never cares how its factories
/// came to be, it only answers which of them satisfy a (type, classifier)
/// request.
pub struct FactoryRegistry {
    factories: Vec<(FactoryId, InstanceFactory)>,
    index: HashMap<TypeId, TypeIndex>,
    scope_factories: HashMap<TypeId, ScopeFactory>,
}

impl FactoryRegistry {
    /// Registry with no factories; resolution only ever finds explicit bindings
    pub fn empty() -> Self {
        FactoryRegistry {
            factories: Vec::new(),
            index: HashMap::new(),
            scope_factories: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// A missing index entry is not an error: it simply means zero matches,
    /// which lets binding-only configurations work without any factories.
    fn range(&self, type_id: TypeId, classifier: &str) -> Option<&Range> {
        match self.index.get(&type_id)? {
            TypeIndex::Single(range) => (range.classifier == classifier).then_some(range),
            TypeIndex::Classified(ranges) => ranges.get(classifier),
        }
    }

    /// Returns the one factory in the matching range that passes `filter`.
    ///
    /// More than one passing factory is an ambiguity; a range with a single
    /// entry skips the ambiguity scan entirely.
    pub(crate) fn single_or_none(
        &self,
        info: TypeInfo,
        classifier: &str,
        filter: &mut FactoryFilter<'_>,
    ) -> Result<Option<(FactoryId, &InstanceFactory)>, ScopeError> {
        let Some(range) = self.range(info.type_id, classifier) else {
            return Ok(None);
        };

        if range.count == 1 {
            let (id, factory) = &self.factories[range.from];
            return Ok(filter(factory)?.then_some((*id, factory)));
        }

        let mut found = None;
        for (id, factory) in &self.factories[range.from..range.from + range.count] {
            if filter(factory)? {
                if found.is_some() {
                    return Err(ScopeError::AmbiguousBinding {
                        type_name: info.type_name,
                        classifier: classifier.to_owned(),
                    });
                }
                found = Some((*id, factory));
            }
        }
        Ok(found)
    }

    /// Returns every factory of the matching range that passes `filter`, in
    /// registration order.
    ///
    /// If the range contains selector-bearing factories, only those that pass
    /// their filter are returned and the rest of the range is excluded; a
    /// range without any selector passes as a whole.
    pub(crate) fn many(
        &self,
        info: TypeInfo,
        classifier: &str,
        filter: &mut FactoryFilter<'_>,
    ) -> Result<Vec<(FactoryId, &InstanceFactory)>, ScopeError> {
        let Some(range) = self.range(info.type_id, classifier) else {
            return Ok(Vec::new());
        };
        let entries = &self.factories[range.from..range.from + range.count];

        let mut selective: Option<Vec<(FactoryId, &InstanceFactory)>> = None;
        for (id, factory) in entries {
            if factory.selector.is_some() {
                let selected = selective.get_or_insert_with(Vec::new);
                if filter(factory)? {
                    selected.push((*id, factory));
                }
            }
        }
        if let Some(selected) = selective {
            return Ok(selected);
        }

        Ok(entries.iter().map(|(id, factory)| (*id, factory)).collect())
    }

    pub(crate) fn scope_factory(&self, info: TypeInfo) -> Result<&ScopeFactory, ScopeError> {
        self.scope_factories
            .get(&info.type_id)
            .ok_or(ScopeError::MissingScopeFactory {
                type_name: info.type_name,
            })
    }
}

/// Assembles the flat factory table, its index and the scope-factory map.
///
/// This is the registration side of the runtime: whatever produces factories
/// (hand-written wiring, generated code) funnels them through a builder and
/// hands the finished registry to the scopes as data.
#[derive(Default)]
pub struct RegistryBuilder {
    factories: Vec<InstanceFactory>,
    scope_factories: HashMap<TypeId, ScopeFactory>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory and returns its stable identity
    pub fn factory(&mut self, factory: InstanceFactory) -> FactoryId {
        let id = FactoryId(self.factories.len());
        self.factories.push(factory);
        id
    }

    /// Links `from` to its sibling `to`: constructing through `from` also
    /// registers the object under `to`'s type, surfaced through `view`, so
    /// `to` is never invoked for an object that already exists.
    pub fn alias(
        &mut self,
        from: FactoryId,
        to: FactoryId,
        view: impl Fn(&Instance) -> Instance + Send + Sync + 'static,
    ) {
        let info = self.factories[to.0].info;
        self.factories[from.0].siblings.push(SiblingType {
            info,
            factory: to,
            view: Box::new(view),
        });
    }

    pub fn scope_factory(&mut self, factory: ScopeFactory) {
        self.scope_factories.insert(factory.info.type_id, factory);
    }

    pub fn build(self) -> FactoryRegistry {
        let mut factories: Vec<(FactoryId, InstanceFactory)> = self
            .factories
            .into_iter()
            .enumerate()
            .map(|(index, factory)| (FactoryId(index), factory))
            .collect();

        // Stable sort groups each (type, classifier) into a contiguous range
        // while keeping registration order within the range.
        factories.sort_by(|(_, a), (_, b)| {
            (a.info.type_id, &a.classifier).cmp(&(b.info.type_id, &b.classifier))
        });

        let mut index: HashMap<TypeId, TypeIndex> = HashMap::new();
        let mut start = 0;
        while start < factories.len() {
            let (_, first) = &factories[start];
            let mut end = start + 1;
            while end < factories.len() {
                let (_, next) = &factories[end];
                if next.info.type_id != first.info.type_id || next.classifier != first.classifier {
                    break;
                }
                end += 1;
            }

            let range = Range {
                from: start,
                count: end - start,
                classifier: first.classifier.clone(),
            };
            match index.entry(first.info.type_id) {
                Entry::Vacant(slot) => {
                    slot.insert(TypeIndex::Single(range));
                }
                Entry::Occupied(mut slot) => {
                    let indexed = slot.get_mut();
                    match indexed {
                        TypeIndex::Single(existing) => {
                            let mut ranges = HashMap::new();
                            ranges.insert(existing.classifier.clone(), existing.clone());
                            ranges.insert(range.classifier.clone(), range);
                            *indexed = TypeIndex::Classified(ranges);
                        }
                        TypeIndex::Classified(ranges) => {
                            ranges.insert(range.classifier.clone(), range);
                        }
                    }
                }
            }
            start = end;
        }

        FactoryRegistry {
            factories,
            index,
            scope_factories: self.scope_factories,
        }
    }
}

static INSTALLED: OnceLock<Arc<FactoryRegistry>> = OnceLock::new();

/// Installs the process-wide registry.
///
/// Expected to be called once during process initialization, before the
/// first [crate::scope::root_scope] call.
pub fn install(registry: FactoryRegistry) -> Result<(), InstallError> {
    let count = registry.len();
    INSTALLED
        .set(Arc::new(registry))
        .map_err(|_| InstallError::AlreadyInstalled)?;
    tracing::debug!("Installed factory registry with {count} factories");
    Ok(())
}

/// The installed registry, or an empty one when registration never happened.
pub(crate) fn installed() -> Arc<FactoryRegistry> {
    match INSTALLED.get() {
        Some(registry) => registry.clone(),
        None => {
            tracing::warn!(
                "No factory registry installed - factory-backed resolution is unavailable, \
                 explicit bindings still work"
            );
            Arc::new(FactoryRegistry::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Selector;

    struct Alpha;
    struct Beta;

    fn passing(_: &InstanceFactory) -> Result<bool, ScopeError> {
        Ok(true)
    }

    fn alpha_factory(classifier: &str) -> InstanceFactory {
        InstanceFactory::new(|_| Ok(Alpha)).with_classifier(classifier)
    }

    #[test]
    fn interleaved_registration_builds_contiguous_ranges() {
        let mut builder = RegistryBuilder::new();
        let a1 = builder.factory(alpha_factory(""));
        let b = builder.factory(InstanceFactory::new(|_| Ok(Beta)));
        let a2 = builder.factory(alpha_factory(""));
        let registry = builder.build();

        let many = registry
            .many(TypeInfo::of::<Alpha>(), "", &mut passing)
            .unwrap();
        let ids: Vec<FactoryId> = many.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![a1, a2], "registration order within the range");

        let single = registry
            .single_or_none(TypeInfo::of::<Beta>(), "", &mut passing)
            .unwrap();
        assert_eq!(single.map(|(id, _)| id), Some(b));
    }

    #[test]
    fn classified_type_indexes_per_classifier() {
        let mut builder = RegistryBuilder::new();
        let plain = builder.factory(alpha_factory(""));
        let primary = builder.factory(alpha_factory("primary"));
        let registry = builder.build();

        let found = registry
            .single_or_none(TypeInfo::of::<Alpha>(), "primary", &mut passing)
            .unwrap();
        assert_eq!(found.map(|(id, _)| id), Some(primary));

        let found = registry
            .single_or_none(TypeInfo::of::<Alpha>(), "", &mut passing)
            .unwrap();
        assert_eq!(found.map(|(id, _)| id), Some(plain));

        let found = registry
            .single_or_none(TypeInfo::of::<Alpha>(), "unknown", &mut passing)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn missing_index_entry_is_zero_matches() {
        let registry = RegistryBuilder::new().build();
        let found = registry
            .single_or_none(TypeInfo::of::<Alpha>(), "", &mut passing)
            .unwrap();
        assert!(found.is_none());
        let many = registry
            .many(TypeInfo::of::<Alpha>(), "", &mut passing)
            .unwrap();
        assert!(many.is_empty());
    }

    #[test]
    fn two_passing_candidates_are_ambiguous() {
        let mut builder = RegistryBuilder::new();
        builder.factory(alpha_factory(""));
        builder.factory(alpha_factory(""));
        let registry = builder.build();

        let err = registry
            .single_or_none(TypeInfo::of::<Alpha>(), "", &mut passing)
            .unwrap_err();
        assert!(matches!(err, ScopeError::AmbiguousBinding { .. }));
    }

    #[test]
    fn selective_subset_narrows_the_whole_range() {
        let mut builder = RegistryBuilder::new();
        builder.factory(alpha_factory(""));
        let selected = builder.factory(
            alpha_factory("").with_selector(Selector::new("feature", &["on"])),
        );
        let registry = builder.build();

        // With a passing filter only the selector-bearing factory remains.
        let many = registry
            .many(TypeInfo::of::<Alpha>(), "", &mut passing)
            .unwrap();
        let ids: Vec<FactoryId> = many.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![selected]);

        // With a rejecting filter the range yields nothing at all.
        let many = registry
            .many(TypeInfo::of::<Alpha>(), "", &mut |_| Ok(false))
            .unwrap();
        assert!(many.is_empty());
    }

    #[test]
    fn scope_factory_lookup_fails_when_unregistered() {
        let registry = RegistryBuilder::new().build();
        let err = registry.scope_factory(TypeInfo::of::<Alpha>()).unwrap_err();
        assert!(matches!(err, ScopeError::MissingScopeFactory { .. }));
    }
}
