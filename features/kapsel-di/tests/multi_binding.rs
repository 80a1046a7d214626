use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use kapsel_di::{
    classifier, FactoryRegistry, Instance, InstanceFactory, RegistryBuilder, Scope, ScopeError,
    Selector, SelectorFilter,
};

#[derive(Debug)]
struct Page {
    label: &'static str,
}

fn page_factory(label: &'static str) -> InstanceFactory {
    InstanceFactory::new(move |_| Ok(Page { label }))
}

fn labels(pages: &[Arc<Page>]) -> Vec<&'static str> {
    pages.iter().map(|page| page.label).collect()
}

#[test]
fn two_factories_make_a_single_lookup_ambiguous() {
    let mut builder = RegistryBuilder::new();
    builder.factory(page_factory("first"));
    builder.factory(page_factory("second"));
    let root = Scope::root(Arc::new(builder.build()));

    let err = root.get_single::<Page>(classifier::NONE).unwrap_err();
    assert!(matches!(err, ScopeError::AmbiguousBinding { .. }));

    let err = root.get_optional::<Page>(classifier::NONE).unwrap_err();
    assert!(matches!(err, ScopeError::AmbiguousBinding { .. }));

    let pages = root.get_many::<Page>(classifier::NONE).unwrap();
    assert_eq!(labels(&pages), vec!["first", "second"]);
}

#[test]
fn get_many_on_an_unregistered_key_is_empty() {
    let root = Scope::root(Arc::new(RegistryBuilder::new().build()));
    assert!(root.get_many::<Page>(classifier::NONE).unwrap().is_empty());
    assert!(root.get_many::<Page>("secondary").unwrap().is_empty());
}

#[test]
fn get_many_reuses_each_factorys_contribution() {
    let constructions = Arc::new(AtomicUsize::new(0));

    let mut builder = RegistryBuilder::new();
    for label in ["first", "second"] {
        let count = constructions.clone();
        builder.factory(InstanceFactory::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Page { label })
        }));
    }
    let root = Scope::root(Arc::new(builder.build()));

    let first_pass = root.get_many::<Page>(classifier::NONE).unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), 2);

    let second_pass = root.get_many::<Page>(classifier::NONE).unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
    for (first, second) in first_pass.iter().zip(second_pass.iter()) {
        assert!(Arc::ptr_eq(first, second));
    }
}

#[test]
fn selector_filter_narrows_both_cardinalities() {
    let mut builder = RegistryBuilder::new();
    builder.factory(page_factory("public").with_selector(Selector::new("audience", &["public"])));
    builder.factory(page_factory("admin").with_selector(Selector::new("audience", &["admin"])));
    let root = Scope::root(Arc::new(builder.build()));
    root.bind(
        SelectorFilter::new(|selector| selector.args.iter().any(|arg| arg == "public")),
        "audience",
    )
    .unwrap();

    let pages = root.get_many::<Page>(classifier::NONE).unwrap();
    assert_eq!(labels(&pages), vec!["public"]);

    let single = root.get_single::<Page>(classifier::NONE).unwrap();
    assert_eq!(single.label, "public");
}

fn mixed_range_registry() -> FactoryRegistry {
    let mut builder = RegistryBuilder::new();
    builder.factory(page_factory("plain"));
    builder.factory(page_factory("flagged").with_selector(Selector::new("flag", &["on"])));
    builder.build()
}

#[test]
fn selective_subset_excludes_plain_factories_from_many() {
    let root = Scope::root(Arc::new(mixed_range_registry()));
    root.bind(SelectorFilter::new(|_| true), "flag").unwrap();

    // Once a range carries a selector, only the selective subset survives.
    let pages = root.get_many::<Page>(classifier::NONE).unwrap();
    assert_eq!(labels(&pages), vec!["flagged"]);

    let err = root.get_single::<Page>(classifier::NONE).unwrap_err();
    assert!(matches!(err, ScopeError::AmbiguousBinding { .. }));
}

#[test]
fn rejected_selector_leaves_the_plain_factory_for_single() {
    let root = Scope::root(Arc::new(mixed_range_registry()));
    root.bind(SelectorFilter::new(|_| false), "flag").unwrap();

    let single = root.get_single::<Page>(classifier::NONE).unwrap();
    assert_eq!(single.label, "plain");

    let pages = root.get_many::<Page>(classifier::NONE).unwrap();
    assert!(pages.is_empty());
}

#[test]
fn declared_selector_without_a_filter_is_fatal() {
    let mut builder = RegistryBuilder::new();
    builder.factory(page_factory("ghost").with_selector(Selector::new("ghost", &[])));
    let root = Scope::root(Arc::new(builder.build()));

    let err = root.get_single::<Page>(classifier::NONE).unwrap_err();
    match err {
        ScopeError::MissingSelector { selector, .. } => assert_eq!(selector, "ghost"),
        other => panic!("expected MissingSelector, got {other:?}"),
    }

    let err = root.get_many::<Page>(classifier::NONE).unwrap_err();
    assert!(matches!(err, ScopeError::MissingSelector { .. }));
}

struct FileStore {
    #[allow(dead_code)]
    path: &'static str,
}

struct BlobSink {
    store: Arc<FileStore>,
}

#[test]
fn aliased_types_share_one_construction() {
    let constructions = Arc::new(AtomicUsize::new(0));

    let mut builder = RegistryBuilder::new();
    let count = constructions.clone();
    let store = builder.factory(InstanceFactory::new(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(FileStore { path: "/var/data" })
    }));
    let count = constructions.clone();
    let sink = builder.factory(InstanceFactory::new(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(BlobSink {
            store: Arc::new(FileStore { path: "/var/data" }),
        })
    }));
    builder.alias(store, sink, |instance| {
        let store = instance.downcast::<FileStore>().expect("aliased file store");
        Instance::new(BlobSink { store })
    });
    builder.alias(sink, store, |instance| {
        let sink = instance.downcast::<BlobSink>().expect("aliased blob sink");
        Instance::from_arc(sink.store.clone())
    });
    let root = Scope::root(Arc::new(builder.build()));

    let file_store = root.get_single::<FileStore>(classifier::NONE).unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), 1);

    // The sibling registration already covered the second key.
    let blob_sink = root.get_single::<BlobSink>(classifier::NONE).unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&file_store, &blob_sink.store));

    // Multi lookups see the sibling's contribution as well.
    let sinks = root.get_many::<BlobSink>(classifier::NONE).unwrap();
    assert_eq!(sinks.len(), 1);
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
}
