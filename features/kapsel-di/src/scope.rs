use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
    },
};

use crate::{
    context::InstantiationContext,
    errors::ScopeError,
    factories::{FactoryId, InstanceFactory, Scoping},
    registry::{self, FactoryRegistry},
    selector::SelectorFilter,
    types::{Injectable, Instance, InstanceKey, TypeInfo},
};

/// How many instances a lookup expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cardinality {
    Optional,
    Single,
    Many,
}

/// Cached instances of one binding key.
///
/// Most entries hold a single instance. Keys shared by several factories
/// (multi-bindings, sibling links) accumulate one contribution per factory,
/// in the order they were registered; `None` marks an explicit binding.
#[derive(Clone)]
struct CacheEntry {
    /// Scope depth the entry was placed at
    depth: usize,
    instances: Vec<(Option<FactoryId>, Instance)>,
}

impl CacheEntry {
    fn new(depth: usize, factory: Option<FactoryId>, instance: Instance) -> Self {
        CacheEntry {
            depth,
            instances: vec![(factory, instance)],
        }
    }

    /// Adds a contribution, replacing an earlier one from the same factory
    fn register(&mut self, factory: Option<FactoryId>, instance: Instance) {
        if factory.is_some() {
            if let Some(slot) = self
                .instances
                .iter_mut()
                .find(|(existing, _)| *existing == factory)
            {
                slot.1 = instance;
                return;
            }
        }
        self.instances.push((factory, instance));
    }

    fn single(&self, key: &InstanceKey) -> Result<Instance, ScopeError> {
        match self.instances.as_slice() {
            [(_, instance)] => Ok(instance.clone()),
            _ => Err(ScopeError::AmbiguousBinding {
                type_name: key.info.type_name,
                classifier: key.classifier.clone(),
            }),
        }
    }

    fn contributed_by(&self, factory: FactoryId) -> Option<Instance> {
        self.instances
            .iter()
            .find(|(existing, _)| *existing == Some(factory))
            .map(|(_, instance)| instance.clone())
    }
}

struct ScopeInner {
    /// Ownership flows child to parent; lookups walk this chain upwards
    parent: Option<Arc<ScopeInner>>,
    registry: Arc<FactoryRegistry>,
    /// Distance from the root scope
    depth: usize,
    disposed: AtomicBool,
    instances: RwLock<HashMap<InstanceKey, CacheEntry>>,
    /// Non-owning tracking handles, kept only for cascade disposal
    children: Mutex<Vec<Weak<ScopeInner>>>,
}

impl ScopeInner {
    fn check_not_disposed(&self) -> Result<(), ScopeError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ScopeError::Disposed);
        }
        Ok(())
    }
}

/// Hierarchical cache node controlling instance lifetime and visibility.
///
/// The scope tree is the resolution entry point: lookups consult the factory
/// registry, walk the cache chain towards the root and place constructed
/// objects at the depth their dependencies allow. Cloning the handle shares
/// the node.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

/// Root scope over the process-wide installed registry.
///
/// When no registry has been installed, a warning is logged and the scope
/// starts degraded: factory-backed resolution finds nothing, explicit
/// bindings still resolve.
pub fn root_scope() -> Scope {
    Scope::root(registry::installed())
}

impl Scope {
    /// Root scope over an explicit registry
    pub fn root(registry: Arc<FactoryRegistry>) -> Self {
        Scope {
            inner: Arc::new(ScopeInner {
                parent: None,
                registry,
                depth: 0,
                disposed: AtomicBool::new(false),
                instances: RwLock::new(HashMap::new()),
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Distance from the root scope
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Resolves the single matching instance, or `None` if neither a factory
    /// nor a bound instance exists anywhere in the scope chain.
    pub fn get_optional<T: Injectable>(
        &self,
        classifier: &str,
    ) -> Result<Option<Arc<T>>, ScopeError> {
        self.inner.check_not_disposed()?;
        let chain = InstantiationContext::new();
        get_optional_on::<T>(&self.inner, classifier, &chain)
    }

    /// Resolves the single matching instance, failing if nothing resolves
    pub fn get_single<T: Injectable>(&self, classifier: &str) -> Result<Arc<T>, ScopeError> {
        self.inner.check_not_disposed()?;
        let chain = InstantiationContext::new();
        get_single_on::<T>(&self.inner, classifier, &chain)
    }

    /// Resolves every matching, selector-passing factory of the key, in
    /// registration order. An empty result is not a failure, and re-querying
    /// re-evaluates the registry rather than replaying a snapshot.
    pub fn get_many<T: Injectable>(&self, classifier: &str) -> Result<Vec<Arc<T>>, ScopeError> {
        self.inner.check_not_disposed()?;
        let chain = InstantiationContext::new();
        get_many_on::<T>(&self.inner, classifier, &chain)
    }

    /// Registers an already constructed object at this scope's own depth
    pub fn bind<T: Injectable>(&self, instance: T, classifier: &str) -> Result<(), ScopeError> {
        self.bind_arc(Arc::new(instance), classifier)
    }

    /// Like [Scope::bind], but accepts an already shared object
    pub fn bind_arc<T: Injectable>(
        &self,
        instance: Arc<T>,
        classifier: &str,
    ) -> Result<(), ScopeError> {
        self.inner.check_not_disposed()?;
        let key = InstanceKey::of::<T>(classifier);
        let mut instances = write_lock(&self.inner.instances);
        if instances.contains_key(&key) {
            return Err(ScopeError::DuplicateBinding {
                key: key.to_string(),
            });
        }
        instances.insert(
            key,
            CacheEntry::new(self.inner.depth, None, Instance::from_arc(instance)),
        );
        Ok(())
    }

    /// Creates a child scope one level deeper.
    ///
    /// The parent only keeps a tracking handle for cascade disposal; the
    /// child owns the upward chain.
    pub fn create_subscope(&self) -> Result<Scope, ScopeError> {
        self.inner.check_not_disposed()?;
        let child = Arc::new(ScopeInner {
            parent: Some(self.inner.clone()),
            registry: self.inner.registry.clone(),
            depth: self.inner.depth + 1,
            disposed: AtomicBool::new(false),
            instances: RwLock::new(HashMap::new()),
            children: Mutex::new(Vec::new()),
        });
        lock(&self.inner.children).push(Arc::downgrade(&child));
        Ok(Scope { inner: child })
    }

    /// Disposes all live subscopes, then this scope.
    ///
    /// Cached instances are released with the scope, so anything whose only
    /// owner was this cache is dropped. Every further operation on a disposed
    /// scope fails.
    pub fn dispose(&self) -> Result<(), ScopeError> {
        self.inner.check_not_disposed()?;
        dispose_inner(&self.inner);
        Ok(())
    }

    /// Resolves the factory responsible for a long-lived capability type and
    /// invokes it with this scope.
    ///
    /// Unlike ordinary lookups a missing registration is fatal: it means the
    /// registry was assembled without the capability, not that the dependency
    /// is legitimately absent.
    pub fn capability<T: Injectable>(&self) -> Result<Arc<T>, ScopeError> {
        self.inner.check_not_disposed()?;
        let info = TypeInfo::of::<T>();
        let factory = self.inner.registry.scope_factory(info)?;
        let instance = (factory.create)(self).map_err(|error| ScopeError::Construction {
            type_name: info.type_name,
            error,
        })?;
        downcast::<T>(instance)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = read_lock(&self.inner.instances)
            .keys()
            .map(ToString::to_string)
            .collect();
        keys.sort();
        f.debug_struct("Scope")
            .field("depth", &self.inner.depth)
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .field("instances", &keys)
            .finish()
    }
}

/// Lookup handle passed to factory construction bodies.
///
/// It exposes the requesting scope's lookup surface while keeping nested
/// resolution on the chain that is currently being constructed, so the
/// depths of consumed dependencies flow back into the object's placement.
pub struct Resolver<'a> {
    inner: &'a Arc<ScopeInner>,
    chain: &'a InstantiationContext,
}

impl Resolver<'_> {
    pub fn get_optional<T: Injectable>(
        &self,
        classifier: &str,
    ) -> Result<Option<Arc<T>>, ScopeError> {
        self.inner.check_not_disposed()?;
        get_optional_on::<T>(self.inner, classifier, self.chain)
    }

    pub fn get_single<T: Injectable>(&self, classifier: &str) -> Result<Arc<T>, ScopeError> {
        self.inner.check_not_disposed()?;
        get_single_on::<T>(self.inner, classifier, self.chain)
    }

    pub fn get_many<T: Injectable>(&self, classifier: &str) -> Result<Vec<Arc<T>>, ScopeError> {
        self.inner.check_not_disposed()?;
        get_many_on::<T>(self.inner, classifier, self.chain)
    }

    /// The scope the construction was requested from, e.g. for keeping a
    /// handle inside the constructed object
    pub fn scope(&self) -> Scope {
        Scope {
            inner: self.inner.clone(),
        }
    }
}

fn get_optional_on<T: Injectable>(
    inner: &Arc<ScopeInner>,
    classifier: &str,
    chain: &InstantiationContext,
) -> Result<Option<Arc<T>>, ScopeError> {
    let instance = resolve_one(
        inner,
        TypeInfo::of::<T>(),
        classifier,
        Cardinality::Optional,
        chain,
    )?;
    instance.map(downcast::<T>).transpose()
}

fn get_single_on<T: Injectable>(
    inner: &Arc<ScopeInner>,
    classifier: &str,
    chain: &InstantiationContext,
) -> Result<Arc<T>, ScopeError> {
    let instance = resolve_one(
        inner,
        TypeInfo::of::<T>(),
        classifier,
        Cardinality::Single,
        chain,
    )?
    .expect("mandatory resolution yielded no instance");
    downcast::<T>(instance)
}

fn get_many_on<T: Injectable>(
    inner: &Arc<ScopeInner>,
    classifier: &str,
    chain: &InstantiationContext,
) -> Result<Vec<Arc<T>>, ScopeError> {
    let info = TypeInfo::of::<T>();
    let factories = inner
        .registry
        .many(info, classifier, &mut |factory| {
            selector_passes(inner, chain, factory)
        })?;
    if factories.is_empty() {
        return Ok(Vec::new());
    }

    let key = InstanceKey::new(info, classifier);
    let mut objects = Vec::with_capacity(factories.len());
    for (id, factory) in factories {
        let instance = resolve_instance(
            inner,
            &key,
            Some((id, factory)),
            Cardinality::Many,
            chain,
        )?
        .expect("factory-backed resolution yielded no instance");
        objects.push(downcast::<T>(instance)?);
    }
    Ok(objects)
}

fn resolve_one(
    inner: &Arc<ScopeInner>,
    info: TypeInfo,
    classifier: &str,
    cardinality: Cardinality,
    chain: &InstantiationContext,
) -> Result<Option<Instance>, ScopeError> {
    let factory = inner
        .registry
        .single_or_none(info, classifier, &mut |factory| {
            selector_passes(inner, chain, factory)
        })?;
    let key = InstanceKey::new(info, classifier);
    resolve_instance(inner, &key, factory, cardinality, chain)
}

/// Decides whether a candidate factory applies to the current lookup.
///
/// The filter object is itself resolved through the scope chain, on the same
/// instantiation chain, so filters can be bound per scope and their own
/// placement is accounted for.
fn selector_passes(
    inner: &Arc<ScopeInner>,
    chain: &InstantiationContext,
    factory: &InstanceFactory,
) -> Result<bool, ScopeError> {
    let Some(selector) = &factory.selector else {
        return Ok(true);
    };
    let filter = match get_single_on::<SelectorFilter>(inner, &selector.name, chain) {
        Ok(filter) => filter,
        Err(ScopeError::NotFound { .. }) => {
            return Err(ScopeError::MissingSelector {
                type_name: factory.info.type_name,
                selector: selector.name.clone(),
            });
        }
        Err(other) => return Err(other),
    };
    Ok(filter.filter(selector))
}

/// Core of the resolution algorithm, shared by all cardinalities.
fn resolve_instance(
    inner: &Arc<ScopeInner>,
    key: &InstanceKey,
    factory: Option<(FactoryId, &InstanceFactory)>,
    cardinality: Cardinality,
    chain: &InstantiationContext,
) -> Result<Option<Instance>, ScopeError> {
    let Some((factory_id, factory)) = factory else {
        // Without a factory only an explicit binding or a previously placed
        // instance can satisfy the key; nearest scope wins.
        let Some(entry) = find_deep_entry(inner, key) else {
            if cardinality == Cardinality::Single {
                return Err(ScopeError::NotFound {
                    type_name: key.info.type_name,
                    classifier: key.classifier.clone(),
                });
            }
            return Ok(None);
        };
        chain.on_dependency_found(entry.depth);
        return entry.single(key).map(Some);
    };

    let keep_in_scope = factory.scoping != Scoping::Unscoped;
    if keep_in_scope {
        if let Some(entry) = find_deep_entry(inner, key) {
            match cardinality {
                Cardinality::Optional | Cardinality::Single => {
                    chain.on_dependency_found(entry.depth);
                    return entry.single(key).map(Some);
                }
                Cardinality::Many => {
                    // Reuse only this factory's own contribution; other
                    // factories of the key still get evaluated.
                    if let Some(instance) = entry.contributed_by(factory_id) {
                        return Ok(Some(instance));
                    }
                }
            }
        }
    }

    chain.begin(key)?;
    let resolver = Resolver { inner, chain };
    let created = (factory.create)(&resolver);
    let mut object_depth = chain.end();

    let instance = match created {
        Ok(instance) => instance,
        // Failures of the runtime itself pass through untouched; everything
        // else is a construction failure of this factory.
        Err(error) => {
            return Err(match error.downcast::<ScopeError>() {
                Ok(scope_error) => *scope_error,
                Err(error) => ScopeError::Construction {
                    type_name: key.info.type_name,
                    error,
                },
            });
        }
    };

    if factory.scoping == Scoping::Direct {
        object_depth = inner.depth;
    }
    chain.on_dependency_found(object_depth);

    if keep_in_scope {
        tracing::debug!("Constructed instance of {key}, placed at depth {object_depth}");
        register_instance_in_scope(inner, key, object_depth, Some(factory_id), instance.clone());

        for sibling in &factory.siblings {
            let sibling_key = InstanceKey::new(sibling.info, &key.classifier);
            let view = (sibling.view)(&instance);
            register_instance_in_scope(
                inner,
                &sibling_key,
                object_depth,
                Some(sibling.factory),
                view,
            );
        }
    } else {
        tracing::debug!("Constructed unscoped instance of {key}");
    }

    Ok(Some(instance))
}

/// Nearest cache entry for the key, walking from this scope to the root
fn find_deep_entry(inner: &ScopeInner, key: &InstanceKey) -> Option<CacheEntry> {
    let mut scope: &ScopeInner = inner;
    loop {
        if let Some(entry) = read_lock(&scope.instances).get(key) {
            return Some(entry.clone());
        }
        scope = scope.parent.as_deref()?;
    }
}

/// Places an instance at the ancestor whose depth matches, merging into an
/// existing entry for the key rather than overwriting it.
fn register_instance_in_scope(
    inner: &ScopeInner,
    key: &InstanceKey,
    depth: usize,
    factory: Option<FactoryId>,
    instance: Instance,
) {
    let mut scope: &ScopeInner = inner;
    loop {
        if scope.depth == depth {
            let mut instances = write_lock(&scope.instances);
            match instances.get_mut(key) {
                Some(entry) => entry.register(factory, instance),
                None => {
                    instances.insert(key.clone(), CacheEntry::new(depth, factory, instance));
                }
            }
            return;
        }
        // Placement depth is bounded by the requesting scope's depth, so the
        // walk always terminates at a real ancestor.
        scope = scope
            .parent
            .as_deref()
            .expect("placement depth above the root scope");
    }
}

fn dispose_inner(inner: &Arc<ScopeInner>) {
    // Children go first, each exactly once; scopes disposed earlier have
    // already removed themselves from the tracking list.
    let children = std::mem::take(&mut *lock(&inner.children));
    for child in children {
        if let Some(child) = child.upgrade() {
            dispose_inner(&child);
        }
    }

    inner.disposed.store(true, Ordering::Release);
    write_lock(&inner.instances).clear();
    tracing::debug!("Disposed scope at depth {}", inner.depth);

    if let Some(parent) = &inner.parent {
        lock(&parent.children).retain(|tracked| {
            tracked
                .upgrade()
                .is_some_and(|tracked| !Arc::ptr_eq(&tracked, inner))
        });
    }
}

fn downcast<T: Injectable>(instance: Instance) -> Result<Arc<T>, ScopeError> {
    instance
        .downcast::<T>()
        .map_err(|actual_type| ScopeError::DowncastFailed {
            required_type: std::any::type_name::<T>(),
            actual_type,
        })
}

// A factory panicking mid-construction must not wedge the scope tree.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
