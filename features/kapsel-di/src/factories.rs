use std::fmt;

use crate::{
    scope::{Resolver, Scope},
    selector::Selector,
    types::{DynError, Injectable, Instance, TypeInfo},
};

/// Scoping policy of a factory, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scoping {
    /// Cached at the computed placement depth
    #[default]
    Scoped,
    /// Never cached, every lookup constructs anew
    Unscoped,
    /// Cached at the depth of the scope the lookup was made from
    Direct,
}

/// Identity of a factory within its registry.
///
/// Assigned in registration order and stable for the lifetime of the
/// registry; caches use it to remember which factory contributed an
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactoryId(pub(crate) usize);

pub(crate) type CreateFn = Box<dyn Fn(&Resolver<'_>) -> Result<Instance, DynError> + Send + Sync>;
pub(crate) type ViewFn = Box<dyn Fn(&Instance) -> Instance + Send + Sync>;

/// Sibling link: constructing through the owning factory also registers the
/// object under this type, surfaced through the view.
pub(crate) struct SiblingType {
    pub(crate) info: TypeInfo,
    pub(crate) factory: FactoryId,
    pub(crate) view: ViewFn,
}

/// A factory providing instances of one (type, classifier) binding.
///
/// Factories are plain values: the scoping policy, the optional selector and
/// the sibling links are data, the construction body is a boxed closure
/// receiving the requesting scope.
pub struct InstanceFactory {
    pub(crate) info: TypeInfo,
    pub(crate) classifier: String,
    pub(crate) scoping: Scoping,
    pub(crate) selector: Option<Selector>,
    pub(crate) siblings: Vec<SiblingType>,
    pub(crate) create: CreateFn,
}

impl InstanceFactory {
    pub fn new<T: Injectable>(
        create: impl Fn(&Resolver<'_>) -> Result<T, DynError> + Send + Sync + 'static,
    ) -> Self {
        InstanceFactory {
            info: TypeInfo::of::<T>(),
            classifier: String::new(),
            scoping: Scoping::default(),
            selector: None,
            siblings: Vec::new(),
            create: Box::new(move |resolver| create(resolver).map(Instance::new)),
        }
    }

    pub fn with_classifier(mut self, classifier: &str) -> Self {
        self.classifier = classifier.to_owned();
        self
    }

    pub fn with_scoping(mut self, scoping: Scoping) -> Self {
        self.scoping = scoping;
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Type info about the factory's provided type
    pub fn type_info(&self) -> TypeInfo {
        self.info
    }

    pub fn scoping(&self) -> Scoping {
        self.scoping
    }
}

impl fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("info", &self.info)
            .field("classifier", &self.classifier)
            .field("scoping", &self.scoping)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

/// Factory responsible for one long-lived capability type.
///
/// Unlike ordinary factories these are looked up through a dedicated map;
/// a missing entry means the registry build is incomplete.
pub struct ScopeFactory {
    pub(crate) info: TypeInfo,
    pub(crate) create: Box<dyn Fn(&Scope) -> Result<Instance, DynError> + Send + Sync>,
}

impl ScopeFactory {
    pub fn new<T: Injectable>(
        create: impl Fn(&Scope) -> Result<T, DynError> + Send + Sync + 'static,
    ) -> Self {
        ScopeFactory {
            info: TypeInfo::of::<T>(),
            create: Box::new(move |scope| create(scope).map(Instance::new)),
        }
    }
}

impl fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFactory")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
