use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// All factory failures are carried as boxed errors
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Scopes may be shared between threads, so anything injectable
/// needs to be Send + Sync and have a static lifetime.
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Classifier constants
pub mod classifier {
    /// Classifier of unqualified bindings
    pub const NONE: &str = "";
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Key under which an instance is discoverable in a scope: type plus classifier
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct InstanceKey {
    pub info: TypeInfo,
    pub classifier: String,
}

impl InstanceKey {
    pub fn new(info: TypeInfo, classifier: &str) -> Self {
        InstanceKey {
            info,
            classifier: classifier.to_owned(),
        }
    }

    pub fn of<T: 'static + ?Sized>(classifier: &str) -> Self {
        Self::new(TypeInfo::of::<T>(), classifier)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.classifier.is_empty() {
            f.write_str(self.info.type_name)
        } else {
            write!(f, "{}@{}", self.classifier, self.info.type_name)
        }
    }
}

/// Shared handle to a constructed object
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    instance: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Injectable>(instance: T) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance: Arc::new(instance),
        }
    }

    /// Wraps an already shared object without constructing anything new.
    /// This is how one physical object becomes discoverable under a second key.
    pub fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }
}
