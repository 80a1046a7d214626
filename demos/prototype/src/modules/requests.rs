use std::sync::Arc;

use kapsel_di::{classifier, InstanceFactory, RegistryBuilder};

/// Identifier bound into each request subscope by the host
pub struct RequestId(pub String);

/// Connection handle shared by all requests
pub struct Database {
    name: &'static str,
}

/// Request-level service, pinned to the request subscope by its
/// [RequestId] dependency
pub struct RequestLog {
    id: Arc<RequestId>,
    database: Arc<Database>,
}

impl RequestLog {
    pub fn describe(&self) -> String {
        format!("request {} logged to {}", self.id.0, self.database.name)
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.factory(InstanceFactory::new(|_| Ok(Database { name: "demo-db" })));
    builder.factory(InstanceFactory::new(|resolver| {
        Ok(RequestLog {
            id: resolver.get_single::<RequestId>(classifier::NONE)?,
            database: resolver.get_single::<Database>(classifier::NONE)?,
        })
    }));
}
