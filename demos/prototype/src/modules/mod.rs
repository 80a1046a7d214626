pub mod pages;
pub mod requests;

use kapsel_di::{FactoryRegistry, RegistryBuilder};

/// Assembles the demo registry.
///
/// In a full application this is the host's single registration step at
/// startup; every module funnels its factories through the one builder.
pub fn build_registry() -> FactoryRegistry {
    let mut builder = RegistryBuilder::new();
    pages::register(&mut builder);
    requests::register(&mut builder);
    builder.build()
}
