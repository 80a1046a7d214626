use kapsel_di::{InstanceFactory, RegistryBuilder, Selector};

/// A renderable page of the demo application
pub struct Page {
    pub title: &'static str,
    pub audience: &'static str,
}

impl Page {
    pub fn render(&self) -> String {
        format!("[{}] {}", self.audience, self.title)
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.factory(
        InstanceFactory::new(|_| {
            Ok(Page {
                title: "Welcome",
                audience: "public",
            })
        })
        .with_selector(Selector::new("audience", &["public"])),
    );
    builder.factory(
        InstanceFactory::new(|_| {
            Ok(Page {
                title: "Operations",
                audience: "admin",
            })
        })
        .with_selector(Selector::new("audience", &["admin"])),
    );
}
