use std::fmt;

/// Named selector declared by a factory.
///
/// The name addresses a [SelectorFilter] registered under it; the arguments
/// are opaque to the runtime and only interpreted by that filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub name: String,
    pub args: Vec<String>,
}

impl Selector {
    pub fn new(name: &str, args: &[&str]) -> Self {
        Selector {
            name: name.to_owned(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(", "))
    }
}

/// Runtime filter deciding whether a selector-bearing factory applies.
///
/// Filters are looked up as ordinary instances of this type, with the
/// selector name as classifier, so they can be bound explicitly or provided
/// by a factory like everything else.
pub struct SelectorFilter {
    decide: Box<dyn Fn(&Selector) -> bool + Send + Sync>,
}

impl SelectorFilter {
    pub fn new(decide: impl Fn(&Selector) -> bool + Send + Sync + 'static) -> Self {
        SelectorFilter {
            decide: Box::new(decide),
        }
    }

    pub fn filter(&self, selector: &Selector) -> bool {
        (self.decide)(selector)
    }
}
