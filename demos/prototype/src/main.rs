use std::sync::Arc;

use kapsel_di::{classifier, Scope, SelectorFilter};

use crate::modules::{
    pages::Page,
    requests::{RequestId, RequestLog},
};

mod modules;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let root = Scope::root(Arc::new(modules::build_registry()));

    // The audience filter decides which page factories apply; pass --admin
    // to light up the operations page.
    let admin_enabled = std::env::args().any(|arg| arg == "--admin");
    root.bind(
        SelectorFilter::new(move |selector| {
            !selector.args.iter().any(|arg| arg == "admin") || admin_enabled
        }),
        "audience",
    )
    .expect("fresh scope");

    for page in root.get_many::<Page>(classifier::NONE).expect("page lookup") {
        println!("{}", page.render());
    }

    // One subscope per request: the bound request id pins request-level
    // services to the subscope, everything else stays cached at the root.
    for request in ["alpha", "beta"] {
        let scope = root.create_subscope().expect("live root");
        scope
            .bind(RequestId(request.to_owned()), classifier::NONE)
            .expect("fresh scope");

        let log = scope
            .get_single::<RequestLog>(classifier::NONE)
            .expect("request log");
        println!("{}", log.describe());

        scope.dispose().expect("first dispose");
    }
}
