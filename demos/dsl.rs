use std::sync::Arc;

use ruleguide::{compile, parse, route, PredicateRegistry, RuleStore};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ruleguide::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let source = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/support.rules"))?;
    let roots = compile::forest(parse::parse(&source)?.rules)?;

    // Persist the compiled forest, then route queries from what the store holds.
    let mut store = RuleStore::open_in_memory()?;
    for root in &roots {
        store.insert_root(root)?;
    }
    println!("stored {} rules", store.count()?);

    let predicates = Arc::new(PredicateRegistry::new());
    for query in [
        "Can I get a copy of my invoice?",
        "My invoice is overdue",
        "I forgot my password",
        "It is hot with low humidity today",
        "Tell me a joke",
    ] {
        let retrieval = route(store.load_roots()?, query, Arc::clone(&predicates));
        println!("{query:?} -> {retrieval}");
    }

    Ok(())
}
