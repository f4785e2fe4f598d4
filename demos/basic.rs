use ruleguide::{var, Facts, RuleNode, RulesEngine};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Define rules
    let engine = RulesEngine::new().with_roots([RuleNode::new("Invoices")
        .when(var("query").find("invoice"))
        .with_page(5)
        .with_prompt("Answer from the billing section.")]);

    println!("{engine}");

    // Evaluate against a query
    for query in ["Where is my invoice?", "Where is my receipt?"] {
        match engine.evaluate(&Facts::query(query)) {
            Ok(Some(outcome)) => println!("{query:?} -> {outcome}"),
            Ok(None) => println!("{query:?} -> no rule matched"),
            Err(err) => eprintln!("{query:?} -> {err}"),
        }
    }
}
