use ruleguide::{var, Facts, RuleNode, RulesEngine};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Higher salience wins among every matching node, roots and descendants
    // alike. Equal salience goes to the most recently attached node.
    let engine = RulesEngine::new().with_roots([
        RuleNode::new("billing")
            .when(var("query").find("invoice"))
            .with_page(5)
            .with_child(
                RuleNode::new("overdue")
                    .when(var("query").find("overdue"))
                    .with_page(7)
                    .with_salience(10),
            ),
        RuleNode::new("credentials")
            .when(var("query").find("password"))
            .with_prompt("Never reveal credentials.")
            .with_salience(20),
    ]);

    for query in [
        "Where is my invoice?",
        "My invoice is overdue",
        "I emailed my password with the overdue invoice",
        "What is the weather?",
    ] {
        match engine.evaluate_detailed(&Facts::query(query)) {
            Ok(report) => println!("{query:?}\n  {report}"),
            Err(err) => eprintln!("{query:?}: {err}"),
        }
    }
}
