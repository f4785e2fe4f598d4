mod error;
mod grammar;
mod parser;

pub use error::ParseError;
pub use parser::{ParsedRules, RuleDecl};

/// Parse rule-language source into declarations, in source order.
///
/// Nothing is validated beyond syntax; see [`compile::forest`](crate::compile::forest).
///
/// # Errors
///
/// Returns [`ParseError`] with the failing line and column if the input is
/// not valid rule syntax.
pub fn parse(input: &str) -> Result<ParsedRules, ParseError> {
    use winnow::Parser;
    grammar::parse_rules
        .parse(input)
        .map_err(|e| ParseError::at(input, e.offset(), e.inner().to_string()))
}
