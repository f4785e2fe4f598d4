use winnow::ascii::{dec_int, dec_uint, till_line_ending};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated_pair};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::{CompareOp, Condition, Operand, Outcome, Value};

use super::parser::{ParsedRules, RuleDecl};

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

// -- Identifiers ------------------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        }),
    )
        .take()
        .parse_next(input)
}

// -- Literals ---------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn number(input: &mut &str) -> ModalResult<Value> {
    let text = (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
    )
        .take()
        .parse_next(input)?;
    if text.contains('.') {
        let f: f64 = text
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Float(f))
    } else {
        let i: i64 = text
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Int(i))
    }
}

fn operand(input: &mut &str) -> ModalResult<Operand> {
    ws.parse_next(input)?;
    alt((
        string_literal.map(|s| Operand::Literal(Value::String(s))),
        number.map(Operand::Literal),
        ident.map(|name: &str| match name {
            "true" => Operand::Literal(Value::Bool(true)),
            "false" => Operand::Literal(Value::Bool(false)),
            path => Operand::Var {
                var: path.to_owned(),
            },
        }),
    ))
    .context(expected("operand"))
    .parse_next(input)
}

// -- Conditions -------------------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .parse_next(input)
}

/// `name(operand, operand)`
fn call_condition(input: &mut &str) -> ModalResult<Condition> {
    let name = ident.parse_next(input)?;
    ws.parse_next(input)?;
    '('.parse_next(input)?;
    let (left, right) = cut_err(separated_pair(operand, (ws, ','), operand))
        .context(expected("two operands"))
        .parse_next(input)?;
    (ws, cut_err(')')).parse_next(input)?;
    Ok(Condition::new(name, left, right))
}

/// `operand OP operand`
fn infix_condition(input: &mut &str) -> ModalResult<Condition> {
    let left = operand.parse_next(input)?;
    let op = compare_op.parse_next(input)?;
    let right = cut_err(operand).parse_next(input)?;
    Ok(Condition::new(op.symbol(), left, right))
}

fn condition(input: &mut &str) -> ModalResult<Condition> {
    ws.parse_next(input)?;
    alt((call_condition, infix_condition)).parse_next(input)
}

// -- Rule definitions -------------------------------------------------------

enum Header {
    Extends(String),
    Salience(i64),
}

fn header(input: &mut &str) -> ModalResult<Header> {
    ws.parse_next(input)?;
    alt((
        preceded(("extends", ws), cut_err(string_literal))
            .context(expected("parent rule name"))
            .map(Header::Extends),
        preceded(("salience", ws), cut_err(dec_int::<_, i64, _>))
            .context(expected("salience"))
            .map(Header::Salience),
    ))
    .parse_next(input)
}

enum Action {
    Page(u32),
    Prompt(String),
}

fn action(input: &mut &str) -> ModalResult<Action> {
    ws.parse_next(input)?;
    alt((
        preceded(("page", ws), cut_err(dec_uint::<_, u32, _>))
            .context(expected("page number"))
            .map(Action::Page),
        preceded(("prompt", ws), cut_err(string_literal))
            .context(expected("prompt text"))
            .map(Action::Prompt),
    ))
    .parse_next(input)
}

fn rule_def(input: &mut &str) -> ModalResult<RuleDecl> {
    ws.parse_next(input)?;
    "rule".parse_next(input)?;
    ws.parse_next(input)?;

    let name = cut_err(string_literal)
        .context(expected("rule name"))
        .parse_next(input)?;

    let headers: Vec<Header> = repeat(0.., header).parse_next(input)?;
    let mut parent = None;
    let mut salience = 0;
    for h in headers {
        match h {
            Header::Extends(p) => parent = Some(p),
            Header::Salience(s) => salience = s,
        }
    }

    ws.parse_next(input)?;
    let conditions: Vec<Condition> = opt(preceded("when", repeat(0.., condition)))
        .parse_next(input)?
        .unwrap_or_default();

    ws.parse_next(input)?;
    let actions: Vec<Action> = delimited(
        cut_err("then").context(expected("'then'")),
        repeat(0.., action),
        (ws, cut_err("end").context(expected("'end'"))),
    )
    .parse_next(input)?;

    let mut outcome = Outcome::default();
    for a in actions {
        match a {
            Action::Page(page) => outcome.page = Some(page),
            Action::Prompt(prompt) => outcome.prompt = Some(prompt),
        }
    }

    Ok(RuleDecl {
        name,
        parent,
        salience,
        conditions,
        outcome,
    })
}

// -- Top-level parser -------------------------------------------------------

pub fn parse_rules(input: &mut &str) -> ModalResult<ParsedRules> {
    let rules: Vec<RuleDecl> = repeat(0.., rule_def).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(ParsedRules { rules })
}
