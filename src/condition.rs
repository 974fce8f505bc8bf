//! MSBuild conditions.
//!
//! Two halves live here:
//!
//! - the **dimension codec**, a strict bidirectional mapping between a
//!   [`DimensionVector`] and the canonical configuration condition
//!   `'$(Configuration)|$(Platform)'=='Debug|AnyCPU'`;
//! - a general condition **parser and evaluator** used by the flat project
//!   loader, for example:
//!   - `'$(Configuration)|$(Platform)' == 'Debug|AnyCPU'`
//!   - `('$(Platform)'=='x86' and '$(Prefer32Bit)'=='true') or '$(Force)'!=''`
//!   - `Exists('packages.config')`
//!
//! Uses [`chumsky`] for the parsing grammar.
//!
//! ## Grammar (case-insensitive keywords)
//!
//! ```text
//! condition   = conjunction ('or' conjunction)*
//! conjunction = atom ('and' atom)*
//! atom        = operand ('==' | '!=') operand
//!             | 'Exists' '(' operand ')'
//!             | '(' condition ')'
//! operand     = "'" [^']* "'"
//! ```

use chumsky::prelude::*;
use std::collections::HashMap;

use crate::snapshot::DimensionVector;

// ═══════════════════════════════════════════════════════════════════════════════
//  Dimension codec
// ═══════════════════════════════════════════════════════════════════════════════

/// Build `'$(K1)|$(K2)'=='V1|V2'` from a dimension vector, in key order.
/// An empty vector yields the empty (unconditional) condition.
///
/// `|` separates dimensions, so the result only decodes back to
/// `dimensions` when [`is_encodable`] holds.
pub fn to_condition(dimensions: &DimensionVector) -> String {
    if dimensions.is_empty() {
        return String::new();
    }

    let names: Vec<String> = dimensions.names().map(|n| format!("$({n})")).collect();
    let values: Vec<&str> = dimensions.values().collect();
    format!("'{}'=='{}'", names.join("|"), values.join("|"))
}

/// Whether [`from_condition`] recovers `dimensions` from [`to_condition`]:
/// every name must be a valid `$(Name)` body and no value may contain `|`.
pub fn is_encodable(dimensions: &DimensionVector) -> bool {
    dimensions.iter().all(|(name, value)| {
        !name.is_empty() && !name.contains(['$', '(', ')', '|', '=', '\'']) && !value.contains('|')
    })
}

/// Decode a configuration condition back into a dimension vector.
///
/// A blank condition is unconditional and decodes to an empty vector.
/// Anything that is not exactly a quoted `$(Name)|…` list compared with `==`
/// to a quoted value list of the same length yields `None`; callers treat
/// such scopes as unsupported and leave them alone.
pub fn from_condition(condition: &str) -> Option<DimensionVector> {
    let condition = condition.trim();
    if condition.is_empty() {
        return Some(DimensionVector::new());
    }

    let eq = condition.find("==")?;
    if eq == 0 {
        return None;
    }

    let lhs = unquote(condition[..eq].trim())?;
    let rhs = unquote(condition[eq + 2..].trim())?;

    let names: Vec<&str> = lhs.split('|').collect();
    let values: Vec<&str> = rhs.split('|').collect();
    if names.is_empty() || names.len() != values.len() {
        return None;
    }

    let mut dimensions = DimensionVector::new();
    for (token, value) in names.into_iter().zip(values) {
        let name = property_reference(token)?;
        if dimensions.contains(name) {
            return None;
        }
        dimensions.insert(name, value);
    }

    Some(dimensions)
}

/// Human-readable configuration label: the values joined with `|`
/// (`Debug|AnyCPU`).
pub fn dimension_vector_to_label(dimensions: &DimensionVector) -> String {
    dimensions.values().collect::<Vec<_>>().join("|")
}

/// Strip one pair of surrounding single quotes.
fn unquote(side: &str) -> Option<&str> {
    if side.len() < 2 {
        return None;
    }
    side.strip_prefix('\'')?.strip_suffix('\'')
}

/// Match a token of exactly the form `$(Name)` and return `Name`.
fn property_reference(token: &str) -> Option<&str> {
    let name = token.strip_prefix("$(")?.strip_suffix(')')?;
    if name.is_empty() || name.contains(['$', '(', ')']) {
        return None;
    }
    Some(name)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Expression tree
// ═══════════════════════════════════════════════════════════════════════════════

/// A `Condition` attribute as the loader understands it.
///
/// Property functions (`$([MSBuild]::…)`), `!` and numeric comparisons are
/// not part of the grammar; a condition using them fails to parse.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `'$(Configuration)|$(Platform)' == 'Debug|AnyCPU'`
    Compare {
        lhs: Vec<Fragment>,
        op: CompareOp,
        rhs: Vec<Fragment>,
    },
    /// `Exists('packages.config')`; always true, nothing is read from disk.
    Exists(Vec<Fragment>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
}

/// Piece of a quoted operand or of a property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    /// `$(Name)`, looked up at evaluation time.
    Property(String),
}

/// Split `bin\$(Configuration)\` into text and `$(…)` references.
///
/// An unterminated `$(` takes the rest of the input as the property name.
pub fn split_fragments(s: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut rest = s;

    while let Some(start) = rest.find("$(") {
        if start > 0 {
            fragments.push(Fragment::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find(')').unwrap_or(after.len());
        fragments.push(Fragment::Property(after[..end].to_string()));
        rest = after.get(end + 1..).unwrap_or("");
    }

    if !rest.is_empty() {
        fragments.push(Fragment::Text(rest.to_string()));
    }
    fragments
}

/// Concatenate `fragments`, replacing each reference by its value in `vars`
/// (keyed by lower-cased name).  Unknown properties are empty.
pub(crate) fn expand(fragments: &[Fragment], vars: &HashMap<String, String>) -> String {
    let mut out = String::new();
    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => out.push_str(text),
            Fragment::Property(name) => {
                if let Some(value) = vars.get(&name.trim().to_ascii_lowercase()) {
                    out.push_str(value);
                }
            }
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Grammar
// ═══════════════════════════════════════════════════════════════════════════════

type ParseError<'a> = extra::Err<Simple<'a, char>>;

/// `and`, `Or`, `EXISTS`, … in any case.
fn keyword<'a>(word: &'static str) -> impl Parser<'a, &'a str, (), ParseError<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .repeated()
        .at_least(1)
        .to_slice()
        .filter(move |s: &&str| s.eq_ignore_ascii_case(word))
        .ignored()
        .padded()
}

/// `'…'`, split into fragments.  MSBuild has no escape for `'` inside.
fn operand<'a>() -> impl Parser<'a, &'a str, Vec<Fragment>, ParseError<'a>> + Clone {
    none_of('\'')
        .repeated()
        .to_slice()
        .delimited_by(just('\''), just('\''))
        .map(split_fragments)
        .padded()
}

fn condition_parser<'a>() -> impl Parser<'a, &'a str, Expression, ParseError<'a>> {
    recursive(|expr| {
        let op = choice((just("==").to(CompareOp::Equal), just("!=").to(CompareOp::NotEqual))).padded();
        let compare = operand()
            .then(op)
            .then(operand())
            .map(|((lhs, op), rhs)| Expression::Compare { lhs, op, rhs });

        let exists = keyword("exists")
            .ignore_then(operand().delimited_by(just('(').padded(), just(')').padded()))
            .map(Expression::Exists);

        let nested = expr.delimited_by(just('(').padded(), just(')').padded());
        let atom = choice((compare, exists, nested));

        // `and` binds tighter than `or`.
        let conjunction = atom.clone().foldl(keyword("and").ignore_then(atom).repeated(), |a, b| {
            Expression::And(Box::new(a), Box::new(b))
        });
        conjunction.clone().foldl(keyword("or").ignore_then(conjunction).repeated(), |a, b| {
            Expression::Or(Box::new(a), Box::new(b))
        })
    })
}

/// Parse a `Condition` attribute.  The error is a readable message listing
/// what the grammar expected.
pub fn parse_condition(input: &str) -> Result<Expression, String> {
    condition_parser().parse(input).into_result().map_err(|errors| {
        let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
        format!("cannot parse condition '{input}': {}", reasons.join("; "))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Evaluation
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluate `expr` with `vars` keyed by lower-cased property name.
/// Comparisons ignore ASCII case.
pub fn evaluate(expr: &Expression, vars: &HashMap<String, String>) -> bool {
    match expr {
        Expression::Compare { lhs, op, rhs } => {
            let equal = expand(lhs, vars).eq_ignore_ascii_case(&expand(rhs, vars));
            match op {
                CompareOp::Equal => equal,
                CompareOp::NotEqual => !equal,
            }
        }
        Expression::Exists(_) => true,
        Expression::And(a, b) => evaluate(a, vars) && evaluate(b, vars),
        Expression::Or(a, b) => evaluate(a, vars) || evaluate(b, vars),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
