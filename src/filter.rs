//! SCIM 2.0 filter expressions.
//!
//! Parser, validator, and serializer for filter expressions per RFC 7644
//! Section 3.4.2.2.
//!
//! ## Grammar (simplified)
//!
//! ```text
//! filter     = logExpr
//! logExpr    = andExpr { "or" andExpr }
//! andExpr    = notExpr { "and" notExpr }
//! notExpr    = ["not"] ( "(" filter ")" | valuePath | attrExpr )
//! attrExpr   = attrRep "pr" | attrRep compareOp compValue
//! valuePath  = attrRep "[" filter "]"          ; one level only
//! compareOp  = "eq" | "ne" | "co" | "sw" | "ew" | "gt" | "ge" | "lt" | "le"
//! compValue  = "true" | "false" | "null" | NUMBER | STRING
//! ```
//!
//! Keywords are case-insensitive; quoted strings are inert (operators and
//! keywords inside them never fire).
//!
//! ## Parsing strategy
//!
//! String literals and balanced `attr[...]`/`(...)` spans are replaced with
//! placeholder tokens (see [`crate::tokens`]) before the text is split on
//! `or` and `and`, so splitting is a flat word-boundary scan at every
//! nesting level. Malformed operands do not abort their siblings:
//! diagnostics accumulate across the whole expression and the parse fails
//! as a whole iff any of them is an error.
//!
//! ## Security limits
//!
//! To bound memory and CPU on malicious input:
//! - Maximum expression length: 4096 bytes
//! - Maximum nesting depth: 32 levels
//!
//! ## Examples
//!
//! ```text
//! userName eq "john"
//! name.familyName co "doe"
//! emails[type eq "work" and primary eq true]
//! userName eq "john" and not (active eq false)
//! ```

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::attrs::AttrRep;
use crate::issues::{IssueCode, Issues, Location};
use crate::op::{CompValue, CompareOp, Operator};
use crate::tokens::{self, BracketScan, ParenScan, TokenEntry, TokenKind, TokenTable};

/// Maximum allowed length of a filter or patch-path expression (bytes).
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Maximum allowed nesting depth of parenthesized groups and
/// complex-attribute brackets.
pub const MAX_EXPRESSION_DEPTH: usize = 32;

static OR_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bor\b").unwrap());
static AND_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\band\b").unwrap());
static NOT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^not\b").unwrap());

/// A parsed SCIM filter expression.
///
/// Immutable once constructed; safe to share and evaluate concurrently.
/// `Display` regenerates canonical filter text: re-parsing the rendered
/// text yields a structurally identical filter (whitespace and quoting
/// style are not preserved).
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    root: Operator,
}

impl Filter {
    /// Parse a filter expression.
    ///
    /// On failure every defect found is reported, each anchored to the
    /// operand path of the offending sub-expression; no partial filter is
    /// ever returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use scim_expr::Filter;
    ///
    /// let filter = Filter::parse("userName eq \"john\"").unwrap();
    /// let filter = Filter::parse("active eq true and emails pr").unwrap();
    /// ```
    pub fn parse(input: &str) -> Result<Filter, Issues> {
        debug!(len = input.len(), "parsing SCIM filter expression");

        let mut issues = Issues::new();
        if input.len() > MAX_EXPRESSION_LENGTH {
            issues.add_error(
                IssueCode::ExpressionTooLong,
                Location::root(),
                format!("{} bytes (max {})", input.len(), MAX_EXPRESSION_LENGTH),
            );
            return Err(issues);
        }
        if tokens::contains_reserved(input) {
            issues.add_error(
                IssueCode::UnknownExpression,
                Location::root(),
                "expression contains reserved control characters",
            );
            return Err(issues);
        }

        let mut table = TokenTable::new();
        let encoded = tokens::encode_strings(input, &mut table);
        let root = parse_operator(
            &encoded,
            &Location::root(),
            ParseCtx::TopLevel,
            0,
            &mut table,
            &mut issues,
        );

        match root {
            Some(root) if !issues.has_errors() => Ok(Filter { root }),
            _ => {
                if issues.is_empty() {
                    issues.add_error(IssueCode::UnknownExpression, Location::root(), input.trim());
                }
                Err(issues)
            }
        }
    }

    /// The root operator of the expression tree.
    pub fn root(&self) -> &Operator {
        &self.root
    }

    pub fn into_root(self) -> Operator {
        self.root
    }
}

impl From<Operator> for Filter {
    fn from(root: Operator) -> Self {
        Self { root }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt_root(f)
    }
}

impl FromStr for Filter {
    type Err = Issues;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Parser implementation
// =============================================================================

/// Whether the text being parsed is a complex-attribute bracket interior,
/// where attribute references must be bare sub-attribute names and further
/// brackets are forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseCtx {
    TopLevel,
    InComplex,
}

/// Parse one boolean expression (string literals already encoded).
///
/// Returns `None` when the expression could not be fully parsed; the
/// reasons are in `issues`. Siblings of a failed operand are still parsed.
pub(crate) fn parse_operator(
    expr: &str,
    loc: &Location,
    ctx: ParseCtx,
    depth: usize,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Operator> {
    if depth > MAX_EXPRESSION_DEPTH {
        tokens::report(issues, IssueCode::ExpressionTooDeep, loc, table, expr);
        return None;
    }

    let expr = expr.trim();
    if expr.is_empty() {
        issues.add_error(IssueCode::EmptyExpression, loc.clone(), "");
        return None;
    }

    let expr = encode_complex_spans(expr, table);
    let expr = encode_paren_groups(&expr, table);
    parse_or_chain(&expr, loc, ctx, depth, table, issues)
}

/// Replace every `attr[...]` span with a placeholder. A defective span
/// (imbalance, nesting) becomes a placeholder carrying its diagnostic, so
/// the logical split continues and the issue lands at the operand index
/// the span occupies instead of masking its siblings.
fn encode_complex_spans(expr: &str, table: &mut TokenTable) -> String {
    let mut text = expr.to_string();
    loop {
        let (range, entry) = match tokens::find_complex_span(&text) {
            BracketScan::None => return text,
            BracketScan::Found { attr_start, span } => {
                let attr = text[attr_start..span.open].to_string();
                let interior = text[span.open + 1..span.close].to_string();
                (
                    attr_start..span.close + 1,
                    TokenEntry {
                        raw: format!("{}[{}]", attr, interior),
                        kind: TokenKind::Complex { attr, interior },
                    },
                )
            }
            BracketScan::UnmatchedOpen { attr_start } => (
                attr_start..text.len(),
                TokenEntry {
                    raw: text[attr_start..].to_string(),
                    kind: TokenKind::Invalid {
                        code: IssueCode::ComplexAttributeBracketNotOpenedOrClosed,
                    },
                },
            ),
            BracketScan::UnmatchedClose { close } => (
                0..close + 1,
                TokenEntry {
                    raw: text[..=close].to_string(),
                    kind: TokenKind::Invalid {
                        code: IssueCode::ComplexAttributeBracketNotOpenedOrClosed,
                    },
                },
            ),
            BracketScan::Inner { start, end } => (
                start..end + 1,
                TokenEntry {
                    raw: text[start..=end].to_string(),
                    kind: TokenKind::Invalid {
                        code: IssueCode::InnerComplexAttributeOrSquareBracket,
                    },
                },
            ),
        };
        let token = table.intern(entry);
        text.replace_range(range, &token);
    }
}

/// Replace every balanced `(...)` span with a placeholder; the interior is
/// parsed lazily when the placeholder is resolved as a leaf, so its issues
/// are anchored to the operand position the group ends up in. Unmatched
/// parentheses become diagnostic-carrying placeholders like defective
/// bracket spans.
fn encode_paren_groups(expr: &str, table: &mut TokenTable) -> String {
    let mut text = expr.to_string();
    loop {
        let (range, entry) = match tokens::find_paren_group(&text) {
            ParenScan::None => return text,
            ParenScan::Found(span) => {
                let interior = text[span.open + 1..span.close].to_string();
                (
                    span.open..span.close + 1,
                    TokenEntry {
                        raw: format!("({})", interior),
                        kind: TokenKind::Group { interior },
                    },
                )
            }
            ParenScan::UnmatchedOpen(open) => (
                open..text.len(),
                TokenEntry {
                    raw: text[open..].to_string(),
                    kind: TokenKind::Invalid {
                        code: IssueCode::BracketNotOpenedOrClosed,
                    },
                },
            ),
            ParenScan::UnmatchedClose(close) => (
                0..close + 1,
                TokenEntry {
                    raw: text[..=close].to_string(),
                    kind: TokenKind::Invalid {
                        code: IssueCode::BracketNotOpenedOrClosed,
                    },
                },
            ),
        };
        let token = table.intern(entry);
        text.replace_range(range, &token);
    }
}

fn parse_or_chain(
    expr: &str,
    loc: &Location,
    ctx: ParseCtx,
    depth: usize,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Operator> {
    let parts: Vec<&str> = OR_SPLIT.split(expr).collect();
    let split = parts.len() > 1;
    let mut operands = Vec::with_capacity(parts.len());
    let mut ok = true;

    for (i, part) in parts.iter().enumerate() {
        let child = if split { loc.child_index(i) } else { loc.clone() };
        if part.trim().is_empty() {
            tokens::report(issues, IssueCode::MissingOperand, &child, table, expr);
            ok = false;
            continue;
        }
        match parse_and_chain(part, &child, ctx, depth, table, issues) {
            Some(op) => operands.push(op),
            None => ok = false,
        }
    }

    if !ok {
        return None;
    }
    if operands.len() == 1 {
        operands.pop()
    } else {
        Some(Operator::Or(operands))
    }
}

fn parse_and_chain(
    expr: &str,
    loc: &Location,
    ctx: ParseCtx,
    depth: usize,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Operator> {
    let parts: Vec<&str> = AND_SPLIT.split(expr).collect();
    let split = parts.len() > 1;
    let mut operands = Vec::with_capacity(parts.len());
    let mut ok = true;

    for (i, part) in parts.iter().enumerate() {
        let child = if split { loc.child_index(i) } else { loc.clone() };
        if part.trim().is_empty() {
            tokens::report(issues, IssueCode::MissingOperand, &child, table, expr);
            ok = false;
            continue;
        }
        match parse_unary(part, &child, ctx, depth, table, issues) {
            Some(op) => operands.push(op),
            None => ok = false,
        }
    }

    if !ok {
        return None;
    }
    if operands.len() == 1 {
        operands.pop()
    } else {
        Some(Operator::And(operands))
    }
}

/// Strip leading `not` keywords, parse the remaining leaf, and re-wrap.
fn parse_unary(
    expr: &str,
    loc: &Location,
    ctx: ParseCtx,
    depth: usize,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Operator> {
    let mut rest = expr.trim();
    let mut negations = 0usize;
    while let Some(m) = NOT_PREFIX.find(rest) {
        rest = rest[m.end()..].trim_start();
        negations += 1;
    }

    if rest.is_empty() {
        tokens::report(issues, IssueCode::MissingOperand, loc, table, expr);
        return None;
    }

    let mut op = parse_leaf(rest, loc, ctx, depth, table, issues)?;
    for _ in 0..negations {
        op = Operator::Not(Box::new(op));
    }
    Some(op)
}

/// Parse a leaf: a lone placeholder (group or complex span) or an
/// `attr op [value]` attribute expression.
fn parse_leaf(
    text: &str,
    loc: &Location,
    ctx: ParseCtx,
    depth: usize,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Operator> {
    let text = text.trim();

    if let Some(entry) = table.resolve_single(text) {
        let raw = entry.raw.clone();
        let kind = entry.kind.clone();
        return match kind {
            TokenKind::Group { interior } => {
                parse_operator(&interior, loc, ctx, depth + 1, table, issues)
            }
            TokenKind::Complex { attr, interior } => {
                parse_complex(&attr, &interior, loc, ctx, depth, table, issues)
            }
            TokenKind::Invalid { code } => {
                tokens::report(issues, code, loc, table, &raw);
                None
            }
            TokenKind::Literal { .. } => {
                tokens::report(issues, IssueCode::UnknownExpression, loc, table, text);
                None
            }
        };
    }

    let parts: Vec<&str> = text.split_whitespace().collect();
    match parts.as_slice() {
        [attr_text, op_text] => {
            let attr = parse_attr(attr_text, loc, ctx, table, issues);
            if op_text.eq_ignore_ascii_case("pr") {
                attr.map(Operator::Present)
            } else if CompareOp::parse(op_text).is_some() {
                tokens::report(issues, IssueCode::MissingOperand, loc, table, text);
                None
            } else {
                tokens::report(issues, IssueCode::UnknownOperator, loc, table, text);
                None
            }
        }
        [attr_text, op_text, value_text] => {
            let attr = parse_attr(attr_text, loc, ctx, table, issues);
            let op = match CompareOp::parse(op_text) {
                Some(op) => Some(op),
                None => {
                    tokens::report(issues, IssueCode::UnknownOperator, loc, table, text);
                    None
                }
            };
            let value = parse_value(value_text, loc, table, issues);
            match (attr, op, value) {
                (Some(attr), Some(op), Some(value)) => {
                    if op.accepts(value.kind()) {
                        Some(Operator::Compare(attr, op, value))
                    } else {
                        tokens::report(
                            issues,
                            IssueCode::NonCompatibleComparisonValue,
                            loc,
                            table,
                            text,
                        );
                        None
                    }
                }
                _ => None,
            }
        }
        _ => {
            tokens::report(issues, IssueCode::UnknownExpression, loc, table, text);
            None
        }
    }
}

/// Build a `Complex` operator from an encoded `attr[...]` span.
fn parse_complex(
    attr_text: &str,
    interior: &str,
    loc: &Location,
    ctx: ParseCtx,
    depth: usize,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Operator> {
    if ctx == ParseCtx::InComplex {
        tokens::report(
            issues,
            IssueCode::InnerComplexAttributeOrSquareBracket,
            loc,
            table,
            attr_text,
        );
        return None;
    }

    let attr = match AttrRep::parse(attr_text) {
        Some(rep) if rep.sub_attr().is_some() => {
            issues.add_error(
                IssueCode::SubAttributeWithComplexFilter,
                loc.clone(),
                attr_text,
            );
            None
        }
        Some(rep) => Some(rep),
        None => {
            let code = if attr_text.is_empty() {
                IssueCode::UnknownExpression
            } else {
                IssueCode::BadAttributeName
            };
            issues.add_error(code, loc.clone(), table.decode(attr_text));
            None
        }
    };

    // Parse the interior even when the attribute name is bad, so its own
    // defects are reported as well.
    let sub = parse_operator(
        interior,
        &loc.child("sub"),
        ParseCtx::InComplex,
        depth + 1,
        table,
        issues,
    );

    Some(Operator::Complex {
        attr: attr?,
        sub: Box::new(sub?),
    })
}

fn parse_attr(
    text: &str,
    loc: &Location,
    ctx: ParseCtx,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<AttrRep> {
    if let Some(TokenEntry {
        raw,
        kind: TokenKind::Invalid { code },
    }) = table.resolve_single(text)
    {
        let (code, raw) = (*code, raw.clone());
        tokens::report(issues, code, loc, table, &raw);
        return None;
    }
    match AttrRep::parse(text) {
        Some(rep) => {
            // Inside a bracket, references are sub-attribute names of the
            // bracketed attribute: bare, unqualified.
            if ctx == ParseCtx::InComplex && (rep.schema().is_some() || rep.sub_attr().is_some()) {
                issues.add_error(IssueCode::BadAttributeName, loc.clone(), text);
                return None;
            }
            Some(rep)
        }
        None => {
            issues.add_error(IssueCode::BadAttributeName, loc.clone(), table.decode(text));
            None
        }
    }
}

fn parse_value(
    text: &str,
    loc: &Location,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<CompValue> {
    if let Some(entry) = table.resolve_single(text) {
        match &entry.kind {
            TokenKind::Literal {
                content,
                closed: true,
            } => return Some(CompValue::String(content.clone())),
            TokenKind::Invalid { code } => {
                let (code, raw) = (*code, entry.raw.clone());
                tokens::report(issues, code, loc, table, &raw);
                return None;
            }
            _ => {}
        }
        let context = table.decode(text);
        issues.add_error(IssueCode::BadComparisonValue, loc.clone(), context);
        return None;
    }

    match CompValue::parse_unquoted(text) {
        Some(value) => Some(value),
        None => {
            issues.add_error(IssueCode::BadComparisonValue, loc.clone(), table.decode(text));
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(input: &str) -> Filter {
        Filter::parse(input).unwrap_or_else(|issues| panic!("parse failed: {}", issues))
    }

    fn codes(input: &str) -> Vec<IssueCode> {
        match Filter::parse(input) {
            Ok(f) => panic!("expected failure, got {}", f),
            Err(issues) => issues.iter().map(|i| i.code).collect(),
        }
    }

    fn attr(s: &str) -> AttrRep {
        AttrRep::parse(s).unwrap()
    }

    fn compare(a: &str, op: CompareOp, value: CompValue) -> Operator {
        Operator::Compare(attr(a), op, value)
    }

    #[test]
    fn test_simple_equality() {
        let filter = parse("userName eq \"john\"");
        assert_eq!(
            filter.root(),
            &compare("userName", CompareOp::Eq, CompValue::String("john".into()))
        );
    }

    #[test]
    fn test_boolean_number_null_values() {
        let filter = parse("active eq true");
        assert_eq!(
            filter.root(),
            &compare("active", CompareOp::Eq, CompValue::Bool(true))
        );

        let filter = parse("age gt 21");
        assert_eq!(
            filter.root(),
            &compare("age", CompareOp::Gt, CompValue::Number(21.0))
        );

        let filter = parse("score le -5.5");
        assert_eq!(
            filter.root(),
            &compare("score", CompareOp::Le, CompValue::Number(-5.5))
        );

        let filter = parse("manager eq null");
        assert_eq!(filter.root(), &compare("manager", CompareOp::Eq, CompValue::Null));
    }

    #[test]
    fn test_presence() {
        let filter = parse("name pr");
        assert_eq!(filter.root(), &Operator::Present(attr("name")));
    }

    #[test]
    fn test_sub_attribute() {
        let filter = parse("name.familyName eq \"Doe\"");
        assert_eq!(
            filter.root(),
            &compare(
                "name.familyName",
                CompareOp::Eq,
                CompValue::String("Doe".into())
            )
        );
    }

    #[test]
    fn test_schema_qualified_attribute() {
        let filter =
            parse("urn:ietf:params:scim:schemas:core:2.0:User:userName eq \"john\"");
        match filter.root() {
            Operator::Compare(rep, _, _) => {
                assert_eq!(rep.schema(), Some("urn:ietf:params:scim:schemas:core:2.0:User"));
                assert_eq!(rep.attr(), "userName");
            }
            other => panic!("Expected Compare, got {:?}", other),
        }
    }

    #[test]
    fn test_or_of_and_precedence() {
        // "a eq 1 or b eq 2 and c eq 3" == Or(a eq 1, And(b eq 2, c eq 3))
        let filter = parse("a eq 1 or b eq 2 and c eq 3");
        assert_eq!(
            filter.root(),
            &Operator::Or(vec![
                compare("a", CompareOp::Eq, CompValue::Number(1.0)),
                Operator::And(vec![
                    compare("b", CompareOp::Eq, CompValue::Number(2.0)),
                    compare("c", CompareOp::Eq, CompValue::Number(3.0)),
                ]),
            ])
        );
    }

    #[test]
    fn test_not_binds_single_operand() {
        // "not a eq 1 and b eq 2" == And(Not(a eq 1), b eq 2)
        let filter = parse("not a eq 1 and b eq 2");
        assert_eq!(
            filter.root(),
            &Operator::And(vec![
                Operator::Not(Box::new(compare("a", CompareOp::Eq, CompValue::Number(1.0)))),
                compare("b", CompareOp::Eq, CompValue::Number(2.0)),
            ])
        );
    }

    #[test]
    fn test_nary_and() {
        let filter = parse("a pr and b pr and c pr");
        match filter.root() {
            Operator::And(ops) => assert_eq!(ops.len(), 3),
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        let filter = parse("(a eq 1 or b eq 2) and c eq 3");
        match filter.root() {
            Operator::And(ops) => {
                assert_eq!(ops.len(), 2);
                assert!(matches!(ops[0], Operator::Or(_)));
            }
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_not_with_group() {
        let filter = parse("not (active eq false)");
        assert_eq!(
            filter.root(),
            &Operator::Not(Box::new(compare(
                "active",
                CompareOp::Eq,
                CompValue::Bool(false)
            )))
        );
    }

    #[test]
    fn test_redundant_parens_collapse() {
        assert_eq!(parse("((a pr))"), parse("a pr"));
    }

    #[test]
    fn test_case_insensitive_keywords() {
        assert_eq!(parse("userName EQ \"Bob\""), parse("userName eq \"Bob\""));
        assert_eq!(
            parse("a PR AND NOT b EQ TRUE OR c PR"),
            parse("a pr and not b eq true or c pr")
        );
    }

    #[test]
    fn test_quoted_content_is_inert() {
        // One binary leaf, not an And of two malformed operands.
        let filter = parse("displayName eq \"a and b\"");
        assert_eq!(
            filter.root(),
            &compare(
                "displayName",
                CompareOp::Eq,
                CompValue::String("a and b".into())
            )
        );

        let filter = parse("title eq \"not (or) [weird]\"");
        assert!(matches!(filter.root(), Operator::Compare(_, _, _)));
    }

    #[test]
    fn test_keyword_inside_attribute_name() {
        // "form" contains "or", "band" contains "and".
        let filter = parse("form eq 1 and band eq 2");
        match filter.root() {
            Operator::And(ops) => assert_eq!(ops.len(), 2),
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_complex_attribute_filter() {
        let filter = parse("emails[type eq \"work\"]");
        assert_eq!(
            filter.root(),
            &Operator::Complex {
                attr: attr("emails"),
                sub: Box::new(compare(
                    "type",
                    CompareOp::Eq,
                    CompValue::String("work".into())
                )),
            }
        );
    }

    #[test]
    fn test_complex_attribute_with_logic_inside() {
        let filter = parse("emails[type eq \"work\" and primary eq true]");
        match filter.root() {
            Operator::Complex { attr: a, sub } => {
                assert_eq!(a, &attr("emails"));
                assert!(matches!(sub.as_ref(), Operator::And(_)));
            }
            other => panic!("Expected Complex, got {:?}", other),
        }
    }

    #[test]
    fn test_two_distinct_complex_groups_allowed() {
        let filter = parse("emails[type eq \"work\"] or ims[type eq \"xmpp\"]");
        match filter.root() {
            Operator::Or(ops) => {
                assert!(ops.iter().all(|op| matches!(op, Operator::Complex { .. })));
            }
            other => panic!("Expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_complex_fails() {
        // One level of complex nesting only; never silently flattened.
        let result = codes("emails[type eq \"work\" and value[foo eq 1]]");
        assert!(result.contains(&IssueCode::InnerComplexAttributeOrSquareBracket));
    }

    #[test]
    fn test_chained_bracket_groups_fail() {
        let result = codes("emails[type eq \"work\"][primary eq true]");
        assert!(result.contains(&IssueCode::InnerComplexAttributeOrSquareBracket));
    }

    #[test]
    fn test_sub_attribute_inside_complex_fails() {
        let result = codes("emails[name.givenName eq \"a\"]");
        assert!(result.contains(&IssueCode::BadAttributeName));
    }

    #[test]
    fn test_trailing_sub_attribute_after_bracket_fails_in_filter() {
        // `emails[...].value` is patch-path syntax, not filter syntax.
        let result = codes("emails[type eq \"work\"].value eq \"x\"");
        assert!(result.contains(&IssueCode::BadAttributeName));
    }

    #[test]
    fn test_sub_attributed_complex_prefix_fails() {
        let result = codes("name.familyName[foo eq 1]");
        assert!(result.contains(&IssueCode::SubAttributeWithComplexFilter));
    }

    #[rstest]
    #[case("", IssueCode::EmptyExpression)]
    #[case("   ", IssueCode::EmptyExpression)]
    #[case("userName xx \"john\"", IssueCode::UnknownOperator)]
    #[case("userName eq", IssueCode::MissingOperand)]
    #[case("and userName pr", IssueCode::MissingOperand)]
    #[case("userName pr or", IssueCode::MissingOperand)]
    #[case("not", IssueCode::MissingOperand)]
    #[case("userName eq \"john", IssueCode::BadComparisonValue)]
    #[case("userName eq john", IssueCode::BadComparisonValue)]
    #[case("userName", IssueCode::UnknownExpression)]
    #[case("a eq 1 b eq 2", IssueCode::UnknownExpression)]
    #[case("9name eq 1", IssueCode::BadAttributeName)]
    #[case("(a pr", IssueCode::BracketNotOpenedOrClosed)]
    #[case("a pr)", IssueCode::BracketNotOpenedOrClosed)]
    #[case("emails[type eq \"work\"", IssueCode::ComplexAttributeBracketNotOpenedOrClosed)]
    #[case("type eq \"work\"]", IssueCode::ComplexAttributeBracketNotOpenedOrClosed)]
    #[case("name co 3", IssueCode::NonCompatibleComparisonValue)]
    #[case("active gt true", IssueCode::NonCompatibleComparisonValue)]
    #[case("a sw null", IssueCode::NonCompatibleComparisonValue)]
    fn test_error_codes(#[case] input: &str, #[case] expected: IssueCode) {
        assert!(
            codes(input).contains(&expected),
            "expected {:?} for {:?}, got {:?}",
            expected,
            input,
            codes(input)
        );
    }

    #[test]
    fn test_sibling_errors_all_reported() {
        // A defect in one operand must not mask defects in its siblings.
        let result = codes("userName xx \"a\" or price zz 2");
        assert_eq!(
            result
                .iter()
                .filter(|c| **c == IssueCode::UnknownOperator)
                .count(),
            2
        );
    }

    #[test]
    fn test_unbalanced_bracket_with_trailing_text() {
        let err = Filter::parse("emails[type eq \"work\" or userName xx \"a\"").unwrap_err();
        let result: Vec<_> = err.iter().map(|i| i.code).collect();
        assert!(result.contains(&IssueCode::ComplexAttributeBracketNotOpenedOrClosed));
    }

    #[test]
    fn test_nested_bracket_does_not_mask_siblings() {
        // The defective span becomes one operand; both unknown operators in
        // the other operands are still reported, each at its own index.
        let err = Filter::parse("userName xx \"a\" or emails[value[x eq 1]] or price zz 2")
            .unwrap_err();
        let result: Vec<_> = err
            .iter()
            .map(|i| (i.code, i.location.to_string()))
            .collect();
        assert_eq!(result.len(), 3, "got {:?}", result);
        assert!(result.contains(&(IssueCode::UnknownOperator, "0".to_string())));
        assert!(result.contains(&(
            IssueCode::InnerComplexAttributeOrSquareBracket,
            "1".to_string()
        )));
        assert!(result.contains(&(IssueCode::UnknownOperator, "2".to_string())));
    }

    #[test]
    fn test_unbalanced_bracket_does_not_mask_siblings() {
        let err = Filter::parse("userName xx \"a\" or emails[type eq \"w\"").unwrap_err();
        let result: Vec<_> = err
            .iter()
            .map(|i| (i.code, i.location.to_string()))
            .collect();
        assert!(result.contains(&(IssueCode::UnknownOperator, "0".to_string())));
        assert!(result.contains(&(
            IssueCode::ComplexAttributeBracketNotOpenedOrClosed,
            "1".to_string()
        )));
    }

    #[test]
    fn test_unbalanced_paren_does_not_mask_siblings() {
        let err = Filter::parse("userName xx \"a\" and (b pr").unwrap_err();
        let result: Vec<_> = err
            .iter()
            .map(|i| (i.code, i.location.to_string()))
            .collect();
        assert!(result.contains(&(IssueCode::UnknownOperator, "0".to_string())));
        assert!(result.contains(&(IssueCode::BracketNotOpenedOrClosed, "1".to_string())));
    }

    #[test]
    fn test_defective_span_context_is_decoded() {
        let err = Filter::parse("a pr or emails[type eq \"w\"").unwrap_err();
        let issue = err
            .iter()
            .find(|i| i.code == IssueCode::ComplexAttributeBracketNotOpenedOrClosed)
            .unwrap();
        assert_eq!(issue.context, "emails[type eq \"w\"");
    }

    #[test]
    fn test_reserved_control_characters_rejected() {
        // A forged placeholder sequence must not alias a table entry.
        let err = Filter::parse("b eq \"x\" and a eq \u{2}0\u{3}").unwrap_err();
        assert_eq!(err.iter().next().unwrap().code, IssueCode::UnknownExpression);
        assert!(Filter::parse("a eq \"\u{3}\"").is_err());
    }

    #[test]
    fn test_error_locations() {
        let err = Filter::parse("a pr or b pr and c xx 3").unwrap_err();
        let issue = err.iter().next().unwrap();
        assert_eq!(issue.code, IssueCode::UnknownOperator);
        // Second or-operand, second and-operand.
        assert_eq!(issue.location.to_string(), "1.1");
        assert!(err.can_proceed(&Location::root().child_index(0)));
        assert!(!err.can_proceed(&Location::root().child_index(1)));
    }

    #[test]
    fn test_error_context_is_decoded() {
        let err = Filter::parse("displayName xx \"a and b\"").unwrap_err();
        let issue = err.iter().next().unwrap();
        assert!(issue.context.contains("\"a and b\""), "context: {}", issue.context);
    }

    #[test]
    fn test_escaped_string() {
        let filter = parse(r#"name eq "John \"Doe\"""#);
        assert_eq!(
            filter.root(),
            &compare(
                "name",
                CompareOp::Eq,
                CompValue::String("John \"Doe\"".into())
            )
        );
    }

    #[rstest]
    #[case("userName eq \"john\"")]
    #[case("a eq 1 or b eq 2 and c eq 3")]
    #[case("not a eq 1 and b eq 2")]
    #[case("(a pr or b pr) and not (c eq \"x\")")]
    #[case("emails[type eq \"work\" and primary eq true] or ims[type eq \"xmpp\"]")]
    #[case("name.familyName co \"o'mal\"")]
    #[case("title eq \"a \\\"quoted\\\" word\"")]
    #[case("meta.lastModified gt \"2024-01-01T00:00:00Z\"")]
    #[case("urn:ietf:params:scim:schemas:core:2.0:User:userName sw \"j\"")]
    fn test_round_trip(#[case] input: &str) {
        let first = parse(input);
        let rendered = first.to_string();
        let second = Filter::parse(&rendered)
            .unwrap_or_else(|e| panic!("re-parse of {:?} failed: {}", rendered, e));
        assert_eq!(first, second, "round trip changed structure for {:?}", input);
    }

    #[test]
    fn test_serializer_output() {
        assert_eq!(
            parse("a eq 1 or b eq 2 and c eq 3").to_string(),
            "a eq 1 or (b eq 2 and c eq 3)"
        );
        assert_eq!(
            parse("emails[type eq \"work\"]").to_string(),
            "emails[type eq \"work\"]"
        );
        assert_eq!(parse("not (a pr)").to_string(), "not a pr");
    }

    #[test]
    fn test_from_str() {
        let filter: Filter = "userName pr".parse().unwrap();
        assert_eq!(filter.root(), &Operator::Present(attr("userName")));
    }

    #[test]
    fn test_length_limit() {
        let long_value = "x".repeat(MAX_EXPRESSION_LENGTH);
        let input = format!("a eq \"{}\"", long_value);
        let err = Filter::parse(&input).unwrap_err();
        assert_eq!(err.iter().next().unwrap().code, IssueCode::ExpressionTooLong);
    }

    #[test]
    fn test_depth_limit() {
        let mut input = "a pr".to_string();
        for _ in 0..MAX_EXPRESSION_DEPTH {
            input = format!("({})", input);
        }
        assert!(Filter::parse(&input).is_ok());

        let input = format!("({})", input);
        let err = Filter::parse(&input).unwrap_err();
        assert!(
            err.iter().any(|i| i.code == IssueCode::ExpressionTooDeep),
            "expected depth error, got {}",
            err
        );
    }

    #[test]
    fn test_no_partial_ast_on_failure() {
        // Result is Err even though the first operand alone is valid.
        assert!(Filter::parse("userName pr and price xx 2").is_err());
    }
}
