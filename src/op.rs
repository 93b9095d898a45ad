//! Operator AST and comparison values for SCIM expressions.
//!
//! The operator set is closed per RFC 7644 Section 3.4.2.2: nine binary
//! comparison operators, the unary `pr` presence test, a complex-attribute
//! wrapper for `attr[...]` value filters, and the logical combinators
//! `and`/`or`/`not`. Exhaustive matching in the evaluator and serializer
//! guarantees every operator kind is handled everywhere.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attrs::AttrRep;

/// A comparison operand: double-quoted string, number, boolean, or `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum CompValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

/// The kind of a [`CompValue`], for operator compatibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Bool,
    Null,
}

impl CompValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CompValue::String(_) => ValueKind::String,
            CompValue::Number(_) => ValueKind::Number,
            CompValue::Bool(_) => ValueKind::Bool,
            CompValue::Null => ValueKind::Null,
        }
    }

    /// Parse an unquoted literal: `true`, `false`, `null`, or a number.
    /// String literals are handled by the placeholder table, not here.
    pub(crate) fn parse_unquoted(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("true") {
            return Some(CompValue::Bool(true));
        }
        if text.eq_ignore_ascii_case("false") {
            return Some(CompValue::Bool(false));
        }
        if text.eq_ignore_ascii_case("null") {
            return Some(CompValue::Null);
        }
        if is_number_literal(text) {
            return text.parse::<f64>().ok().map(CompValue::Number);
        }
        None
    }
}

fn is_number_literal(text: &str) -> bool {
    let rest = text.strip_prefix(['-', '+']).unwrap_or(text);
    let mut parts = rest.splitn(2, ['e', 'E']);
    let mantissa = parts.next().unwrap_or("");
    let exponent = parts.next();

    let mut mantissa_parts = mantissa.splitn(2, '.');
    let int = mantissa_parts.next().unwrap_or("");
    let frac = mantissa_parts.next();

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    digits(int)
        && frac.is_none_or(digits)
        && exponent.is_none_or(|e| digits(e.strip_prefix(['-', '+']).unwrap_or(e)))
}

impl fmt::Display for CompValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompValue::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            CompValue::Number(n) => write!(f, "{}", n),
            CompValue::Bool(b) => write!(f, "{}", b),
            CompValue::Null => f.write_str("null"),
        }
    }
}

/// Binary comparison operators per RFC 7644.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
}

impl CompareOp {
    /// Case-insensitive keyword lookup.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "co" => Some(CompareOp::Co),
            "sw" => Some(CompareOp::Sw),
            "ew" => Some(CompareOp::Ew),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Co => "co",
            CompareOp::Sw => "sw",
            CompareOp::Ew => "ew",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }

    /// The subset of value kinds this operator accepts: the substring
    /// operators take only strings, the ordering operators strings and
    /// numbers, and `eq`/`ne` anything.
    pub fn accepts(&self, kind: ValueKind) -> bool {
        match self {
            CompareOp::Eq | CompareOp::Ne => true,
            CompareOp::Co | CompareOp::Sw | CompareOp::Ew => kind == ValueKind::String,
            CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
                matches!(kind, ValueKind::String | ValueKind::Number)
            }
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of a parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Attribute presence check (e.g. `name pr`)
    Present(AttrRep),
    /// Attribute comparison (e.g. `userName eq "john"`)
    Compare(AttrRep, CompareOp, CompValue),
    /// Complex-attribute value filter (e.g. `emails[type eq "work"]`).
    /// The sub-operator resolves only against sub-attributes of `attr`
    /// and never contains another `Complex` node.
    Complex { attr: AttrRep, sub: Box<Operator> },
    /// Logical negation of a single operand
    Not(Box<Operator>),
    /// N-ary conjunction (two or more operands)
    And(Vec<Operator>),
    /// N-ary disjunction (two or more operands)
    Or(Vec<Operator>),
}

impl Operator {
    /// Render without outer parentheses, for the document root and for
    /// bracket interiors where the delimiters already group the operands.
    pub(crate) fn fmt_root(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::And(ops) => fmt_joined(ops, " and ", f),
            Operator::Or(ops) => fmt_joined(ops, " or ", f),
            other => write!(f, "{}", other),
        }
    }
}

fn fmt_joined(ops: &[Operator], sep: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", op)?;
    }
    Ok(())
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Present(attr) => write!(f, "{} pr", attr),
            Operator::Compare(attr, op, value) => write!(f, "{} {} {}", attr, op, value),
            Operator::Complex { attr, sub } => {
                write!(f, "{}[", attr)?;
                sub.fmt_root(f)?;
                f.write_str("]")
            }
            Operator::Not(inner) => write!(f, "not {}", inner),
            Operator::And(_) | Operator::Or(_) => {
                f.write_str("(")?;
                self.fmt_root(f)?;
                f.write_str(")")
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
