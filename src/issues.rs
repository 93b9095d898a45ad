//! Location-tagged parse diagnostics.
//!
//! Filter and path parsing never stops at the first defect: diagnostics
//! accumulate per sub-expression and are merged upward, so one malformed
//! operand does not mask unrelated errors elsewhere in a long filter
//! (RFC 7644 Section 3.12 expects a complete `invalidFilter` detail).
//!
//! [`Issues`] is the `Err` arm of every parse: callers receive either a
//! fully valid AST or no AST plus the complete diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a single diagnostic.
///
/// The top-level parse result fails iff any accumulated issue is
/// [`Severity::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Machine-readable diagnostic codes.
///
/// Each code carries a stable number (`code()`) and a snake_case name
/// (`Display`), so consumers can map diagnostics to protocol error payloads
/// without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// Unmatched `(` or `)` at the current nesting level.
    BracketNotOpenedOrClosed,
    /// Unmatched `[` or `]`.
    ComplexAttributeBracketNotOpenedOrClosed,
    /// A `[` inside an already-open complex-attribute group, or a second
    /// bracket group attached to the same expression.
    InnerComplexAttributeOrSquareBracket,
    /// Empty filter, path, or group interior.
    EmptyExpression,
    /// Dangling `and`/`or`/`not` with no operand, or an operator keyword
    /// with no comparison value.
    MissingOperand,
    /// Operator keyword outside the fixed SCIM operator set.
    UnknownOperator,
    /// Expression does not have the `attr op [value]` shape, or contains
    /// reserved control characters.
    UnknownExpression,
    /// Identifier fails the attribute grammar, or references an attribute
    /// a complex-attribute sub-filter may not reach.
    BadAttributeName,
    /// Comparison value is not a string, number, boolean, or `null`.
    BadComparisonValue,
    /// Comparison value kind not accepted by the chosen operator.
    NonCompatibleComparisonValue,
    /// Patch-path value filters permit only the `eq` operator.
    EqOperatorAllowedOnly,
    /// Attribute carries both a sub-attribute and a bracket group.
    SubAttributeWithComplexFilter,
    /// Expression exceeds the maximum byte length.
    ExpressionTooLong,
    /// Expression exceeds the maximum nesting depth.
    ExpressionTooDeep,
}

impl IssueCode {
    /// Stable numeric code.
    pub fn code(&self) -> u16 {
        match self {
            IssueCode::BracketNotOpenedOrClosed => 100,
            IssueCode::ComplexAttributeBracketNotOpenedOrClosed => 101,
            IssueCode::InnerComplexAttributeOrSquareBracket => 102,
            IssueCode::EmptyExpression => 103,
            IssueCode::MissingOperand => 104,
            IssueCode::UnknownOperator => 105,
            IssueCode::UnknownExpression => 106,
            IssueCode::BadAttributeName => 107,
            IssueCode::BadComparisonValue => 108,
            IssueCode::NonCompatibleComparisonValue => 109,
            IssueCode::EqOperatorAllowedOnly => 110,
            IssueCode::SubAttributeWithComplexFilter => 111,
            IssueCode::ExpressionTooLong => 112,
            IssueCode::ExpressionTooDeep => 113,
        }
    }

    /// Snake_case name used in error payloads.
    pub fn name(&self) -> &'static str {
        match self {
            IssueCode::BracketNotOpenedOrClosed => "bracket_not_opened_or_closed",
            IssueCode::ComplexAttributeBracketNotOpenedOrClosed => {
                "complex_attribute_bracket_not_opened_or_closed"
            }
            IssueCode::InnerComplexAttributeOrSquareBracket => {
                "inner_complex_attribute_or_square_bracket"
            }
            IssueCode::EmptyExpression => "empty_expression",
            IssueCode::MissingOperand => "missing_operand",
            IssueCode::UnknownOperator => "unknown_operator",
            IssueCode::UnknownExpression => "unknown_expression",
            IssueCode::BadAttributeName => "bad_attribute_name",
            IssueCode::BadComparisonValue => "bad_comparison_value",
            IssueCode::NonCompatibleComparisonValue => "non_compatible_comparison_value",
            IssueCode::EqOperatorAllowedOnly => "eq_operator_allowed_only",
            IssueCode::SubAttributeWithComplexFilter => "sub_attribute_with_complex_filter",
            IssueCode::ExpressionTooLong => "expression_too_long",
            IssueCode::ExpressionTooDeep => "expression_too_deep",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dotted operand path locating an issue within the original expression.
///
/// Segments are OR/AND operand indexes (`0`, `1`, ...) and `sub` for
/// complex-attribute interiors: in `a pr or (b pr and c[d eq 1])`, the
/// `d eq 1` leaf lives at `1.1.sub`. The root location is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location(Vec<String>);

impl Location {
    /// The whole-expression location.
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend this location with one more segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Extend this location with an operand index.
    pub fn child_index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` is `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &Location) -> bool {
        self.0.len() >= prefix.0.len()
            && self.0.iter().zip(&prefix.0).all(|(a, b)| a == b)
    }

    fn prefixed(&self, prefix: &Location) -> Location {
        let mut segments = prefix.0.clone();
        segments.extend(self.0.iter().cloned());
        Location(segments)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// One diagnostic: a code, the operand path it is anchored to, and the
/// offending source text (placeholders already decoded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub severity: Severity,
    pub location: Location,
    pub context: String,
}

impl Issue {
    /// An error-severity issue.
    pub fn error(code: IssueCode, location: Location, context: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            location,
            context: context.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: '{}'", self.code, self.context)?;
        if !self.location.segments().is_empty() {
            write!(f, " (at operand {})", self.location)?;
        }
        Ok(())
    }
}

/// Append-only collection of diagnostics; the `Err` arm of every parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{}", summarize(.issues))]
pub struct Issues {
    issues: Vec<Issue>,
}

fn summarize(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "no issues".to_string();
    }
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one issue.
    pub fn add(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Record an error-severity issue.
    pub fn add_error(&mut self, code: IssueCode, location: Location, context: impl Into<String>) {
        self.add(Issue::error(code, location, context));
    }

    /// Merge another collection, keeping its locations.
    pub fn merge(&mut self, other: Issues) {
        self.issues.extend(other.issues);
    }

    /// Merge another collection, re-anchoring each issue under `prefix`.
    pub fn merge_at(&mut self, prefix: &Location, other: Issues) {
        for mut issue in other.issues {
            issue.location = issue.location.prefixed(prefix);
            self.issues.push(issue);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether any issue is of error severity.
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == Severity::Error)
    }

    /// Whether processing can continue past `location`: true iff no
    /// error-severity issue is anchored at or underneath it.
    pub fn can_proceed(&self, location: &Location) -> bool {
        !self.issues.iter().any(|i| {
            i.severity == Severity::Error && i.location.starts_with(location)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    /// Collapse into a parse result: `value` if error-free, else `self`.
    pub fn into_result<T>(self, value: T) -> Result<T, Issues> {
        if self.has_errors() { Err(self) } else { Ok(value) }
    }
}

// =============================================================================
// Tests
// =============================================================================
