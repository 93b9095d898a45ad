//! SCIM 2.0 PATCH operation paths.
//!
//! Parser and serializer for the `path` attribute of PATCH operations per
//! RFC 7644 Section 3.5.2:
//!
//! ```text
//! path = attrRep
//!      / attrRep "[" valFilter "]"
//!      / attrRep "[" valFilter "]" "." ATTRNAME
//! ```
//!
//! where `valFilter` here is restricted to a single `subAttr eq value`
//! comparison selecting one item of a multi-valued attribute.
//!
//! ## Examples
//!
//! ```text
//! userName
//! name.familyName
//! emails[type eq "work"]
//! emails[type eq "work"].value
//! ```
//!
//! The value filter and the trailing sub-attribute are stored as full
//! identifiers promoted under the bracketed attribute:
//! `emails[type eq "work"].value` yields a filter on `emails.type` and a
//! target of `emails.value`.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::attrs::AttrRep;
use crate::filter::{self, MAX_EXPRESSION_LENGTH, ParseCtx};
use crate::issues::{IssueCode, Issues, Location};
use crate::op::{CompareOp, Operator};
use crate::tokens::{self, BracketScan, TokenTable};

/// A parsed PATCH path.
///
/// Invariants: `complex_filter` is always a single `eq` comparison whose
/// attribute is a sub-attribute of `attr_rep`; `complex_filter_attr_rep`
/// likewise shares `attr_rep`'s top level; a sub-attributed `attr_rep`
/// excludes both filter fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPath {
    attr_rep: AttrRep,
    complex_filter: Option<Operator>,
    complex_filter_attr_rep: Option<AttrRep>,
}

impl PatchPath {
    /// Parse a PATCH path.
    ///
    /// # Examples
    ///
    /// ```
    /// use scim_expr::PatchPath;
    ///
    /// let path = PatchPath::parse("emails[type eq \"work\"].value").unwrap();
    /// assert_eq!(path.attr_rep().attr(), "emails");
    /// assert_eq!(
    ///     path.complex_filter_attr_rep().unwrap().sub_attr(),
    ///     Some("value")
    /// );
    /// ```
    pub fn parse(input: &str) -> Result<PatchPath, Issues> {
        debug!(len = input.len(), "parsing SCIM patch path");

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
                "path contains reserved control characters",
            );
            return Err(issues);
        }

        let trimmed = input.trim();
        if trimmed.is_empty() {
            issues.add_error(IssueCode::EmptyExpression, Location::root(), "");
            return Err(issues);
        }

        let mut table = TokenTable::new();
        let encoded = tokens::encode_strings(trimmed, &mut table);

        // A path addresses a single target; unlike filters there are no
        // sibling operands to keep parsing past a defective bracket.
        let path = match tokens::find_complex_span(&encoded) {
            BracketScan::None => parse_plain(&encoded, &mut table, &mut issues),
            BracketScan::UnmatchedOpen { .. } | BracketScan::UnmatchedClose { .. } => {
                tokens::report(
                    &mut issues,
                    IssueCode::ComplexAttributeBracketNotOpenedOrClosed,
                    &Location::root(),
                    &table,
                    &encoded,
                );
                None
            }
            BracketScan::Inner { .. } => {
                tokens::report(
                    &mut issues,
                    IssueCode::InnerComplexAttributeOrSquareBracket,
                    &Location::root(),
                    &table,
                    &encoded,
                );
                None
            }
            BracketScan::Found { attr_start, span } => {
                parse_filtered(&encoded, attr_start, span, &mut table, &mut issues)
            }
        };

        match path {
            Some(path) if !issues.has_errors() => Ok(path),
            _ => {
                if issues.is_empty() {
                    issues.add_error(IssueCode::UnknownExpression, Location::root(), trimmed);
                }
                Err(issues)
            }
        }
    }

    /// The addressed attribute, with its sub-attribute when the path has
    /// no value filter (`name.familyName`).
    pub fn attr_rep(&self) -> &AttrRep {
        &self.attr_rep
    }

    /// The item-selection comparison, always a single `eq` on a
    /// sub-attribute of [`attr_rep`](Self::attr_rep).
    pub fn complex_filter(&self) -> Option<&Operator> {
        self.complex_filter.as_ref()
    }

    /// The sub-attribute addressed within the selected item
    /// (`emails.value` for `emails[type eq "work"].value`).
    pub fn complex_filter_attr_rep(&self) -> Option<&AttrRep> {
        self.complex_filter_attr_rep.as_ref()
    }
}

/// A path with no bracket: the whole text is one attribute identifier.
fn parse_plain(encoded: &str, table: &mut TokenTable, issues: &mut Issues) -> Option<PatchPath> {
    match AttrRep::parse(encoded) {
        Some(attr_rep) => Some(PatchPath {
            attr_rep,
            complex_filter: None,
            complex_filter_attr_rep: None,
        }),
        None => {
            tokens::report(
                issues,
                IssueCode::BadAttributeName,
                &Location::root(),
                table,
                encoded,
            );
            None
        }
    }
}

/// A path with a value filter: `attr[sub eq value]` plus an optional
/// trailing `.subAttr`.
fn parse_filtered(
    encoded: &str,
    attr_start: usize,
    span: tokens::Span,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<PatchPath> {
    if !encoded[..attr_start].trim().is_empty() {
        tokens::report(
            issues,
            IssueCode::UnknownExpression,
            &Location::root(),
            table,
            encoded,
        );
        return None;
    }

    let attr_text = &encoded[attr_start..span.open];
    let attr_rep = match AttrRep::parse(attr_text) {
        Some(rep) if rep.sub_attr().is_some() => {
            issues.add_error(
                IssueCode::SubAttributeWithComplexFilter,
                Location::root(),
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
            issues.add_error(code, Location::root(), table.decode(encoded));
            None
        }
    };

    let interior = encoded[span.open + 1..span.close].to_string();
    let filter_op = parse_eq_filter(&interior, table, issues);
    let trailing = parse_trailing(&encoded[span.close + 1..], table, issues);

    let attr_rep = attr_rep?;
    let complex_filter = match filter_op? {
        Operator::Compare(sub, op, value) => {
            Some(Operator::Compare(attr_rep.child(sub.attr()), op, value))
        }
        _ => None,
    };
    let complex_filter_attr_rep = match trailing? {
        Some(sub) => Some(attr_rep.child(&sub)),
        None => None,
    };

    Some(PatchPath {
        attr_rep,
        complex_filter,
        complex_filter_attr_rep,
    })
}

/// Parse a bracket interior and require it to be exactly one `eq`
/// comparison.
fn parse_eq_filter(
    interior: &str,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Operator> {
    let loc = Location::root().child("sub");
    let op = filter::parse_operator(interior, &loc, ParseCtx::InComplex, 1, table, issues)?;
    match op {
        Operator::Compare(_, CompareOp::Eq, _) => Some(op),
        _ => {
            tokens::report(issues, IssueCode::EqOperatorAllowedOnly, &loc, table, interior);
            None
        }
    }
}

/// Parse the text after the closing bracket: empty, or `.` plus one bare
/// sub-attribute name.
///
/// `Some(None)` means "no trailing sub-attribute"; `None` means the
/// trailing text was malformed.
fn parse_trailing(
    rest: &str,
    table: &mut TokenTable,
    issues: &mut Issues,
) -> Option<Option<String>> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Some(None);
    }
    // A second bracket group chained onto the first.
    if rest.starts_with('[') {
        tokens::report(
            issues,
            IssueCode::InnerComplexAttributeOrSquareBracket,
            &Location::root(),
            table,
            rest,
        );
        return None;
    }

    let bare = rest.strip_prefix('.').and_then(|name| {
        AttrRep::parse(name)
            .filter(|rep| rep.schema().is_none() && rep.sub_attr().is_none())
            .map(|rep| rep.attr().to_string())
    });
    match bare {
        Some(name) => Some(Some(name)),
        None => {
            tokens::report(
                issues,
                IssueCode::BadAttributeName,
                &Location::root(),
                table,
                rest,
            );
            None
        }
    }
}

impl fmt::Display for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.attr_rep)?;
        if let Some(Operator::Compare(attr, op, value)) = &self.complex_filter {
            let sub = attr.sub_attr().unwrap_or(attr.attr());
            write!(f, "[{} {} {}]", sub, op, value)?;
        }
        if let Some(target) = &self.complex_filter_attr_rep {
            if let Some(sub) = target.sub_attr() {
                write!(f, ".{}", sub)?;
            }
        }
        Ok(())
    }
}

impl FromStr for PatchPath {
    type Err = Issues;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Tests
// =============================================================================
