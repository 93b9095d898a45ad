//! Filter evaluation against JSON records.
//!
//! Walks a parsed [`Filter`] over a `serde_json::Value` record, consulting
//! an [`AttributeCatalog`] for case-exactness and attribute existence.
//! Evaluation never fails: absent or catalog-unknown attributes simply
//! never match (RFC 7644 Section 3.4.2.2), and `not` is pure logical
//! negation, so `not foo pr` matches a record with no `foo` at all.
//!
//! Record keys are resolved case-insensitively (RFC 7643 Section 2.1), and
//! schema-qualified attributes are additionally looked up under their URN
//! sub-object, the JSON layout SCIM uses for extension schemas.

use serde_json::Value;
use tracing::trace;

use crate::attrs::AttrRep;
use crate::filter::Filter;
use crate::op::{CompValue, CompareOp, Operator};
use crate::schema::AttributeCatalog;

impl Filter {
    /// Evaluate this filter against a JSON record.
    ///
    /// The catalog supplies per-attribute case-exactness; attributes it
    /// does not know never match. Pass
    /// [`PermissiveCatalog`](crate::schema::PermissiveCatalog) to evaluate
    /// purely against the record's shape.
    pub fn matches(&self, record: &Value, catalog: &impl AttributeCatalog) -> bool {
        let matched = eval(self.root(), record, None, catalog);
        trace!(filter = %self, matched, "evaluated filter");
        matched
    }
}

/// Evaluate one operator. `parent` is set when evaluating inside a
/// complex-attribute bracket: leaf attribute names are then sub-attributes
/// of `parent` for catalog purposes, while field resolution stays relative
/// to the current (item) record.
fn eval(
    op: &Operator,
    record: &Value,
    parent: Option<&AttrRep>,
    catalog: &impl AttributeCatalog,
) -> bool {
    match op {
        Operator::Present(attr) => {
            if catalog.lookup(&qualify(attr, parent)).is_none() {
                return false;
            }
            let mut values = Vec::new();
            collect_values(record, attr, &mut values);
            values.iter().any(|v| is_present(v))
        }
        Operator::Compare(attr, op, comp) => {
            let Some(info) = catalog.lookup(&qualify(attr, parent)) else {
                return false;
            };
            let mut values = Vec::new();
            collect_values(record, attr, &mut values);
            values
                .iter()
                .any(|v| compare_values(v, *op, comp, info.case_exact))
        }
        Operator::Complex { attr, sub } => {
            let Some(target) = resolve_attr(record, attr) else {
                return false;
            };
            match target {
                Value::Array(items) => items
                    .iter()
                    .any(|item| eval(sub, item, Some(attr), catalog)),
                Value::Object(_) => eval(sub, target, Some(attr), catalog),
                _ => false,
            }
        }
        Operator::Not(inner) => !eval(inner, record, parent, catalog),
        Operator::And(ops) => ops.iter().all(|op| eval(op, record, parent, catalog)),
        Operator::Or(ops) => ops.iter().any(|op| eval(op, record, parent, catalog)),
    }
}

/// The catalog identifier for a leaf attribute: inside a bracket, the bare
/// name is a sub-attribute of the bracketed attribute.
fn qualify(attr: &AttrRep, parent: Option<&AttrRep>) -> AttrRep {
    match parent {
        Some(parent) => parent.child(attr.attr()),
        None => attr.clone(),
    }
}

/// Case-insensitive object field lookup.
fn get_field<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = record.as_object()?;
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Resolve the top-level attribute of `attr` in `record`, descending into
/// the schema-URN sub-object for qualified extension attributes.
fn resolve_attr<'a>(record: &'a Value, attr: &AttrRep) -> Option<&'a Value> {
    let base = match attr.schema() {
        Some(urn) => match get_field(record, urn) {
            Some(nested @ Value::Object(_)) => nested,
            _ => record,
        },
        None => record,
    };
    get_field(base, attr.attr())
}

/// Collect the comparison candidates an attribute path selects: each
/// element of a multi-valued attribute individually, descending through
/// the sub-attribute when the path has one.
fn collect_values<'a>(record: &'a Value, attr: &AttrRep, out: &mut Vec<&'a Value>) {
    let Some(top) = resolve_attr(record, attr) else {
        return;
    };

    match attr.sub_attr() {
        None => push_elements(top, out),
        Some(sub) => match top {
            Value::Array(items) => {
                for item in items {
                    if let Some(v) = get_field(item, sub) {
                        push_elements(v, out);
                    }
                }
            }
            Value::Object(_) => {
                if let Some(v) = get_field(top, sub) {
                    push_elements(v, out);
                }
            }
            _ => {}
        },
    }
}

fn push_elements<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => out.extend(items.iter()),
        other => out.push(other),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Compare one record value against a comparison literal.
///
/// Kinds must agree for every operator except `ne`, which holds whenever
/// `eq` would not.
fn compare_values(field: &Value, op: CompareOp, comp: &CompValue, case_exact: bool) -> bool {
    match (field, comp) {
        (Value::String(field), CompValue::String(literal)) => {
            let (field, literal) = if case_exact {
                (field.clone(), literal.clone())
            } else {
                (field.to_lowercase(), literal.to_lowercase())
            };
            match op {
                CompareOp::Eq => field == literal,
                CompareOp::Ne => field != literal,
                CompareOp::Co => field.contains(&literal),
                CompareOp::Sw => field.starts_with(&literal),
                CompareOp::Ew => field.ends_with(&literal),
                CompareOp::Gt => field > literal,
                CompareOp::Ge => field >= literal,
                CompareOp::Lt => field < literal,
                CompareOp::Le => field <= literal,
            }
        }
        (Value::Number(field), CompValue::Number(literal)) => {
            let Some(field) = field.as_f64() else {
                return false;
            };
            match op {
                CompareOp::Eq => field == *literal,
                CompareOp::Ne => field != *literal,
                CompareOp::Gt => field > *literal,
                CompareOp::Ge => field >= *literal,
                CompareOp::Lt => field < *literal,
                CompareOp::Le => field <= *literal,
                CompareOp::Co | CompareOp::Sw | CompareOp::Ew => false,
            }
        }
        (Value::Bool(field), CompValue::Bool(literal)) => match op {
            CompareOp::Eq => field == literal,
            CompareOp::Ne => field != literal,
            _ => false,
        },
        (Value::Null, CompValue::Null) => op == CompareOp::Eq,
        _ => op == CompareOp::Ne,
    }
}

// =============================================================================
// Tests
// =============================================================================
