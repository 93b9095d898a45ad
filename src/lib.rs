//! SCIM 2.0 expression engine.
//!
//! Parsing, validation, evaluation, and re-serialization of the two
//! textual mini-languages of the SCIM wire protocol (RFC 7643/7644):
//! **filter expressions**, used in query strings and search requests to
//! select resources, and **patch paths**, used in PATCH request bodies to
//! address an attribute or one matching item of a multi-valued attribute.
//!
//! Parsing is a pure function from text to an immutable AST: no I/O, no
//! global state, no panics on malformed input. Failures come back as
//! [`Issues`], a collection of location-tagged diagnostics covering every
//! defect in the expression, not just the first one. Parsed values are
//! immutable and safe to evaluate concurrently.
//!
//! # Examples
//!
//! Parse and evaluate a filter:
//!
//! ```
//! use scim_expr::{AttrInfo, AttrType, Filter, MapCatalog};
//! use serde_json::json;
//!
//! let filter = Filter::parse(r#"userName sw "J" and emails[type eq "work"]"#)?;
//!
//! let catalog = MapCatalog::new()
//!     .with("userName", AttrInfo::of(AttrType::String))
//!     .with("emails", AttrInfo::of(AttrType::Complex).multi_valued())
//!     .with("emails.type", AttrInfo::of(AttrType::String));
//!
//! let record = json!({
//!     "userName": "jdoe",
//!     "emails": [{ "type": "work", "value": "jdoe@example.com" }]
//! });
//! assert!(filter.matches(&record, &catalog));
//! # Ok::<(), scim_expr::Issues>(())
//! ```
//!
//! Parse a patch path:
//!
//! ```
//! use scim_expr::PatchPath;
//!
//! let path = PatchPath::parse(r#"emails[type eq "work"].value"#)?;
//! assert_eq!(path.attr_rep().attr(), "emails");
//! assert_eq!(path.complex_filter_attr_rep().unwrap().sub_attr(), Some("value"));
//! # Ok::<(), scim_expr::Issues>(())
//! ```
//!
//! Inspect diagnostics:
//!
//! ```
//! use scim_expr::{Filter, IssueCode};
//!
//! let issues = Filter::parse("a pr or b xx 1").unwrap_err();
//! let issue = issues.iter().next().unwrap();
//! assert_eq!(issue.code, IssueCode::UnknownOperator);
//! assert_eq!(issue.location.to_string(), "1");
//! ```

pub mod attrs;
pub mod filter;
pub mod issues;
mod matcher;
pub mod op;
pub mod path;
pub mod schema;
mod tokens;

pub use attrs::AttrRep;
pub use filter::{Filter, MAX_EXPRESSION_DEPTH, MAX_EXPRESSION_LENGTH};
pub use issues::{Issue, IssueCode, Issues, Location, Severity};
pub use op::{CompValue, CompareOp, Operator, ValueKind};
pub use path::PatchPath;
pub use schema::{AttrInfo, AttrType, AttributeCatalog, MapCatalog, PermissiveCatalog};
