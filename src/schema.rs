//! Consumed interface to the schema/attribute catalog.
//!
//! Evaluation needs per-attribute metadata (RFC 7643 Section 2.2): the
//! declared type, whether the attribute is multi-valued, and whether string
//! comparisons are case-exact. The catalog is passed explicitly at
//! evaluation time; this crate holds no process-wide registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attrs::AttrRep;

/// Declared attribute data types per RFC 7643 Section 2.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttrType {
    String,
    Boolean,
    Decimal,
    Integer,
    DateTime,
    Reference,
    Binary,
    Complex,
}

/// Metadata the evaluator consumes for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrInfo {
    pub ty: AttrType,
    pub multi_valued: bool,
    pub case_exact: bool,
}

impl AttrInfo {
    /// Single-valued, case-insensitive attribute of the given type.
    pub fn of(ty: AttrType) -> Self {
        Self {
            ty,
            multi_valued: false,
            case_exact: false,
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn case_exact(mut self) -> Self {
        self.case_exact = true;
        self
    }
}

/// Read-only attribute metadata lookup.
///
/// `None` means the identifier has no definition; per the evaluation rules
/// an unknown attribute never matches (and never errors).
pub trait AttributeCatalog {
    fn lookup(&self, attr: &AttrRep) -> Option<AttrInfo>;
}

/// Map-backed catalog keyed by attribute path.
///
/// Keys are [`AttrRep`]s, so lookups are case-insensitive; register both
/// `emails` and `emails.type` style paths for complex attributes.
#[derive(Debug, Clone, Default)]
pub struct MapCatalog {
    attrs: HashMap<AttrRep, AttrInfo>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute by path (e.g. `"emails.value"`).
    ///
    /// Returns `self` for chaining; a path that fails the attribute
    /// grammar is ignored.
    pub fn with(mut self, path: &str, info: AttrInfo) -> Self {
        if let Some(rep) = AttrRep::parse(path) {
            self.attrs.insert(rep, info);
        }
        self
    }
}

impl AttributeCatalog for MapCatalog {
    fn lookup(&self, attr: &AttrRep) -> Option<AttrInfo> {
        self.attrs.get(attr).copied()
    }
}

/// Catalog that answers for every identifier with a case-insensitive,
/// single-valued string definition.
///
/// For schema-less callers that evaluate value filters purely against the
/// shape of the record, e.g. a PATCH executor selecting one item of a
/// multi-valued attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveCatalog;

impl AttributeCatalog for PermissiveCatalog {
    fn lookup(&self, _attr: &AttrRep) -> Option<AttrInfo> {
        Some(AttrInfo::of(AttrType::String))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_catalog_case_insensitive_lookup() {
        let catalog = MapCatalog::new()
            .with("userName", AttrInfo::of(AttrType::String))
            .with("emails", AttrInfo::of(AttrType::Complex).multi_valued());

        let rep = AttrRep::parse("USERNAME").unwrap();
        assert_eq!(catalog.lookup(&rep), Some(AttrInfo::of(AttrType::String)));

        let rep = AttrRep::parse("emails").unwrap();
        assert!(catalog.lookup(&rep).unwrap().multi_valued);

        let rep = AttrRep::parse("missing").unwrap();
        assert_eq!(catalog.lookup(&rep), None);
    }

    #[test]
    fn test_map_catalog_sub_attribute_paths() {
        let catalog = MapCatalog::new()
            .with("name.familyName", AttrInfo::of(AttrType::String).case_exact());

        let rep = AttrRep::parse("name.FAMILYNAME").unwrap();
        assert!(catalog.lookup(&rep).unwrap().case_exact);
        assert_eq!(catalog.lookup(&rep.top_level()), None);
    }

    #[test]
    fn test_permissive_catalog() {
        let rep = AttrRep::parse("anything.atAll").unwrap();
        let info = PermissiveCatalog.lookup(&rep).unwrap();
        assert!(!info.case_exact);
        assert_eq!(info.ty, AttrType::String);
    }
}
