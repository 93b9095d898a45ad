//! SCIM attribute identifiers.
//!
//! An attribute is addressed by an optionally schema-qualified name with an
//! optional sub-attribute, per RFC 7644 Section 3.10:
//!
//! ```text
//! attrRep = [URI ":"] ATTRNAME ["." ATTRNAME]
//! ```
//!
//! Examples: `userName`, `name.familyName`,
//! `urn:ietf:params:scim:schemas:core:2.0:User:userName`.
//!
//! Attribute names are case-insensitive (RFC 7643 Section 2.1). [`AttrRep`]
//! compares and hashes on a lower-cased projection while preserving the
//! original casing for display.

use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;

static ATTR_REP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<schema>[a-z0-9][\w.\-]*(?::[\w.\-]+)+):)?(?P<attr>[a-z]\w*|\$ref)(?:\.(?P<sub>[a-z]\w*|\$ref))?$",
    )
    .unwrap()
});

/// A parsed attribute identifier: `[schema-urn:]attr[.subAttr]`.
///
/// Equality and hashing ignore ASCII case on all three components, so
/// `AttrRep` works as a key in case-insensitive attribute maps.
#[derive(Debug, Clone)]
pub struct AttrRep {
    schema: Option<String>,
    attr: String,
    sub_attr: Option<String>,
}

impl AttrRep {
    /// Parse an attribute identifier.
    ///
    /// Returns `None` if the text does not match the attribute grammar
    /// (attribute and sub-attribute names start with a letter followed by
    /// word characters, or are the literal `$ref`; a schema URN prefix
    /// must contain at least one `:`).
    pub fn parse(text: &str) -> Option<Self> {
        let caps = ATTR_REP.captures(text.trim())?;
        Some(Self {
            schema: caps.name("schema").map(|m| m.as_str().to_string()),
            attr: caps.name("attr")?.as_str().to_string(),
            sub_attr: caps.name("sub").map(|m| m.as_str().to_string()),
        })
    }

    /// The schema URN, if the identifier is fully qualified.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The top-level attribute name.
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// The sub-attribute name, if any.
    pub fn sub_attr(&self) -> Option<&str> {
        self.sub_attr.as_deref()
    }

    /// This identifier with the sub-attribute stripped.
    pub fn top_level(&self) -> AttrRep {
        AttrRep {
            schema: self.schema.clone(),
            attr: self.attr.clone(),
            sub_attr: None,
        }
    }

    /// Whether two identifiers denote the same top-level attribute,
    /// ignoring sub-attributes.
    pub fn top_level_equals(&self, other: &AttrRep) -> bool {
        opt_eq_ignore_case(self.schema.as_deref(), other.schema.as_deref())
            && self.attr.eq_ignore_ascii_case(&other.attr)
    }

    /// The sub-attribute `sub` of this identifier's top-level attribute.
    pub(crate) fn child(&self, sub: &str) -> AttrRep {
        AttrRep {
            schema: self.schema.clone(),
            attr: self.attr.clone(),
            sub_attr: Some(sub.to_string()),
        }
    }
}

fn opt_eq_ignore_case(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for AttrRep {
    fn eq(&self, other: &Self) -> bool {
        self.top_level_equals(other)
            && opt_eq_ignore_case(self.sub_attr.as_deref(), other.sub_attr.as_deref())
    }
}

impl Eq for AttrRep {}

impl Hash for AttrRep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fn fold<H: Hasher>(s: Option<&str>, state: &mut H) {
            match s {
                Some(s) => {
                    state.write_u8(1);
                    for b in s.bytes() {
                        state.write_u8(b.to_ascii_lowercase());
                    }
                }
                None => state.write_u8(0),
            }
        }
        fold(self.schema.as_deref(), state);
        fold(Some(&self.attr), state);
        fold(self.sub_attr.as_deref(), state);
    }
}

impl fmt::Display for AttrRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}:", schema)?;
        }
        write!(f, "{}", self.attr)?;
        if let Some(sub) = &self.sub_attr {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_parse_simple() {
        let rep = AttrRep::parse("userName").unwrap();
        assert_eq!(rep.attr(), "userName");
        assert_eq!(rep.schema(), None);
        assert_eq!(rep.sub_attr(), None);
    }

    #[test]
    fn test_parse_sub_attribute() {
        let rep = AttrRep::parse("name.familyName").unwrap();
        assert_eq!(rep.attr(), "name");
        assert_eq!(rep.sub_attr(), Some("familyName"));
    }

    #[test]
    fn test_parse_qualified() {
        let rep =
            AttrRep::parse("urn:ietf:params:scim:schemas:core:2.0:User:userName").unwrap();
        assert_eq!(
            rep.schema(),
            Some("urn:ietf:params:scim:schemas:core:2.0:User")
        );
        assert_eq!(rep.attr(), "userName");
        assert_eq!(rep.sub_attr(), None);
    }

    #[test]
    fn test_parse_qualified_with_sub() {
        let rep =
            AttrRep::parse("urn:ietf:params:scim:schemas:core:2.0:User:name.givenName").unwrap();
        assert_eq!(
            rep.schema(),
            Some("urn:ietf:params:scim:schemas:core:2.0:User")
        );
        assert_eq!(rep.attr(), "name");
        assert_eq!(rep.sub_attr(), Some("givenName"));
    }

    #[test]
    fn test_parse_dollar_ref() {
        let rep = AttrRep::parse("$ref").unwrap();
        assert_eq!(rep.attr(), "$ref");

        let rep = AttrRep::parse("members.$ref").unwrap();
        assert_eq!(rep.attr(), "members");
        assert_eq!(rep.sub_attr(), Some("$ref"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(AttrRep::parse("").is_none());
        assert!(AttrRep::parse("a b").is_none());
        assert!(AttrRep::parse("a.b.c").is_none());
        assert!(AttrRep::parse("a[b]").is_none());
        assert!(AttrRep::parse(".name").is_none());
        assert!(AttrRep::parse("name.").is_none());
        assert!(AttrRep::parse("9name").is_none());
        assert!(AttrRep::parse("name.9sub").is_none());
        assert!(AttrRep::parse("emails[type").is_none());
    }

    #[test]
    fn test_case_insensitive_equality() {
        let a = AttrRep::parse("userName").unwrap();
        let b = AttrRep::parse("USERNAME").unwrap();
        assert_eq!(a, b);

        let a = AttrRep::parse("name.familyName").unwrap();
        let b = AttrRep::parse("Name.FAMILYNAME").unwrap();
        assert_eq!(a, b);

        let a = AttrRep::parse("name.familyName").unwrap();
        let b = AttrRep::parse("name.givenName").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_case_insensitive_hashing() {
        let mut map = HashMap::new();
        map.insert(AttrRep::parse("userName").unwrap(), 1);
        assert_eq!(map.get(&AttrRep::parse("USERNAME").unwrap()), Some(&1));
        assert_eq!(map.get(&AttrRep::parse("other").unwrap()), None);
    }

    #[test]
    fn test_top_level_equals() {
        let a = AttrRep::parse("emails.value").unwrap();
        let b = AttrRep::parse("EMAILS.type").unwrap();
        assert!(a.top_level_equals(&b));
        assert_ne!(a, b);

        let c = AttrRep::parse("ims.value").unwrap();
        assert!(!a.top_level_equals(&c));
    }

    #[test]
    fn test_display_preserves_casing() {
        let rep = AttrRep::parse("name.FamilyName").unwrap();
        assert_eq!(rep.to_string(), "name.FamilyName");

        let rep = AttrRep::parse("urn:ietf:params:scim:schemas:core:2.0:User:userName").unwrap();
        assert_eq!(
            rep.to_string(),
            "urn:ietf:params:scim:schemas:core:2.0:User:userName"
        );
    }

    #[test]
    fn test_child() {
        let emails = AttrRep::parse("emails").unwrap();
        let value = emails.child("value");
        assert_eq!(value, AttrRep::parse("emails.value").unwrap());
        assert!(value.top_level_equals(&emails));
    }
}
