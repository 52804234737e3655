// Canonical-prefix resolution for the standard SEC taxonomy families.
//
// Rules never hardcode a taxonomy release date; they resolve concepts
// through the prefix map built here once per document.
use crate::model::{Dts, QName};
use ahash::AHashMap;
use compact_str::CompactString;
use once_cell::sync::Lazy;
use regex::Regex;

/// The nine well-known taxonomy families, each matched against the whole
/// target namespace URI including the embedded release date token.
static NAMESPACE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let sec = |family: &str| format!(r"^https?://xbrl\.(us|sec\.gov)/{}/[0-9-]{{10}}$", family);
    let patterns = [
        ("country", sec("country")),
        ("currency", sec("currency")),
        ("dei", sec("dei")),
        ("exch", sec("exch")),
        ("invest", sec("invest")),
        ("naics", sec("naics")),
        ("sic", sec("sic")),
        ("stpr", sec("stpr")),
        (
            "us-gaap",
            r"^https?://(xbrl\.us|fasb\.org)/us-gaap/[0-9-]{10}$".to_string(),
        ),
    ];
    patterns
        .into_iter()
        .map(|(prefix, pattern)| {
            let re = Regex::new(&pattern).expect("namespace pattern is valid");
            (prefix, re)
        })
        .collect()
});

/// Short prefix to resolved namespace URI for the taxonomies the document
/// actually loaded. Families that are absent simply have no entry, and
/// rules depending on them no-op.
#[derive(Debug, Default)]
pub struct NamespaceMap {
    entries: AHashMap<&'static str, CompactString>,
}

impl NamespaceMap {
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(|ns| ns.as_str())
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.entries.contains_key(prefix)
    }

    /// Qualified name in the namespace bound to `prefix`, if loaded.
    pub fn qname(&self, prefix: &str, local_name: &str) -> Option<QName> {
        self.get(prefix).map(|ns| QName::new(ns, local_name))
    }
}

/// Scan the loaded schemas and bind each standard family to the matching
/// target namespace.
pub fn standard_namespaces(dts: &Dts) -> NamespaceMap {
    let mut map = NamespaceMap::default();
    for schema in &dts.schemas {
        for &(prefix, ref re) in NAMESPACE_PATTERNS.iter() {
            if re.is_match(&schema.target_namespace) {
                tracing::debug!(prefix, namespace = %schema.target_namespace, "resolved taxonomy family");
                map.entries
                    .insert(prefix, schema.target_namespace.clone());
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dts_with(namespaces: &[&str]) -> Dts {
        let mut dts = Dts::new();
        for ns in namespaces {
            dts.add_schema(*ns);
        }
        dts
    }

    #[test]
    fn resolves_known_families() {
        let dts = dts_with(&[
            "https://xbrl.sec.gov/dei/2023-01-31",
            "http://fasb.org/us-gaap/2023-01-31",
            "http://xbrl.sec.gov/country/2021-06-30",
        ]);
        let map = standard_namespaces(&dts);
        assert_eq!(map.get("dei"), Some("https://xbrl.sec.gov/dei/2023-01-31"));
        assert_eq!(map.get("us-gaap"), Some("http://fasb.org/us-gaap/2023-01-31"));
        assert!(map.contains("country"));
        assert!(!map.contains("invest"));
    }

    #[test]
    fn requires_full_match_with_date_token() {
        let dts = dts_with(&[
            "http://fasb.org/us-gaap/2023-01-31/extra",
            "http://fasb.org/us-gaap/2023",
            "http://example.com/dei/2023-01-31",
        ]);
        let map = standard_namespaces(&dts);
        assert!(!map.contains("us-gaap"));
        assert!(!map.contains("dei"));
    }

    #[test]
    fn qname_resolution_uses_bound_namespace() {
        let dts = dts_with(&["https://xbrl.sec.gov/dei/2023-01-31"]);
        let map = standard_namespaces(&dts);
        let qname = map.qname("dei", "DocumentType").unwrap();
        assert_eq!(qname.local_name, "DocumentType");
        assert_eq!(map.qname("us-gaap", "Assets"), None);
    }
}
