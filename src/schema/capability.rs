//! Capability string parsing.
//!
//! Devices advertise the modules they support as URI-like capability
//! strings of the form `namespace?module=name&revision=YYYY-MM-DD`. Parsing
//! is deliberately tolerant: real devices misreport these strings, so a
//! malformed entry degrades to "no revision" or "non-module" and is logged,
//! never rejected.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

const MODULE_PARAM: &str = "module=";
const REVISION_PARAM: &str = "revision=";
/// Key left behind when a device stores `&` as `&amp;`.
const BROKEN_REVISION_PARAM: &str = "amp;revision=";

/// Canonical (namespace, revision, module) triple for one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CapabilityDescriptor {
    /// Module namespace (text before `?`).
    pub namespace: String,
    /// Module revision, absent when omitted or unusable.
    pub revision: Option<String>,
    /// Module name.
    pub module: String,
}

impl fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "({}?revision={}){}", self.namespace, revision, self.module),
            None => write!(f, "({}){}", self.namespace, self.module),
        }
    }
}

/// Non-fatal irregularity found while parsing a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityAnomaly {
    /// The raw capability string.
    pub capability: String,
    /// What was wrong with it.
    pub reason: String,
}

/// Outcome of resolving a collection of capability strings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedCapabilities {
    /// Module descriptors, deduplicated, in first-seen order.
    pub modules: Vec<CapabilityDescriptor>,
    /// Input strings that could not be mapped to a module.
    pub non_module: Vec<String>,
    /// Irregularities tolerated during parsing.
    pub anomalies: Vec<CapabilityAnomaly>,
}

/// Parses raw capability strings into module descriptors.
///
/// Never fails: strings without a `?` or without a non-empty `module=`
/// parameter are reported as non-module capabilities, and an unusable
/// revision degrades to a descriptor without revision.
#[must_use]
pub fn resolve_capabilities<I, S>(capabilities: I) -> ResolvedCapabilities
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut resolved = ResolvedCapabilities::default();
    let mut seen = HashSet::new();

    for capability in capabilities {
        let capability = capability.as_ref();
        match parse_capability(capability, &mut resolved.anomalies) {
            Some(descriptor) => {
                if seen.insert(descriptor.clone()) {
                    resolved.modules.push(descriptor);
                }
            }
            None => resolved.non_module.push(capability.to_string()),
        }
    }

    resolved
}

fn parse_capability(
    capability: &str,
    anomalies: &mut Vec<CapabilityAnomaly>,
) -> Option<CapabilityDescriptor> {
    let (namespace, query) = capability.split_once('?')?;
    let params: Vec<&str> = query.split('&').collect();

    let module = param_value(&params, MODULE_PARAM).filter(|m| !m.is_empty())?;

    let revision = match param_value(&params, REVISION_PARAM).filter(|r| !r.is_empty()) {
        Some(revision) => Some(revision),
        None if params.iter().any(|p| p.contains(REVISION_PARAM)) => {
            tracing::debug!(
                capability,
                "capability does not report revision correctly, trying amp;revision="
            );
            let broken = param_value(&params, BROKEN_REVISION_PARAM).filter(|r| !r.is_empty());
            if broken.is_none() {
                tracing::warn!(
                    capability,
                    "revision incorrectly escaped, ignoring it"
                );
                anomalies.push(CapabilityAnomaly {
                    capability: capability.to_string(),
                    reason: "unusable revision parameter".to_string(),
                });
            } else {
                anomalies.push(CapabilityAnomaly {
                    capability: capability.to_string(),
                    reason: "revision recovered from amp;-escaped parameter".to_string(),
                });
            }
            broken
        }
        None => None,
    };

    Some(CapabilityDescriptor {
        namespace: namespace.to_string(),
        revision: revision.map(str::to_string),
        module: module.to_string(),
    })
}

/// Returns the value of the first parameter starting with `name`.
fn param_value<'a>(params: &[&'a str], name: &str) -> Option<&'a str> {
    params.iter().find_map(|p| p.strip_prefix(name))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn single(capability: &str) -> CapabilityDescriptor {
        let resolved = resolve_capabilities([capability]);
        let Some(descriptor) = resolved.modules.into_iter().next() else {
            panic!("expected a module descriptor for {capability}");
        };
        descriptor
    }

    #[test]
    fn well_formed_capability() {
        let d = single("urn:test?module=foo&revision=2024-01-01");
        assert_eq!(d.namespace, "urn:test");
        assert_eq!(d.module, "foo");
        assert_eq!(d.revision.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn amp_escaped_revision_is_recovered() {
        let resolved = resolve_capabilities(["urn:test?module=foo&amp;revision=2024-01-01"]);
        assert_eq!(resolved.anomalies.len(), 1);
        let Some(d) = resolved.modules.first() else {
            panic!("expected descriptor");
        };
        assert_eq!(d.revision.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn unrecoverable_revision_degrades_to_none() {
        let resolved = resolve_capabilities(["urn:test?module=foo&x-revision=2024-01-01"]);
        let Some(d) = resolved.modules.first() else {
            panic!("expected descriptor");
        };
        assert_eq!(d.revision, None);
        assert_eq!(resolved.anomalies.len(), 1);
    }

    #[test]
    fn empty_revision_degrades_to_none() {
        let d = single("urn:test?module=foo&revision=");
        assert_eq!(d.revision, None);
    }

    #[test]
    fn missing_revision_is_plain_fallback() {
        let resolved = resolve_capabilities(["urn:test?module=foo&features=a,b"]);
        assert!(resolved.anomalies.is_empty());
        assert_eq!(resolved.modules.first().and_then(|d| d.revision.clone()), None);
    }

    #[test]
    fn strings_without_query_are_non_module() {
        let resolved = resolve_capabilities([
            "urn:ietf:params:netconf:base:1.0",
            "urn:ietf:params:netconf:capability:candidate:1.0",
        ]);
        assert!(resolved.modules.is_empty());
        assert_eq!(resolved.non_module.len(), 2);
    }

    #[test]
    fn query_without_module_is_non_module() {
        let resolved = resolve_capabilities(["urn:x?revision=2020-01-01", "urn:y?module="]);
        assert!(resolved.modules.is_empty());
        assert_eq!(
            resolved.non_module,
            vec!["urn:x?revision=2020-01-01", "urn:y?module="]
        );
    }

    #[test]
    fn duplicates_collapse_in_first_seen_order() {
        let resolved = resolve_capabilities([
            "urn:b?module=b&revision=2020-01-01",
            "urn:a?module=a",
            "urn:b?module=b&revision=2020-01-01",
            "urn:b?revision=2020-01-01&module=b",
        ]);
        let names: Vec<&str> = resolved.modules.iter().map(|d| d.module.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn display_includes_revision() {
        let d = single("urn:test?module=foo&revision=2024-01-01");
        assert_eq!(d.to_string(), "(urn:test?revision=2024-01-01)foo");
    }
}
