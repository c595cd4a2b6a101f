//! This module defines the `Target` structure, a remote resource that is
//! polled for a condition of interest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// A remote resource to poll, together with the criteria that decide whether
/// its content currently exhibits the condition of interest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    /// The URL to fetch. Doubles as the identifier of the target.
    pub url: Url,

    /// Optional human readable name used in notifications and logs.
    #[serde(default)]
    pub name: Option<String>,

    /// Ordered list of terms the content matcher looks for.
    #[serde(default)]
    pub terms: Vec<String>,

    /// Field name to regular expression map. When the condition is present,
    /// each expression contributes one extracted field to the match.
    #[serde(default)]
    pub extract: BTreeMap<String, String>,
}

impl Target {
    /// Creates a target without extraction patterns.
    pub fn new(url: Url, name: Option<String>, terms: Vec<String>) -> Self {
        Self { url, name, terms, extract: BTreeMap::new() }
    }

    /// The identifier of the target.
    pub fn id(&self) -> &str {
        self.url.as_str()
    }

    /// The configured name, falling back to the URL.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.url.as_str(),
        }
    }

    /// The host part of the URL, without IPv6 brackets.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str().map(|host| host.trim_start_matches('[').trim_end_matches(']'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_url() {
        let url = Url::parse("https://example.com/slots").unwrap();
        let unnamed = Target::new(url.clone(), None, vec!["open".into()]);
        assert_eq!(unnamed.display_name(), "https://example.com/slots");

        let blank = Target::new(url.clone(), Some("  ".into()), vec![]);
        assert_eq!(blank.display_name(), "https://example.com/slots");

        let named = Target::new(url, Some("Slots".into()), vec![]);
        assert_eq!(named.display_name(), "Slots");
    }

    #[test]
    fn host_strips_ipv6_brackets() {
        let target = Target::new(Url::parse("http://[::1]:8080/").unwrap(), None, vec![]);
        assert_eq!(target.host(), Some("::1"));

        let target = Target::new(Url::parse("http://example.com/").unwrap(), None, vec![]);
        assert_eq!(target.host(), Some("example.com"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let target: Target =
            serde_json::from_str(r#"{"url": "https://example.com/", "terms": ["a"]}"#).unwrap();
        assert_eq!(target.name, None);
        assert_eq!(target.terms, vec!["a".to_string()]);
        assert!(target.extract.is_empty());
    }
}
