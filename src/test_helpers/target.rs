//! A builder for creating `Target` instances in tests.

use std::collections::BTreeMap;

use url::Url;

use crate::models::Target;

/// A builder for creating `Target` instances in tests.
pub struct TargetBuilder {
    url: String,
    name: Option<String>,
    terms: Vec<String>,
    extract: BTreeMap<String, String>,
}

impl Default for TargetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetBuilder {
    /// Creates a builder for `https://example.com/` looking for `available`.
    pub fn new() -> Self {
        Self {
            url: "https://example.com/".to_string(),
            name: None,
            terms: vec!["available".to_string()],
            extract: BTreeMap::new(),
        }
    }

    /// Sets the URL of the target.
    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Sets the display name of the target.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Replaces the terms of the target.
    pub fn terms(mut self, terms: &[&str]) -> Self {
        self.terms = terms.iter().map(|term| term.to_string()).collect();
        self
    }

    /// Adds an extraction pattern.
    pub fn extract(mut self, field: &str, pattern: &str) -> Self {
        self.extract.insert(field.to_string(), pattern.to_string());
        self
    }

    /// Builds the `Target`. Panics on an invalid URL.
    pub fn build(self) -> Target {
        let url = Url::parse(&self.url).expect("test target URL must be valid");
        let mut target = Target::new(url, self.name, self.terms);
        target.extract = self.extract;
        target
    }
}
