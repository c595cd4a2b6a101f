//! Content classification.
//!
//! A [`ContentMatcher`] decides whether a fetched payload exhibits the
//! condition of interest and extracts the fields that identify it. The
//! default strategy is [`KeywordMatcher`].

use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;
use regex::Regex;
use thiserror::Error;

use crate::models::{ExtractedFields, Target};

/// Classification of one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Whether the condition of interest is present.
    pub found: bool,
    /// Identifying fields. Empty when not found.
    pub fields: ExtractedFields,
}

/// Errors raised while building a matcher.
#[derive(Debug, Error)]
pub enum MatcherError {
    /// An extraction pattern does not compile.
    #[error("invalid pattern for field '{field}' of target {target}: {source}")]
    InvalidPattern {
        /// Identifier of the target.
        target: String,
        /// Name of the field.
        field: String,
        /// The compile error.
        #[source]
        source: regex::Error,
    },
}

/// Classifies a payload against a target's criteria. Must be deterministic.
#[cfg_attr(test, automock)]
pub trait ContentMatcher: Send + Sync {
    /// Evaluates `payload` for `target`.
    fn evaluate(&self, payload: &str, target: &Target) -> MatchOutcome;
}

/// Case-insensitive keyword matching with regex field extraction.
///
/// With exactly two terms, the first is a broad term that may appear on the
/// page regardless of the condition and the second is the specific term that
/// signals it: only the specific term decides. With any other number of
/// terms, all of them must be present.
#[derive(Debug, Default)]
pub struct KeywordMatcher {
    extractors: HashMap<String, Vec<(String, Regex)>>,
}

impl KeywordMatcher {
    /// Compiles the extraction patterns of every target.
    pub fn new(targets: &[Target]) -> Result<Self, MatcherError> {
        let mut extractors = HashMap::new();
        for target in targets {
            let compiled = target
                .extract
                .iter()
                .map(|(field, pattern)| {
                    Regex::new(pattern).map(|regex| (field.clone(), regex)).map_err(|source| {
                        MatcherError::InvalidPattern {
                            target: target.id().to_string(),
                            field: field.clone(),
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            extractors.insert(target.id().to_string(), compiled);
        }
        Ok(Self { extractors })
    }

    fn terms_present(payload: &str, terms: &[String]) -> bool {
        let haystack = payload.to_lowercase();
        let terms: Vec<String> = terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();

        match terms.as_slice() {
            [] => false,
            [_broad, specific] => haystack.contains(specific.as_str()),
            all => all.iter().all(|term| haystack.contains(term.as_str())),
        }
    }

    fn extract(&self, payload: &str, target: &Target) -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        let Some(extractors) = self.extractors.get(target.id()) else {
            return fields;
        };
        for (field, regex) in extractors {
            let Some(captures) = regex.captures(payload) else {
                continue;
            };
            let value = captures.get(1).or_else(|| captures.get(0)).map(|m| m.as_str().trim());
            if let Some(value) = value.filter(|value| !value.is_empty()) {
                fields.insert(field.clone(), value.to_string());
            }
        }
        fields
    }
}

impl ContentMatcher for KeywordMatcher {
    fn evaluate(&self, payload: &str, target: &Target) -> MatchOutcome {
        if !Self::terms_present(payload, &target.terms) {
            return MatchOutcome::default();
        }
        MatchOutcome { found: true, fields: self.extract(payload, target) }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn target(terms: &[&str]) -> Target {
        Target::new(
            Url::parse("https://example.com/appointments").unwrap(),
            None,
            terms.iter().map(|term| term.to_string()).collect(),
        )
    }

    #[test]
    fn single_term_is_case_insensitive() {
        let target = target(&["Available"]);
        let matcher = KeywordMatcher::new(&[target.clone()]).unwrap();

        assert!(matcher.evaluate("SLOTS AVAILABLE NOW", &target).found);
        assert!(!matcher.evaluate("fully booked", &target).found);
    }

    #[test]
    fn two_terms_use_broad_and_specific_rule() {
        let target = target(&["appointment", "available"]);
        let matcher = KeywordMatcher::new(&[target.clone()]).unwrap();

        assert!(!matcher.evaluate("Appointment booking is closed", &target).found);
        assert!(matcher.evaluate("Appointment available on Monday", &target).found);
        assert!(matcher.evaluate("available", &target).found);
    }

    #[test]
    fn three_terms_all_required() {
        let target = target(&["passport", "appointment", "available"]);
        let matcher = KeywordMatcher::new(&[target.clone()]).unwrap();

        assert!(matcher.evaluate("Passport appointment available", &target).found);
        assert!(!matcher.evaluate("Passport appointment closed", &target).found);
    }

    #[test]
    fn blank_terms_never_match() {
        let target = target(&["", "   "]);
        let matcher = KeywordMatcher::new(&[target.clone()]).unwrap();

        assert!(!matcher.evaluate("anything", &target).found);
    }

    #[test]
    fn extracts_fields_only_when_found() {
        let mut target = target(&["available"]);
        target.extract.insert("date".into(), r"Date:\s*(\d{4}-\d{2}-\d{2})".into());
        target.extract.insert("office".into(), r"Office \w+".into());
        target.extract.insert("missing".into(), r"Room (\d+)".into());
        let matcher = KeywordMatcher::new(&[target.clone()]).unwrap();

        let outcome = matcher.evaluate("Available! Date: 2024-05-01 at Office North", &target);
        assert!(outcome.found);
        assert_eq!(outcome.fields.get("date").map(String::as_str), Some("2024-05-01"));
        assert_eq!(outcome.fields.get("office").map(String::as_str), Some("Office North"));
        assert!(!outcome.fields.contains_key("missing"));

        let outcome = matcher.evaluate("Closed. Date: 2024-05-01", &target);
        assert_eq!(outcome, MatchOutcome::default());
    }

    #[test]
    fn invalid_pattern_fails_construction() {
        let mut target = target(&["x"]);
        target.extract.insert("date".into(), "(".into());

        let err = KeywordMatcher::new(&[target]).unwrap_err();
        assert!(matches!(err, MatcherError::InvalidPattern { ref field, .. } if field == "date"));
    }
}
