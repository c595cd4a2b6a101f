//! Startup validation of the application configuration and the target list.
//!
//! Every check runs and all problems are reported together, so a broken
//! configuration can be fixed in one pass.

use std::{collections::HashSet, time::Duration};

use regex::Regex;
use thiserror::Error;

use super::{AppConfig, NotifierConfig};
use crate::models::Target;

/// All problems found in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid configuration: {}", .problems.join("; "))]
pub struct ConfigValidationError {
    /// One entry per problem.
    pub problems: Vec<String>,
}

fn into_result(problems: Vec<String>) -> Result<(), ConfigValidationError> {
    if problems.is_empty() { Ok(()) } else { Err(ConfigValidationError { problems }) }
}

fn check_recipients(field: &str, recipients: &[String], problems: &mut Vec<String>) {
    for recipient in recipients {
        if !recipient.contains('@') {
            problems.push(format!("{field}: '{recipient}' is not an email address"));
        }
    }
}

impl AppConfig {
    /// Validates the settings that have a meaningful range.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut problems = Vec::new();

        if self.check_interval_secs < Duration::from_secs(5) {
            problems.push("check_interval_secs must be at least 5".to_string());
        }
        let timeout = self.request_timeout_secs;
        if timeout < Duration::from_secs(1) || timeout > Duration::from_secs(60) {
            problems.push("request_timeout_secs must be between 1 and 60".to_string());
        }
        if self.hourly_notification_limit < 1 {
            problems.push("hourly_notification_limit must be at least 1".to_string());
        }
        if self.daily_notification_limit_per_target < 1 {
            problems.push("daily_notification_limit_per_target must be at least 1".to_string());
        }
        if self.daily_error_notification_limit_per_target < 1 {
            problems
                .push("daily_error_notification_limit_per_target must be at least 1".to_string());
        }
        let ttl_minutes = self.dns_cache_ttl_minutes.as_secs() / 60;
        if !(1..=1440).contains(&ttl_minutes) {
            problems.push("dns_cache_ttl_minutes must be between 1 and 1440".to_string());
        }
        if !(-12..=14).contains(&self.time_offset_hours) {
            problems.push("time_offset_hours must be between -12 and 14".to_string());
        }
        if self.user_agents.iter().all(|agent| agent.trim().is_empty()) {
            problems.push("user_agents must contain at least one non-empty entry".to_string());
        }
        check_recipients("recipients", &self.recipients, &mut problems);
        check_recipients("error_recipients", &self.error_recipients, &mut problems);
        if let NotifierConfig::Webhook(webhook) = &self.notifier {
            if !matches!(webhook.url.scheme(), "http" | "https") {
                problems.push("notifier.url must use http or https".to_string());
            }
            if webhook.secret.as_deref().is_some_and(str::is_empty) {
                problems.push("notifier.secret must not be empty when set".to_string());
            }
        }

        into_result(problems)
    }
}

/// Validates the target list.
pub fn validate_targets(targets: &[Target]) -> Result<(), ConfigValidationError> {
    let mut problems = Vec::new();

    if targets.is_empty() {
        problems.push("at least one target must be configured".to_string());
    }

    let mut seen = HashSet::new();
    for (index, target) in targets.iter().enumerate() {
        let label = format!("targets[{index}] ({})", target.id());

        if !matches!(target.url.scheme(), "http" | "https") {
            problems.push(format!("{label}: url must use http or https"));
        }
        if target.url.host_str().is_none() {
            problems.push(format!("{label}: url has no host"));
        }
        if !seen.insert(target.id()) {
            problems.push(format!("{label}: duplicate url"));
        }
        if target.terms.iter().all(|term| term.trim().is_empty()) {
            problems.push(format!("{label}: at least one non-empty search term is required"));
        }
        for (field, pattern) in &target.extract {
            if let Err(e) = Regex::new(pattern) {
                problems.push(format!("{label}: invalid pattern for field '{field}': {e}"));
            }
        }
    }

    into_result(problems)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn target(url: &str, terms: &[&str]) -> Target {
        Target::new(Url::parse(url).unwrap(), None, terms.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn collects_all_config_problems() {
        let config = AppConfig::builder()
            .check_interval(Duration::from_secs(1))
            .request_timeout(Duration::from_secs(120))
            .hourly_notification_limit(0)
            .recipients(vec!["ops@example.com".into(), "not-an-address".into()])
            .time_offset_hours(20)
            .build();

        let err = config.validate().unwrap_err();

        assert_eq!(err.problems.len(), 5);
        assert!(err.to_string().starts_with("invalid configuration: "));
        assert!(err.problems.iter().any(|p| p.contains("not-an-address")));
    }

    #[test]
    fn valid_targets_pass() {
        let targets = vec![
            target("https://example.com/a", &["open"]),
            target("http://example.com/b", &["broad", "specific"]),
        ];
        assert!(validate_targets(&targets).is_ok());
    }

    #[test]
    fn empty_target_list_is_rejected() {
        let err = validate_targets(&[]).unwrap_err();
        assert_eq!(err.problems, vec!["at least one target must be configured".to_string()]);
    }

    #[test]
    fn rejects_bad_targets() {
        let mut with_bad_regex = target("https://example.com/c", &["x"]);
        with_bad_regex.extract.insert("date".into(), "(unclosed".into());

        let targets = vec![
            target("https://example.com/a", &["open"]),
            target("https://example.com/a", &["open"]),
            target("ftp://example.com/b", &["open"]),
            target("https://example.com/d", &["", "  "]),
            with_bad_regex,
        ];

        let err = validate_targets(&targets).unwrap_err();

        assert_eq!(err.problems.len(), 4);
        assert!(err.problems[0].contains("duplicate url"));
        assert!(err.problems[1].contains("http or https"));
        assert!(err.problems[2].contains("search term"));
        assert!(err.problems[3].contains("invalid pattern for field 'date'"));
    }
}
