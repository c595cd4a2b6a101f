//! `watchpost check`: a one-shot poll of the configured targets.

use std::time::Instant;

use clap::Parser;
use serde_json::json;

use super::{CommandError, ConfigArgs};
use crate::{
    fetcher::{Fetcher, HttpFetcher},
    matcher::{ContentMatcher, KeywordMatcher},
    models::Target,
};

/// Arguments of `watchpost check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Only check the target with this URL or name.
    #[arg(short, long)]
    target: Option<String>,
}

/// Keeps the targets whose URL or name equals `selector`.
pub fn select_targets(targets: Vec<Target>, selector: Option<&str>) -> Result<Vec<Target>, CommandError> {
    let Some(selector) = selector else {
        return Ok(targets);
    };
    let selected: Vec<Target> = targets
        .into_iter()
        .filter(|target| target.id() == selector || target.name.as_deref() == Some(selector))
        .collect();
    if selected.is_empty() {
        return Err(CommandError::UnknownTarget(selector.to_string()));
    }
    Ok(selected)
}

/// Polls every selected target once and prints one JSON line per target.
/// Sends nothing and does not touch the state file.
pub async fn execute(args: CheckArgs) -> Result<(), CommandError> {
    let config = args.config.load_config()?;
    let targets = select_targets(args.config.load_targets(&config)?, args.target.as_deref())?;

    let fetcher = HttpFetcher::new(config.request_timeout_secs, config.user_agents.clone())?;
    let matcher = KeywordMatcher::new(&targets)?;

    for target in &targets {
        let started = Instant::now();
        let line = match fetcher.fetch(&target.url).await {
            Ok(payload) => {
                let outcome = matcher.evaluate(&payload, target);
                json!({
                    "target": target.id(),
                    "name": target.display_name(),
                    "reachable": true,
                    "found": outcome.found,
                    "fields": outcome.fields,
                    "latency_ms": started.elapsed().as_millis() as u64,
                })
            }
            Err(e) => json!({
                "target": target.id(),
                "name": target.display_name(),
                "reachable": false,
                "error": e.to_string(),
                "latency_ms": started.elapsed().as_millis() as u64,
            }),
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TargetBuilder;

    fn targets() -> Vec<Target> {
        vec![
            TargetBuilder::new().url("https://a.example.com/").name("Alpha").build(),
            TargetBuilder::new().url("https://b.example.com/").build(),
        ]
    }

    #[test]
    fn selects_all_without_selector() {
        assert_eq!(select_targets(targets(), None).unwrap().len(), 2);
    }

    #[test]
    fn selects_by_name_or_url() {
        let by_name = select_targets(targets(), Some("Alpha")).unwrap();
        assert_eq!(by_name[0].id(), "https://a.example.com/");

        let by_url = select_targets(targets(), Some("https://b.example.com/")).unwrap();
        assert_eq!(by_url.len(), 1);
    }

    #[test]
    fn unknown_selector_is_an_error() {
        let err = select_targets(targets(), Some("Gamma")).unwrap_err();
        assert!(matches!(err, CommandError::UnknownTarget(name) if name == "Gamma"));
    }
}
