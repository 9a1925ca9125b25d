//! Configuration loading (spec.md §6.3): lease duration, reaper interval,
//! default max attempts, and the three role token sets.
//!
//! Token sets support rotation — both a "single" and a "CSV" binding
//! contribute to the set; duplicates are coalesced via a `HashSet`. Startup
//! fails if any of the three role sets ends up empty, using the teacher's
//! `ActionableError`-style "what happened, how to fix it" message.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::auth::TokenRoles;
use crate::engine::EngineConfig;

const DEFAULT_LEASE_DURATION_SECS: u64 = 300;
const DEFAULT_REAPER_INTERVAL_MS: u64 = 30_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub lease_duration: Duration,
    pub reaper_interval: Duration,
    pub default_max_attempts: u32,
    pub token_roles: TokenRoles,
}

impl Config {
    /// Resolves every setting from environment variables, merging each
    /// role's single-token and CSV bindings into one coalesced set.
    ///
    /// # Errors
    ///
    /// Returns an actionable message (not a panic) if any role's token set
    /// is empty after merging.
    pub fn from_env() -> Result<Self, String> {
        let lease_duration = Duration::from_secs(
            env_parse("SPINE_LEASE_DURATION_SECS").unwrap_or(DEFAULT_LEASE_DURATION_SECS),
        );
        let reaper_interval = Duration::from_millis(
            env_parse("SPINE_REAPER_INTERVAL_MS").unwrap_or(DEFAULT_REAPER_INTERVAL_MS),
        );
        let default_max_attempts =
            env_parse("SPINE_DEFAULT_MAX_ATTEMPTS").unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let head = merged_token_set("SPINE_HEAD_TOKEN", "SPINE_HEAD_TOKENS")?;
        let left_claw = merged_token_set("SPINE_LEFT_CLAW_TOKEN", "SPINE_LEFT_CLAW_TOKENS")?;
        let right_claw = merged_token_set("SPINE_RIGHT_CLAW_TOKEN", "SPINE_RIGHT_CLAW_TOKENS")?;

        Ok(Self {
            lease_duration,
            reaper_interval,
            default_max_attempts,
            token_roles: TokenRoles::new(head, left_claw, right_claw),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            lease_duration: chrono::Duration::from_std(self.lease_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_LEASE_DURATION_SECS as i64)),
            default_max_attempts: self.default_max_attempts,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Merges `<single_key>` (one token) and `<csv_key>` (comma-separated tokens)
/// into one set, trimming whitespace and dropping empty entries. Fails if
/// the result is empty.
fn merged_token_set(single_key: &str, csv_key: &str) -> Result<HashSet<String>, String> {
    let mut tokens = HashSet::new();

    if let Ok(single) = env::var(single_key) {
        let trimmed = single.trim();
        if !trimmed.is_empty() {
            tokens.insert(trimmed.to_string());
        }
    }

    if let Ok(csv) = env::var(csv_key) {
        for token in csv.split(',') {
            let trimmed = token.trim();
            if !trimmed.is_empty() {
                tokens.insert(trimmed.to_string());
            }
        }
    }

    if tokens.is_empty() {
        return Err(format!(
            "no tokens configured for this role: set ${single_key} and/or ${csv_key}\n\n\
             Startup requires every role (head, left-claw, right-claw) to have at least\n\
             one token. Set the single-token variable, the comma-separated variable, or both."
        ));
    }

    Ok(tokens)
}
