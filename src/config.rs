// src/config.rs

use std::{env, ops::RangeInclusive, str::FromStr};

use dotenvy::dotenv;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Default page size of the leaderboard.
pub const LEADERBOARD_DEFAULT_LIMIT: usize = 10;

/// Hard upper bound for a requested leaderboard size.
pub const LEADERBOARD_MAX_LIMIT: usize = 100;

/// How many times a submission recomputes its summary when answers keep
/// changing underneath it.
pub const SUBMIT_MAX_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Whether a published test is only reachable inside its scheduled window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Listed and attemptable only while `start_time <= now <= end_time`.
    Strict,
    /// Listed and attemptable at any time once published.
    AlwaysOpen,
}

impl FromStr for WindowPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "always_open" | "always-open" | "open" => Ok(Self::AlwaysOpen),
            _ => Err(()),
        }
    }
}

/// What the server does with a submission arriving after
/// `started_at + duration + grace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LateSubmission {
    /// Trust the client timer; no server-side check.
    Accept,
    /// Accept, but persist and report the attempt as late.
    Flag,
    /// Refuse with `DEADLINE_EXCEEDED`; the attempt stays in progress.
    Reject,
}

impl FromStr for LateSubmission {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "flag" => Ok(Self::Flag),
            "reject" => Ok(Self::Reject),
            _ => Err(()),
        }
    }
}

/// Upper bound for `SUBMIT_GRACE_SECONDS` (one day).
pub const SUBMIT_GRACE_MAX_SECONDS: i64 = 86_400;

/// Policy switches consumed by the attempt engine and the availability gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamPolicy {
    pub window: WindowPolicy,
    pub allow_retakes: bool,
    pub late_submission: LateSubmission,
    pub submit_grace_seconds: i64,
}

impl Default for ExamPolicy {
    fn default() -> Self {
        Self {
            window: WindowPolicy::AlwaysOpen,
            allow_retakes: true,
            late_submission: LateSubmission::Accept,
            submit_grace_seconds: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub log_dir: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub admin_name: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub exam: ExamPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", 7200)?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        let port = parsed("PORT", 3000)?;

        let cors_origins = parse_origins(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string()),
        )?;

        let defaults = ExamPolicy::default();
        let exam = ExamPolicy {
            window: parsed("TEST_WINDOW_POLICY", defaults.window)?,
            allow_retakes: parsed("ALLOW_RETAKES", defaults.allow_retakes)?,
            late_submission: parsed("LATE_SUBMISSION", defaults.late_submission)?,
            submit_grace_seconds: within(
                "SUBMIT_GRACE_SECONDS",
                parsed("SUBMIT_GRACE_SECONDS", defaults.submit_grace_seconds)?,
                0..=SUBMIT_GRACE_MAX_SECONDS,
            )?,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            log_dir,
            port,
            cors_origins,
            admin_name: env::var("ADMIN_NAME").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            exam,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn within<T>(key: &'static str, value: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

/// Splits a comma separated origin list; every entry must be an absolute URL.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| match Url::parse(origin) {
            Ok(_) => Ok(origin.trim_end_matches('/').to_string()),
            Err(_) => Err(ConfigError::Invalid {
                key: "CORS_ORIGINS",
                value: origin.to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_policy_parses_both_spellings() {
        assert_eq!("strict".parse::<WindowPolicy>(), Ok(WindowPolicy::Strict));
        assert_eq!("ALWAYS_OPEN".parse::<WindowPolicy>(), Ok(WindowPolicy::AlwaysOpen));
        assert_eq!("always-open".parse::<WindowPolicy>(), Ok(WindowPolicy::AlwaysOpen));
        assert!("sometimes".parse::<WindowPolicy>().is_err());
    }

    #[test]
    fn late_submission_parses() {
        assert_eq!("reject".parse::<LateSubmission>(), Ok(LateSubmission::Reject));
        assert_eq!(" Flag ".parse::<LateSubmission>(), Ok(LateSubmission::Flag));
        assert!("maybe".parse::<LateSubmission>().is_err());
    }

    #[test]
    fn origins_are_trimmed_and_validated() {
        let origins = parse_origins("http://localhost:5173/, https://exam.example.com").unwrap();
        assert_eq!(origins, vec!["http://localhost:5173", "https://exam.example.com"]);

        let err = parse_origins("http://ok.example, not a url").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CORS_ORIGINS", .. }));
    }

    #[test]
    fn grace_period_is_bounded() {
        let range = 0..=SUBMIT_GRACE_MAX_SECONDS;
        assert_eq!(within("SUBMIT_GRACE_SECONDS", 30, range.clone()).unwrap(), 30);
        assert_eq!(within("SUBMIT_GRACE_SECONDS", 0, range.clone()).unwrap(), 0);

        for bad in [-1, SUBMIT_GRACE_MAX_SECONDS + 1, 9_223_372_036_854_775] {
            let err = within("SUBMIT_GRACE_SECONDS", bad, range.clone()).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid { key: "SUBMIT_GRACE_SECONDS", ref value } if *value == bad.to_string()
            ));
        }
    }

    #[test]
    fn default_policy_preserves_open_retakes() {
        let policy = ExamPolicy::default();
        assert_eq!(policy.window, WindowPolicy::AlwaysOpen);
        assert!(policy.allow_retakes);
        assert_eq!(policy.late_submission, LateSubmission::Accept);
    }
}
