//! Environment driven configuration.

use crate::dispatch::DEFAULT_RECIPIENT;
use crate::policy::{Policy, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_OUTBOUND_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `BIND_ADDR`
    pub bind_addr: String,
    /// `SENDGRID_API_KEY`, live email delivery is disabled without it.
    pub dispatcher_api_key: Option<String>,
    /// `CONTACT_RECIPIENT`
    pub recipient_address: String,
    /// `SEND_FROM`, the visitor's address is used as sender without it.
    pub sender_address: Option<String>,
    /// `REDIS_URL`, enables the shared rate limit store.
    pub shared_store_url: Option<String>,
    /// `RATE_WINDOW` in seconds.
    pub rate_window_seconds: u64,
    /// `RATE_MAX`
    pub rate_max_count: u64,
    /// `ALLOWED_ORIGINS`, comma separated. Empty allows every origin.
    pub allowed_origins: Vec<String>,
    /// `RECAPTCHA_SECRET`, enables challenge verification.
    pub challenge_secret: Option<String>,
    /// `SENTRY_DSN`, enables error reporting.
    pub error_monitoring_dsn: Option<String>,
    /// `OUTBOUND_TIMEOUT` in seconds, bounds every call to an external service.
    pub outbound_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            dispatcher_api_key: None,
            recipient_address: DEFAULT_RECIPIENT.to_owned(),
            sender_address: None,
            shared_store_url: None,
            rate_window_seconds: DEFAULT_WINDOW_SECONDS,
            rate_max_count: DEFAULT_MAX_REQUESTS,
            allowed_origins: Vec::new(),
            challenge_secret: None,
            error_monitoring_dsn: None,
            outbound_timeout: Duration::from_secs(DEFAULT_OUTBOUND_TIMEOUT_SECONDS),
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            dispatcher_api_key: var("SENDGRID_API_KEY"),
            recipient_address: var("CONTACT_RECIPIENT").unwrap_or(defaults.recipient_address),
            sender_address: var("SEND_FROM"),
            shared_store_url: var("REDIS_URL"),
            rate_window_seconds: parse("RATE_WINDOW", var("RATE_WINDOW"))?
                .unwrap_or(defaults.rate_window_seconds),
            rate_max_count: parse("RATE_MAX", var("RATE_MAX"))?
                .unwrap_or(defaults.rate_max_count),
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|list| split_list(&list))
                .unwrap_or_default(),
            challenge_secret: var("RECAPTCHA_SECRET"),
            error_monitoring_dsn: var("SENTRY_DSN"),
            outbound_timeout: parse("OUTBOUND_TIMEOUT", var("OUTBOUND_TIMEOUT"))?
                .map_or(defaults.outbound_timeout, Duration::from_secs),
        })
    }

    pub fn policy(&self) -> Policy {
        Policy::from_secs(self.rate_window_seconds, self.rate_max_count)
    }
}

fn parse<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .map(|value| {
            value.parse().map_err(|e: T::Err| Error::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
