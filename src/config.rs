//! Runtime configuration, read from `SALESDASH_*` environment variables.
//!
//! Mail credentials are only ever taken from the environment; nothing
//! secret is compiled into the binaries.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
/// One year.
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_ATTEMPTS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// TLS from the first byte (usually port 465).
    Wrapper,
}

impl FromStr for SmtpSecurity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpSecurity::StartTls),
            "wrapper" | "tls" | "ssl" => Ok(SmtpSecurity::Wrapper),
            _ => Err(()),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `Dashboard <reports@example.com>`.
    pub from: String,
    pub security: SmtpSecurity,
    /// Submission attempts before giving up, at least 1.
    pub attempts: u32,
}

// Keep the password out of logs.
impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .field("security", &self.security)
            .field("attempts", &self.attempts)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub bind: SocketAddr,
    pub session_ttl: Duration,
    pub max_upload_bytes: usize,
    pub currency_symbol: String,
    /// `None` when host, username or password is not provided.
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = parsed(&get, "SALESDASH_BIND", SocketAddr::from(([127, 0, 0, 1], 3000)))?;
        let ttl = parsed(&get, "SALESDASH_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        if ttl > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::Invalid {
                key: "SALESDASH_SESSION_TTL_SECS",
                value: ttl.to_string(),
            });
        }
        let max_upload_bytes = parsed(&get, "SALESDASH_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let currency_symbol = get("SALESDASH_CURRENCY").unwrap_or_else(|| "Ghs".to_string());

        let smtp = match (
            get("SALESDASH_SMTP_HOST"),
            get("SALESDASH_SMTP_USERNAME"),
            get("SALESDASH_SMTP_PASSWORD"),
        ) {
            (Some(host), Some(username), Some(password)) => {
                let port = parsed(&get, "SALESDASH_SMTP_PORT", DEFAULT_SMTP_PORT)?;
                let security = parsed(&get, "SALESDASH_SMTP_SECURITY", SmtpSecurity::StartTls)?;
                let attempts = parsed(&get, "SALESDASH_SMTP_ATTEMPTS", DEFAULT_SMTP_ATTEMPTS)?;
                if attempts == 0 {
                    return Err(ConfigError::Invalid {
                        key: "SALESDASH_SMTP_ATTEMPTS",
                        value: "0".to_string(),
                    });
                }
                Some(SmtpSettings {
                    from: get("SALESDASH_SMTP_FROM").unwrap_or_else(|| username.clone()),
                    host,
                    port,
                    username,
                    password,
                    security,
                    attempts,
                })
            }
            _ => None,
        };

        Ok(Config {
            bind,
            session_ttl: Duration::from_secs(ttl),
            max_upload_bytes,
            currency_symbol,
            smtp,
        })
    }
}

fn parsed<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(cfg.session_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.currency_symbol, "Ghs");
        assert!(cfg.smtp.is_none());
    }

    #[test]
    fn smtp_needs_host_user_and_password() {
        let partial = config(&[
            ("SALESDASH_SMTP_HOST", "smtp.example.com"),
            ("SALESDASH_SMTP_USERNAME", "reports@example.com"),
        ])
        .unwrap();
        assert!(partial.smtp.is_none());

        let full = config(&[
            ("SALESDASH_SMTP_HOST", "smtp.example.com"),
            ("SALESDASH_SMTP_USERNAME", "reports@example.com"),
            ("SALESDASH_SMTP_PASSWORD", "hunter2"),
            ("SALESDASH_SMTP_SECURITY", "wrapper"),
            ("SALESDASH_SMTP_PORT", "465"),
        ])
        .unwrap();
        let smtp = full.smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.security, SmtpSecurity::Wrapper);
        assert_eq!(smtp.from, "reports@example.com");
        assert_eq!(smtp.attempts, 3);
        assert!(!format!("{:?}", smtp).contains("hunter2"));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_eq!(
            config(&[("SALESDASH_BIND", "not an address")]),
            Err(ConfigError::Invalid {
                key: "SALESDASH_BIND",
                value: "not an address".to_string(),
            })
        );
        assert!(config(&[("SALESDASH_SESSION_TTL_SECS", "-5")]).is_err());
    }

    #[test]
    fn session_ttl_is_bounded() {
        let year = MAX_SESSION_TTL_SECS.to_string();
        let cfg = config(&[("SALESDASH_SESSION_TTL_SECS", &year)]).unwrap();
        assert_eq!(cfg.session_ttl, Duration::from_secs(MAX_SESSION_TTL_SECS));

        let huge = u64::MAX.to_string();
        assert_eq!(
            config(&[("SALESDASH_SESSION_TTL_SECS", &huge)]),
            Err(ConfigError::Invalid {
                key: "SALESDASH_SESSION_TTL_SECS",
                value: huge.clone(),
            })
        );
    }
}
