//! Server configuration.

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Environment variable that overrides `database_url`.
pub const DATABASE_URL_VAR: &str = "CREDITBOARD_DATABASE_URL";
/// Environment variable that overrides `identity_salt`.
pub const IDENTITY_SALT_VAR: &str = "CREDITBOARD_IDENTITY_SALT";

/// A duration written in a human-friendly way in the config file, like "8h" or
/// "15m".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn from_secs(secs: u64) -> HumanDuration {
        HumanDuration(Duration::from_secs(secs))
    }

    /// Convert into a `chrono::Duration`, for date arithmetic.
    pub fn to_chrono(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.0).map_err(|_| Error::DurationOutOfRange {
            duration: format!("{}s", self.0.as_secs()),
        })
    }
}

impl Deref for HumanDuration {
    type Target = Duration;

    fn deref(&self) -> &Duration {
        &self.0
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(de: D) -> std::result::Result<HumanDuration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(de)?;
        let duration = parse_duration::parse(&s).map_err(serde::de::Error::custom)?;

        // Anything we can't do date arithmetic with is a config mistake.
        chrono::Duration::from_std(duration).map_err(serde::de::Error::custom)?;

        Ok(HumanDuration(duration))
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, se: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        format!("{}s", self.0.as_secs()).serialize(se)
    }
}

/// Configuration for a creditboard instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind to.
    pub address: String,
    /// Port to bind to.
    pub port: u16,
    /// URL to connect to the database.
    pub database_url: String,
    /// How long to wait for a pooled database connection.
    pub database_timeout: HumanDuration,
    /// File to log to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Minimum level of log messages: off, error, warn, info, debug or trace.
    pub log_level: String,
    /// Salt mixed into every visitor identity hash.
    pub identity_salt: String,
    /// The public URL of the site.
    pub site_url: String,
    /// Believe `X-Forwarded-For` when throttling logins. Only set this behind
    /// a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Serve sample data on some read paths when the database is unreachable.
    pub demo_mode: bool,
    /// Default number of items in a page.
    pub page_size: u32,
    /// The largest page a client may ask for.
    pub max_page_size: u32,
    /// How long an admin session lasts.
    pub session_lifetime: HumanDuration,
    /// Consecutive failed logins before a client is blocked.
    pub login_max_failures: u32,
    /// How long a blocked client has to wait.
    pub login_block_duration: HumanDuration,
    /// Failures further apart than this don't count as consecutive.
    pub login_failure_window: HumanDuration,
    /// How often a premium ad unit rotates.
    pub ad_rotation_interval: HumanDuration,
    /// How many candidates to consider when selecting an ad.
    pub ad_candidate_limit: u32,
}

impl Config {
    /// Open a config file at the given path.
    pub fn open<P>(path: P) -> Result<Config>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let msg = format!("Couldn't open config file at {}", path.display());

        let reader = File::open(path).map_err(|err| Error::from_io_error(err, msg))?;

        Config::from_reader(reader)
    }

    /// Read a config from YAML, apply environment overrides and validate it.
    pub fn from_reader<R>(reader: R) -> Result<Config>
    where
        R: std::io::Read,
    {
        let mut config: Config = serde_yaml::from_reader(reader)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Generate a new config file from default values.
    pub fn generate<W>(mut out: W) -> Result<()>
    where
        W: std::io::Write,
    {
        writeln!(&mut out, "# Configuration for creditboard")?;
        serde_yaml::to_writer(&mut out, &Config::default())?;
        writeln!(&mut out)?;
        Ok(())
    }

    /// Get the default location of the config file.
    pub fn default_path() -> PathBuf {
        if cfg!(debug_assertions) {
            PathBuf::from("contrib/dev-config.yaml")
        } else {
            PathBuf::from("/etc/creditboard/config.yaml")
        }
    }

    /// Override settings from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_VAR) {
            self.database_url = url;
        }

        if let Ok(salt) = std::env::var(IDENTITY_SALT_VAR) {
            self.identity_salt = salt;
        }
    }

    /// Check for values that would only fail later, at request time.
    pub fn validate(&self) -> Result<()> {
        if self.identity_salt.len() < 8 {
            return Err(Error::SaltTooShort);
        }

        self.level_filter()?;

        if self.page_size == 0 || self.max_page_size < self.page_size {
            return Err(Error::InvalidField {
                field: "page_size",
                reason: "must be between 1 and max_page_size".into(),
            });
        }

        if self.login_max_failures == 0 {
            return Err(Error::InvalidField {
                field: "login_max_failures",
                reason: "must be at least 1".into(),
            });
        }

        if self.ad_rotation_interval.as_secs() == 0 {
            return Err(Error::InvalidField {
                field: "ad_rotation_interval",
                reason: "must be at least one second".into(),
            });
        }

        Ok(())
    }

    /// The configured log level.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level).map_err(|_| Error::UnknownLogLevel {
            level: self.log_level.clone(),
        })
    }

    /// Dump configuration info to the log.
    pub fn debug_log(&self) {
        use log::debug;

        debug!("  address {}", self.address);
        debug!("  port {}", self.port);
        debug!("  database url {}", self.database_url);
        debug!("  database timeout {:?}", *self.database_timeout);
        debug!("  site url {}", self.site_url);
        debug!("  trust X-Forwarded-For {}", self.trust_forwarded_for);
        debug!("  demo mode {}", self.demo_mode);
        debug!("  page size {} (max {})", self.page_size, self.max_page_size);
        debug!("  session lifetime {:?}", *self.session_lifetime);
        debug!(
            "  login lockout after {} failures for {:?}",
            self.login_max_failures, *self.login_block_duration
        );
        debug!("  ad rotation interval {:?}", *self.ad_rotation_interval);
        if let Some(ref log_file) = self.log_file {
            debug!("  log file {}", log_file.display());
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        let base = Config {
            address: "0.0.0.0".into(),
            port: 8000,
            database_url: "postgres://creditboard:@localhost/creditboard".into(),
            database_timeout: HumanDuration::from_secs(5),
            log_file: None,
            log_level: "debug".into(),
            identity_salt: "change-this-salt".into(),
            site_url: "http://localhost:8000".into(),
            trust_forwarded_for: false,
            demo_mode: false,
            page_size: 20,
            max_page_size: 100,
            session_lifetime: HumanDuration::from_secs(8 * 60 * 60),
            login_max_failures: 5,
            login_block_duration: HumanDuration::from_secs(15 * 60),
            login_failure_window: HumanDuration::from_secs(15 * 60),
            ad_rotation_interval: HumanDuration::from_secs(5),
            ad_candidate_limit: 10,
        };

        if cfg!(debug_assertions) {
            Config {
                demo_mode: true,
                ..base
            }
        } else {
            Config {
                log_file: Some(PathBuf::from("/var/log/creditboard/creditboard.log")),
                log_level: "info".into(),
                ..base
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_human_readable() -> Result<()> {
        let yaml = "identity_salt: \"0123456789\"\n\
                    session_lifetime: 8h\n\
                    login_block_duration: 15m\n\
                    ad_rotation_interval: 5s\n";

        let config = Config::from_reader(yaml.as_bytes())?;

        assert_eq!(*config.session_lifetime, Duration::from_secs(8 * 60 * 60));
        assert_eq!(*config.login_block_duration, Duration::from_secs(15 * 60));
        assert_eq!(*config.ad_rotation_interval, Duration::from_secs(5));
        assert_eq!(config.session_lifetime.to_chrono()?, chrono::Duration::hours(8));

        Ok(())
    }

    #[test]
    fn missing_keys_take_defaults() -> Result<()> {
        let config = Config::from_reader("identity_salt: abcdefgh".as_bytes())?;

        assert_eq!(config.port, 8000);
        assert_eq!(config.login_max_failures, 5);
        assert_eq!(config.ad_candidate_limit, 10);

        Ok(())
    }

    #[test]
    fn short_salt_is_rejected() {
        let result = Config::from_reader("identity_salt: short".as_bytes());

        assert!(matches!(result, Err(Error::SaltTooShort)));
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let yaml = "identity_salt: abcdefgh\nlog_level: loud";

        assert!(matches!(
            Config::from_reader(yaml.as_bytes()),
            Err(Error::UnknownLogLevel { .. })
        ));
    }

    #[test]
    fn generated_config_parses() -> Result<()> {
        let mut out = Vec::new();
        Config::generate(&mut out)?;

        let config = Config::from_reader(out.as_slice())?;
        assert_eq!(config.session_lifetime, Config::default().session_lifetime);

        Ok(())
    }
}
