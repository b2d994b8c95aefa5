use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Named parameters used to open a [`super::Session`].
///
/// Every field can come from a command-line flag or from the matching `SNOWFLAKE_*`
/// environment variable. The seven identity fields are required.
#[derive(Clone, clap::Args)]
pub struct ConnectionParams {
    /// Snowflake login name
    #[arg(long = "user", env = "SNOWFLAKE_USER")]
    pub user: String,

    /// Snowflake password
    #[arg(long = "password", env = "SNOWFLAKE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Account identifier, e.g. `xy12345.us-east-1` or `myorg-myaccount`
    #[arg(long = "account", env = "SNOWFLAKE_ACCOUNT")]
    pub account: String,

    /// Virtual warehouse used to run the load
    #[arg(long = "warehouse", env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: String,

    /// Destination database
    #[arg(long = "database", env = "SNOWFLAKE_DATABASE")]
    pub database: String,

    /// Destination schema
    #[arg(long = "schema", env = "SNOWFLAKE_SCHEMA")]
    pub schema: String,

    /// Role used for the session
    #[arg(long = "role", env = "SNOWFLAKE_ROLE")]
    pub role: String,

    /// Base URL override (defaults to https://<account>.snowflakecomputing.com)
    #[arg(long = "host", env = "SNOWFLAKE_HOST")]
    pub host: Option<String>,

    /// Per-request timeout in seconds; requests never time out when unset
    #[arg(long = "request-timeout-secs", env = "SNOWFLAKE_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,
}

impl ConnectionParams {
    /// Reject empty identity fields before any network activity.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("user", &self.user),
            ("password", &self.password),
            ("account", &self.account),
            ("warehouse", &self.warehouse),
            ("database", &self.database),
            ("schema", &self.schema),
            ("role", &self.role),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::config(format!(
                "missing connection parameters: {}",
                missing.join(", ")
            )));
        }
        if let Some(host) = &self.host {
            if !(host.starts_with("http://") || host.starts_with("https://")) {
                return Err(Error::config(format!(
                    "host must be an http(s) URL, got '{host}'"
                )));
            }
        }
        Ok(())
    }

    /// Base URL of the account endpoint, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account.trim()),
        }
    }

    /// Account name sent at login: the identifier up to the first `.` (region suffix dropped).
    pub fn account_name(&self) -> &str {
        let account = self.account.trim();
        account.split('.').next().unwrap_or(account)
    }

    pub(crate) fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("host", &self.host)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
