//! Connection options.

use chrono::{FixedOffset, Offset, Utc};
use no_panic::no_panic;
use url::Url;

use crate::error::Error;
use crate::strategy::SessionFlags;

/// Connection options for MariaDB.
///
/// `host`, `port`, `user`, `password` and `database` are not used by this
/// crate. They are parsed from the URL for the code that opens the stream
/// and runs the handshake before handing the session to a
/// [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the MariaDB server.
    ///
    /// Default: `3306`
    pub port: u16,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Password for authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Database name to use.
    ///
    /// Default: `None`
    pub database: Option<String>,

    /// Use server-side prepared statements. When false, statements are sent
    /// as text queries with interpolated parameters.
    ///
    /// Default: `true`
    pub use_server_prep_stmts: bool,

    /// Allow `COM_STMT_BULK_EXECUTE` for batches.
    ///
    /// Default: `true`
    pub use_bulk_stmts: bool,

    /// Allow `LOAD DATA LOCAL INFILE`. Batches fall back to one round-trip
    /// per row when the server allows it too.
    ///
    /// Default: `false`
    pub allow_local_infile: bool,

    /// Number of idle prepared statements kept per connection.
    ///
    /// Default: `250`
    pub prep_stmt_cache_size: usize,

    /// Send microseconds of temporal parameters.
    ///
    /// Default: `true`
    pub use_fractional_seconds: bool,

    /// Zone used to render TIME parameters; `None` means UTC.
    ///
    /// Default: `None`
    pub timezone: Option<FixedOffset>,

    /// Additional connection parameters.
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,
}

impl Default for Opts {
    #[no_panic]
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 3306,
            user: String::new(),
            password: None,
            database: None,
            use_server_prep_stmts: true,
            use_bulk_stmts: true,
            allow_local_infile: false,
            prep_stmt_cache_size: 250,
            use_fractional_seconds: true,
            timezone: None,
            params: Vec::new(),
        }
    }
}

impl Opts {
    /// Host and port, ready for [`std::net::TcpStream::connect`].
    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// Zone used to render TIME parameters.
    pub fn time_zone(&self) -> FixedOffset {
        self.timezone.unwrap_or_else(|| Utc.fix())
    }

    /// Combine negotiated server capabilities with these options.
    pub fn session_flags(&self, server_capabilities: u64) -> SessionFlags {
        SessionFlags::from_capabilities(
            server_capabilities,
            self.allow_local_infile,
            self.use_bulk_stmts,
        )
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "true" | "True" | "1" | "yes" | "on" => Ok(true),
        "false" | "False" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidUsage(format!("Invalid {key}: {value}"))),
    }
}

fn parse_timezone(value: &str) -> Result<Option<FixedOffset>, Error> {
    match value {
        "UTC" | "utc" | "Z" => Ok(None),
        _ => value
            .parse::<FixedOffset>()
            .map(Some)
            .map_err(|e| Error::InvalidUsage(format!("Invalid timezone {value}: {e}"))),
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a MariaDB connection URL.
    ///
    /// Format: `mariadb://[user[:password]@]host[:port][/database][?param1=value1&param2=value2&..]`
    ///
    /// Supported query parameters:
    /// - `useServerPrepStmts`, `useBulkStmts`, `allowLocalInfile`,
    ///   `useFractionalSeconds`: true/True/1/yes/on or false/False/0/no/off
    /// - `prepStmtCacheSize`: number of idle prepared statements kept
    /// - `timezone`: `UTC`, `Z` or an offset such as `+02:00`
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if !["mariadb", "mysql"].contains(&url.scheme()) {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'mariadb://' or 'mysql://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(3306),
            user: url.username().to_string(),
            password: url.password().map(|s| s.to_string()),
            database: url
                .path()
                .strip_prefix('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "useServerPrepStmts" => {
                    opts.use_server_prep_stmts = parse_bool(&key, &value)?;
                }
                "useBulkStmts" => opts.use_bulk_stmts = parse_bool(&key, &value)?,
                "allowLocalInfile" => opts.allow_local_infile = parse_bool(&key, &value)?,
                "useFractionalSeconds" => {
                    opts.use_fractional_seconds = parse_bool(&key, &value)?;
                }
                "prepStmtCacheSize" => {
                    opts.prep_stmt_cache_size = value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid prepStmtCacheSize: {value}"))
                    })?;
                }
                "timezone" => opts.timezone = parse_timezone(&value)?,
                _ => {
                    opts.params.push((key.to_string(), value.to_string()));
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {e}")))?;
        Self::try_from(&url)
    }
}
