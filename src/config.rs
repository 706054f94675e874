use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::MssqlConnectionError;

/// Default SQL Server TCP port.
pub const DEFAULT_PORT: u16 = 1433;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:jdbc:(?:jtds:)?sqlserver://)?(?P<host>[^:/;\\]+)(?:\\(?P<instance>[^:/;]+))?(?::(?P<port>\d+))?(?:/(?P<database>[^;]*))?(?P<props>(?:;[^;]*)*)$",
    )
    .expect("static SQL Server URL pattern is valid")
});

/// Everything needed to (re-)establish the single connection.
///
/// Held by the [`ConnectionManager`](crate::ConnectionManager) from `connect`
/// until the next `connect`. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub instance_name: Option<String>,
    pub username: String,
    pub password: String,
    /// Deadline for establishing a connection. Zero disables the deadline.
    pub timeout: Duration,
    /// Optional deadline for each query/execute step.
    pub query_timeout: Option<Duration>,
    pub trust_cert: bool,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            database: None,
            instance_name: None,
            username: username.into(),
            password: password.into(),
            timeout,
            query_timeout: None,
            trust_cert: true,
        }
    }

    #[must_use]
    pub fn builder(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(host, username, password)
    }

    /// Parse a connection URL as handed over by the host application.
    ///
    /// Accepts `jdbc:jtds:sqlserver://host[:port][/database][;key=value]...`,
    /// `jdbc:sqlserver://host[:port][;databaseName=db]`, and bare
    /// `host[\instance][:port]` forms.
    ///
    /// # Errors
    /// Returns `MssqlConnectionError::ConfigError` if the URL does not parse
    /// or the port is out of range.
    pub fn from_url(
        url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MssqlConnectionError> {
        let caps = URL_PATTERN.captures(url.trim()).ok_or_else(|| {
            MssqlConnectionError::ConfigError(format!("unrecognized connection URL: {url}"))
        })?;

        let mut config = Self::new(&caps["host"], username, password, timeout);

        if let Some(port) = caps.name("port") {
            config.port = port.as_str().parse().map_err(|e| {
                MssqlConnectionError::ConfigError(format!("invalid port in {url}: {e}"))
            })?;
        }
        config.instance_name = caps.name("instance").map(|m| m.as_str().to_string());
        config.database = caps
            .name("database")
            .map(|m| m.as_str())
            .filter(|db| !db.is_empty())
            .map(str::to_string);

        let props = caps.name("props").map_or("", |m| m.as_str());
        for prop in props.split(';').filter(|p| !p.trim().is_empty()) {
            let Some((key, value)) = prop.split_once('=') else {
                return Err(MssqlConnectionError::ConfigError(format!(
                    "malformed property '{prop}' in connection URL"
                )));
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "databasename" | "database" => config.database = Some(value.to_string()),
                "instance" | "instancename" => config.instance_name = Some(value.to_string()),
                "trustservercertificate" => {
                    config.trust_cert = value.eq_ignore_ascii_case("true");
                }
                other => tracing::debug!(property = other, "ignoring connection URL property"),
            }
        }

        Ok(config)
    }

    /// `host:port` as used in log lines.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match &self.instance_name {
            Some(instance) => format!("{}\\{}:{}", self.host, instance, self.port),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("instance_name", &self.instance_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("query_timeout", &self.query_timeout)
            .field("trust_cert", &self.trust_cert)
            .finish()
    }
}

/// Fluent builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            config: ConnectionConfig::new(host, username, password, Duration::ZERO),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: impl Into<String>) -> Self {
        self.config.instance_name = Some(instance_name.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn query_timeout(mut self, query_timeout: Option<Duration>) -> Self {
        self.config.query_timeout = query_timeout;
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust_cert: bool) -> Self {
        self.config.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionConfig {
        self.config
    }
}
