//! Backend connection parameters
//!
//! Built from what the pooling proxy reports for each pool entry: the
//! proxy knows host and port, the operator supplies database name and
//! user. Values go straight into `postgres::Config` through its builder,
//! so names containing spaces or quotes need no escaping.

use postgres::Config;

/// Where and as whom to connect to one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    host: Option<String>,
    port: u16,
    dbname: String,
    user: String,
}

impl Dsn {
    /// Build backend connection parameters.
    ///
    /// `host` is omitted when `None` or empty, which makes the client fall
    /// back to the local socket.
    pub fn backend(host: Option<&str>, port: u16, dbname: &str, user: &str) -> Self {
        Self {
            host: host.filter(|h| !h.is_empty()).map(str::to_string),
            port,
            dbname: dbname.to_string(),
            user: user.to_string(),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Short `host:port/dbname` label for log lines.
    pub fn label(&self) -> String {
        format!(
            "{}:{}/{}",
            self.host().unwrap_or("local"),
            self.port,
            self.dbname
        )
    }

    pub fn to_config(&self) -> Config {
        let mut config = Config::new();
        if let Some(host) = &self.host {
            config.host(host);
        }
        config.port(self.port).dbname(&self.dbname).user(&self.user);
        config
    }
}
