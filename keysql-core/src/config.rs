use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Default per-call timeout applied when the caller supplies no context
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable consulted when the connection string carries no usable timeout
pub const TIMEOUT_ENV: &str = "KEYSQL_TIMEOUT";

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout synthesized for every remote call that has no caller-supplied context
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a configuration from a `key=value;key=value` connection string.
    ///
    /// Recognized parameters (case-insensitive):
    /// - `TIMEOUT` (alias `T`): per-call timeout in milliseconds.
    ///
    /// An absent, non-numeric or negative timeout falls back to the
    /// `KEYSQL_TIMEOUT` environment variable, then to [`DEFAULT_TIMEOUT`].
    /// Unknown parameters are ignored; endpoint and credential handling belong
    /// to whoever builds the executor.
    pub fn from_conn_string(conn_str: &str) -> Self {
        let params = parse_conn_string(conn_str);
        let timeout_ms = param_value(
            &params,
            &["TIMEOUT", "T"],
            &[TIMEOUT_ENV],
            |ms: &i64| *ms >= 0,
            DEFAULT_TIMEOUT.as_millis() as i64,
        );
        Self::new().with_timeout(Duration::from_millis(timeout_ms as u64))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Split a connection string into upper-cased keys and raw values.
/// A parameter without `=` maps to an empty value.
pub fn parse_conn_string(conn_str: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for part in conn_str.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((k, v)) => (k, v),
            None => (part, ""),
        };
        params.insert(key.trim().to_uppercase(), value.trim().to_string());
    }
    params
}

/// Resolve a typed parameter: first the named parameters, then the named
/// environment variables, then the default. Values that fail to parse or that
/// the validator rejects are skipped.
pub fn param_value<T, F>(
    params: &HashMap<String, String>,
    pnames: &[&str],
    enames: &[&str],
    validator: F,
    default: T,
) -> T
where
    T: FromStr,
    F: Fn(&T) -> bool,
{
    let from_params = pnames.iter().filter_map(|name| params.get(*name).cloned());
    let from_env = enames.iter().filter_map(|name| std::env::var(name).ok());
    from_params
        .chain(from_env)
        .filter_map(|raw| raw.trim().parse::<T>().ok())
        .find(|v| validator(v))
        .unwrap_or(default)
}
