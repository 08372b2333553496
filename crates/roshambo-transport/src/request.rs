//! The request line a client opened its connection with.
//!
//! WebSocket clients address a room through the URL they upgrade on,
//! e.g. `/start/5f0c…?name=alice&player_hash=ab12…`. The transport keeps
//! the path and the decoded query pairs so higher layers never touch raw
//! HTTP types.

/// Path and decoded query parameters of an incoming connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    path: String,
    query: Vec<(String, String)>,
}

impl ConnectRequest {
    /// Builds a request from a raw path and an optional raw query string.
    ///
    /// The query is `application/x-www-form-urlencoded`: keys and values
    /// are percent-decoded and `+` becomes a space. A query that cannot be
    /// decoded is treated as empty.
    pub fn new(path: &str, query: Option<&str>) -> Self {
        let raw = query.unwrap_or_default();
        let query = serde_urlencoded::from_str::<Vec<(String, String)>>(raw).unwrap_or_else(|e| {
            tracing::debug!(query = raw, error = %e, "ignoring undecodable query");
            Vec::new()
        });

        Self {
            path: path.to_string(),
            query,
        }
    }

    /// The request path, e.g. `/start/5f0c…`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty path segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// The first value supplied for `key`, if any.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
