//! Common test fixtures for bbox-load tests.
//!
//! Response bodies mirror the two services the harness is pointed at: the
//! feature server (`total` only) and the query API (`total`, `query-time`,
//! `totalTime`).

/// Canned response bodies.
pub mod responses {
    /// Feature server response carrying only a feature count.
    pub const FEATURESERVER_OK: &str = r#"{"total": 42, "features": []}"#;

    /// Query API response with server-side timings.
    pub const QUERY_API_OK: &str = r#"{"total": 17, "query-time": 8, "totalTime": 11}"#;

    /// Query API response where the optional timings were omitted.
    pub const QUERY_API_NO_TIMINGS: &str = r#"{"total": 3}"#;

    /// Success body missing the feature count.
    pub const MISSING_TOTAL: &str = r#"{"features": [], "query-time": 4}"#;

    /// Feature count with the wrong JSON type.
    pub const TOTAL_NOT_A_NUMBER: &str = r#"{"total": "many"}"#;

    /// Not JSON at all (e.g. an HTML error page behind a proxy).
    pub const NOT_JSON: &str = "<html><body>Bad Gateway</body></html>";
}
