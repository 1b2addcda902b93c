//! Shareable links: the `test` query parameter carrying a suite token.

use crate::suite::{BenchmarkState, Suite};
use crate::types::Result;

/// Query parameter holding the token.
pub const QUERY_PARAM: &str = "test";

/// Build `base?test=<token>` for `suite`. Any query already on `base` is dropped.
pub fn permalink(base: &str, suite: &Suite) -> Result<String> {
    let token = super::encode(suite)?;
    let base = base.split(['?', '#']).next().unwrap_or(base);
    Ok(format!("{base}?{QUERY_PARAM}={token}"))
}

/// Extract the token from a query string (`?a=1&test=...` or `test=...`) or
/// from a full URL.
pub fn token_from_query(query: &str) -> Option<&str> {
    let query = match query.split_once('?') {
        Some((_, rest)) => rest,
        None => query,
    };
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == QUERY_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Initial session state for a page load. No token means the default suite;
/// an unreadable token is logged and also yields the default suite.
pub fn load_state(query: Option<&str>) -> BenchmarkState {
    let Some(token) = query.and_then(token_from_query) else {
        return BenchmarkState::default();
    };
    match super::decode(token) {
        Ok(suite) => BenchmarkState::new(suite),
        Err(e) => {
            tracing::warn!(error = %e, code = e.code(), "Unreadable permalink token, loading default suite");
            BenchmarkState::default()
        }
    }
}
