//! Error kinds shared by the address book, permission index and pool pipelines.
//!
//! Lookup errors (`NoResult`, `MultipleMatches`) are contract violations the caller has to
//! handle. Source-loading problems never surface here: loaders degrade to empty structures
//! and log a warning instead.

#[derive(Debug, thiserror::Error)]
pub enum AddressBookError {
    /// A lookup that must produce exactly one result found nothing.
    #[error("no result: {0}")]
    NoResult(String),
    /// A lookup that must produce exactly one result found several.
    #[error("multiple matches for {query}: {matches:?}")]
    MultipleMatches { query: String, matches: Vec<String> },
    /// Balance totals before and after redistribution do not agree.
    #[error("checksum mismatch: initial {initial}, counted {counted}, delta {delta}")]
    Checksum {
        initial: f64,
        counted: f64,
        delta: f64,
    },
    #[error("expected a single element, got {0}")]
    UnexpectedListLength(String),
    #[error("graphql request failed: {0}")]
    GraphQLRequest(String),
    #[error("invalid action id: {0}")]
    InvalidActionId(String),
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AddressBookError>;

impl AddressBookError {
    pub(crate) fn multiple<I, S>(query: &str, matches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AddressBookError::MultipleMatches {
            query: query.to_string(),
            matches: matches.into_iter().map(Into::into).collect(),
        }
    }
}

/// Picks the single element out of `matches` or reports why it could not.
pub(crate) fn expect_unique<T>(query: &str, mut matches: Vec<(String, T)>) -> Result<(String, T)> {
    match matches.len() {
        0 => Err(AddressBookError::NoResult(format!(
            "nothing matched {:?}",
            query
        ))),
        1 => Ok(matches.remove(0)),
        _ => Err(AddressBookError::multiple(
            query,
            matches.into_iter().map(|(key, _)| key),
        )),
    }
}
