#![forbid(unsafe_code)]

//! Error taxonomy shared by the harvester, the stores and both binaries.
//!
//! Every external call site converts its failure into one of these kinds
//! before it leaves the module that made the call, so the presentation layer
//! never sees an unclassified error.

use std::fmt;

pub type HarvestResult<T> = Result<T, HarvestError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestError {
    /// The upstream source has no entity with the requested identifier.
    NotFound(String),
    /// Network, quota or server-side failure of the upstream API.
    UpstreamUnavailable(String),
    /// A single, non-essential fetch failed (e.g. comments disabled on one
    /// video). The harvester records the data as absent and keeps going.
    LocalizedFetchFailure(String),
    /// Document or relational store failure.
    Store(String),
}

impl HarvestError {
    pub fn channel_not_found(channel_id: &str) -> Self {
        Self::NotFound(format!(
            "no channel matches \"{channel_id}\"; expected a 24-character channel id starting with \"UC\""
        ))
    }

    pub fn document_not_found(channel_id: &str) -> Self {
        Self::NotFound(format!(
            "no harvested document for channel \"{channel_id}\"; run a harvest for this 24-character \"UC...\" channel id first"
        ))
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(detail.into())
    }

    pub fn store(detail: impl Into<String>) -> Self {
        Self::Store(detail.into())
    }

    /// Stable machine-readable name of the kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::LocalizedFetchFailure(_) => "localized_fetch_failure",
            Self::Store(_) => "store_failure",
        }
    }
}

impl fmt::Display for HarvestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(message) => write!(f, "{message}"),
            Self::UpstreamUnavailable(detail) => write!(
                f,
                "video platform unavailable ({detail}); please try again in a few minutes"
            ),
            Self::LocalizedFetchFailure(detail) => write!(f, "skipped optional data: {detail}"),
            Self::Store(detail) => write!(f, "storage failure: {detail}"),
        }
    }
}

impl std::error::Error for HarvestError {}

impl From<libsql::Error> for HarvestError {
    fn from(err: libsql::Error) -> Self {
        Self::Store(err.to_string())
    }
}
