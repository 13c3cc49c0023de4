// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Error Taxonomy

//! Errors raised anywhere between the chain source and the cycle store.
//!
//! Every component returns [`EngineError`]; the dashboard pipeline is the only
//! place that turns one into the failure shape of a response.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Chain, price or reward source unreachable or answering non-success.
    #[error("failed to fetch from {endpoint}: {message}")]
    UpstreamFetch {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// Projection requested with no seed record in the store.
    #[error("no existing cycle data found")]
    EmptyStore,

    /// A derived metric would be NaN, infinite or overflow.
    #[error("invalid derived metric: {0}")]
    DomainComputation(String),

    #[error("cycle store I/O failed: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Upstream answered with a non-success HTTP status.
    pub fn upstream_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::UpstreamFetch {
            endpoint: endpoint.into(),
            status: Some(status),
            message: format!("HTTP status {status}"),
        }
    }

    /// Upstream unreachable, or its body could not be decoded.
    pub fn upstream(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::UpstreamFetch {
            endpoint: endpoint.into(),
            status: None,
            message: message.to_string(),
        }
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Self::DomainComputation(message.into())
    }

    /// Category label used in the `error` field of failure responses.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UpstreamFetch { .. } => "UpstreamFetchError",
            Self::EmptyStore => "EmptyStoreError",
            Self::DomainComputation(_) => "DomainComputationError",
            Self::Persistence(_) => "PersistenceError",
            Self::Config(_) => "ConfigError",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
