//! Error taxonomy for the answer pipeline and stock comparison.
//!
//! Collaborators report failures as `anyhow::Error`; the core converts them
//! into [`PipelineError::ExternalService`] at the call site, keeping the full
//! context chain in the message.

use std::fmt;

use thiserror::Error;

/// The external service a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Corpus,
    Embedding,
    Generation,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Corpus => "corpus source",
            Service::Embedding => "embedding service",
            Service::Generation => "generation service",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A corpus fetch, embedding, or generation call failed.
    #[error("{service} unavailable: {message}")]
    ExternalService { service: Service, message: String },

    /// The query text was empty or whitespace.
    #[error("query must not be empty")]
    EmptyQuery,

    /// The query contained no extractable keywords (keyword retrieval mode).
    #[error("no relevant keywords found in the query")]
    NoKeywords,

    /// The candidate set was empty or every candidate lacked a usable embedding.
    #[error("no match found in the document database for this query")]
    NoMatch,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wrap a collaborator failure, preserving its context chain.
    pub fn external(service: Service, err: &anyhow::Error) -> Self {
        PipelineError::ExternalService {
            service,
            message: format!("{:#}", err),
        }
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::ExternalService { .. } => "service_unavailable",
            PipelineError::EmptyQuery => "empty_query",
            PipelineError::NoKeywords => "no_keywords",
            PipelineError::NoMatch => "no_match",
            PipelineError::InvalidRequest(_) => "bad_request",
            PipelineError::Config(_) => "config",
        }
    }

    /// Expected conditions caused by the request itself rather than a fault.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            PipelineError::EmptyQuery
                | PipelineError::NoKeywords
                | PipelineError::NoMatch
                | PipelineError::InvalidRequest(_)
        )
    }
}
