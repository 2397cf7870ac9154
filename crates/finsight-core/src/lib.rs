//! # finsight core
//!
//! Retrieval-then-generation logic for answering finance questions, free of
//! any HTTP client, database, or async runtime.
//!
//! Every external service is reached through a trait defined here:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`corpus::CorpusSource`] | fetch question/answer pairs for a set of topics |
//! | [`embedding::Embedder`] | turn a batch of texts into vectors |
//! | [`generation::Generator`] | turn a prompt into a completion |
//! | [`stocks::QuoteSource`] | recent daily price bars for a ticker |
//!
//! The application crate provides the concrete HTTP-backed implementations
//! and hands them to [`pipeline::PipelineBuilder`] and
//! [`stocks::StockAnalyst`].

pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod keywords;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod stocks;

#[cfg(test)]
pub(crate) mod test_support;
