//! # Finsight
//!
//! Answers personal finance questions by retrieving the closest entry from a
//! Q&A corpus and handing it to a text generation model as context. Also
//! compares stock tickers and stores user profiles and financial goals.
//!
//! The provider-neutral pipeline lives in `finsight-core`; this crate wires
//! it to concrete HTTP providers, SQLite, a CLI, and an HTTP API.
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Corpus    │──▶│  Embed +    │──▶│ Generation │
//! │ file / BQ  │   │  best match │   │  provider  │
//! └────────────┘   └─────────────┘   └─────┬──────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`retry`] | Shared HTTP client and retry policy |
//! | [`corpus`] | File and BigQuery corpus sources |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Text generation providers |
//! | [`stocks`] | Yahoo Finance quotes and stock comparison |
//! | [`ask`] | Pipeline wiring and the `ask` command |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`profiles`] | User profiles |
//! | [`goals`] | Financial goals |
//! | [`server`] | HTTP API |

pub mod ask;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod goals;
pub mod logging;
pub mod migrate;
pub mod profiles;
pub mod retry;
pub mod server;
pub mod stocks;
