//! Math Router
//!
//! An MCP server that answers math questions from a curated knowledge base
//! and falls back to live web search when the knowledge base is not
//! confident enough. Answers are generated with step-by-step working,
//! checked by guardrails on the way in and out, and rated by users; the
//! ratings feed back into the routing thresholds.
//!
//! # Features
//!
//! - Confidence-gated routing: knowledge base, web search or a hybrid of both
//! - Input and output guardrails for math-only, policy-safe answers
//! - One regeneration retry, then a degraded answer built from the evidence
//! - Append-only feedback ledger in `SQLite`
//! - Threshold adaptation from feedback, on a counter and on a timer
//!
//! # Quick Start
//!
//! ```bash
//! GEMINI_API_KEY=xxx TAVILY_API_KEY=tvly-xxx ./math-router
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐     stdin      ┌──────────────────┐──────▶ Qdrant (knowledge base)
//! │ MCP client │───────────────▶│   Math Router    │──────▶ Tavily (web search)
//! │            │◀───────────────│      (Rust)      │──────▶ Gemini (generation)
//! └────────────┘     stdout     └────────┬─────────┘
//!                                        │
//!                                        ▼
//!                                 SQLite ledger
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod clients;
pub mod composer;
pub mod config;
pub mod error;
pub mod feedback;
pub mod guardrails;
pub mod metrics;
pub mod model;
pub mod routing;
pub mod scoring;
pub mod server;
pub mod storage;
pub mod traits;
