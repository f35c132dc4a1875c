//! # kbqa-server
//!
//! Outer surfaces for the `kbqa-rag` knowledge pipeline: an axum HTTP API
//! ([`app_router`], [`run_server`]) and the `kbqa` command line ([`cli`],
//! [`commands`]).

pub mod cli;
pub mod commands;
pub mod server;
pub mod telemetry;

pub use server::{AppState, AskRequest, ServerConfig, app_router, run_server};
pub use telemetry::{LogFormat, init_tracing};
