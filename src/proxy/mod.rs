//! HTTP relay module.
//!
//! This module provides the streaming chat endpoint and the user-data
//! endpoints, plus the pieces a chat session is built from: upstream
//! client, re-chunker and event-stream encoder.

mod handlers;
pub mod rechunk;
mod server;
pub mod session;
pub mod stream;
pub mod types;
pub mod upstream;
mod user_data;

pub use rechunk::{rechunk, Pacing, Rechunker};
pub use server::{create_router, run_server, AppState};
pub use types::{ChatRequest, Message};
pub use upstream::{CompletionParams, FragmentStream, OpenAiUpstream, Upstream};
