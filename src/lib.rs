//! Terminal client for a document-grounded budget Q&A service.
//!
//! A question goes out as `GET /chat/stream`; the answer comes back as a
//! server-sent-event stream of typed JSON events (query rewrites, sources,
//! status lines, answer chunks) that [`controller::StreamingController`]
//! folds into an append-only transcript.

pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod render;
pub mod sanitize;
pub mod session;
pub mod sse;
pub mod transcript;
pub mod types;

pub use chat::{ChatClient, ExchangeOutcome};
pub use config::NavigatorConfig;
pub use controller::{ChatView, ExchangePhase, SendOutcome, StreamingController};
pub use error::{AuthError, NavError, ValidationError};
pub use types::{Message, StreamEvent};
