//! Per-exchange state machine.
//!
//! ```text
//! Idle -> Sending -> Streaming -> Finalized --done--> Idle
//!                        \-> Errored -> Idle
//! ```
//!
//! The controller owns the session record, the transcript and the live
//! accumulators. It performs no I/O: the async driver in [`crate::chat`]
//! feeds it events and asks it what to show.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::auth::SessionProbe;
use crate::config::NavigatorConfig;
use crate::sanitize::{capture_chat_input, Rejection};
use crate::session::{SessionInfo, SessionState};
use crate::transcript::{welcome_message, Transcript};
use crate::types::{Citations, Message, QueryOptimization, StreamEvent};

pub const SESSION_EXPIRED_TEXT: &str = "Session expired. Please log in again.";
pub const CONNECTION_ERROR_TEXT: &str = "Connection error. Please try again.";
pub const SEND_FAILED_TEXT: &str = "Error sending message. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Idle,
    Sending,
    Streaming,
    Finalized,
    Errored,
}

impl ExchangePhase {
    /// An exchange occupies the controller.
    pub fn in_flight(self) -> bool {
        matches!(self, ExchangePhase::Sending | ExchangePhase::Streaming | ExchangePhase::Finalized)
    }
}

/// Parameters for opening `/chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub message: String,
    pub use_query_expansion: bool,
    /// Bearer token, sent as a query parameter for servers that cannot read
    /// the session cookie.
    pub token: Option<String>,
}

impl StreamRequest {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("message", self.message.clone()),
            ("use_query_expansion", self.use_query_expansion.to_string()),
        ];
        if let Some(token) = &self.token {
            pairs.push(("token", token.clone()));
        }
        pairs
    }
}

/// What [`StreamingController::submit`] did with the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Started(StreamRequest),
    /// Another exchange is still open.
    Busy,
    QuotaExhausted,
    NotAuthenticated,
    Invalid(Rejection),
}

/// Whether the driver should keep reading after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// `done` arrived; close the channel.
    Done,
    /// `error` arrived; close the channel.
    Failed,
}

/// Ephemeral state of the exchange in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveExchange {
    pub status: String,
    pub answer: String,
    pub optimization: Option<QueryOptimization>,
    pending_citations: Option<Citations>,
}

/// Borrowed snapshot handed to the presentation layer.
#[derive(Debug, Clone, Copy)]
pub struct ChatView<'a> {
    pub messages: &'a [Message],
    pub live: &'a LiveExchange,
    pub session: &'a SessionState,
    pub phase: ExchangePhase,
    pub max_questions: u32,
}

impl ChatView<'_> {
    pub fn limit_reached(&self) -> bool {
        self.session.quota_exhausted()
    }
}

#[derive(Debug)]
pub struct StreamingController {
    phase: ExchangePhase,
    session: SessionState,
    transcript: Transcript,
    live: LiveExchange,
    original: String,
    app_name: String,
    max_questions: u32,
    use_query_expansion: bool,
    logout_delay: Duration,
}

impl StreamingController {
    pub fn new(config: &NavigatorConfig) -> Self {
        Self {
            phase: ExchangePhase::Idle,
            session: SessionState::new(),
            transcript: Transcript::new(),
            live: LiveExchange::default(),
            original: String::new(),
            app_name: config.app_name.clone(),
            max_questions: config.max_questions,
            use_query_expansion: config.use_query_expansion,
            logout_delay: config.logout_delay(),
        }
    }

    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn live(&self) -> &LiveExchange {
        &self.live
    }

    pub fn view(&self) -> ChatView<'_> {
        ChatView {
            messages: self.transcript.messages(),
            live: &self.live,
            session: &self.session,
            phase: self.phase,
            max_questions: self.max_questions,
        }
    }

    /// Install a new session and start the transcript with a greeting.
    pub fn sign_in(&mut self, info: SessionInfo) {
        self.reset_exchange();
        self.transcript.clear();
        let name = info.name.clone();
        self.session.replace(info);
        self.transcript.push(welcome_message(&self.app_name, Some(&name)));
        info!(user = %name, "session established");
    }

    /// Forget the session and everything said in it.
    pub fn sign_out(&mut self) {
        self.session.reset();
        self.transcript.clear();
        self.reset_exchange();
    }

    fn reset_exchange(&mut self) {
        self.live = LiveExchange::default();
        self.original.clear();
        self.phase = ExchangePhase::Idle;
    }

    /// Start an exchange for the captured line `text`.
    ///
    /// The line is sanitized before validation; the sanitized form is what is
    /// stored, sent and recorded as the optimization's original. Only an
    /// idle, authenticated controller with quota left accepts text; every
    /// other case leaves state untouched.
    pub fn submit(&mut self, text: &str) -> SendOutcome {
        if self.phase != ExchangePhase::Idle {
            debug!(phase = ?self.phase, "send ignored while an exchange is open");
            return SendOutcome::Busy;
        }
        if !self.session.is_authenticated() {
            return SendOutcome::NotAuthenticated;
        }
        let message = match capture_chat_input(text) {
            Ok(m) => m,
            Err(rejection) => return SendOutcome::Invalid(rejection),
        };
        if self.session.quota_exhausted() {
            return SendOutcome::QuotaExhausted;
        }

        self.transcript.push(Message::user(message.clone()));
        self.live = LiveExchange {
            optimization: Some(QueryOptimization::new(message.clone())),
            ..LiveExchange::default()
        };
        self.original = message.clone();
        self.phase = ExchangePhase::Sending;

        SendOutcome::Started(StreamRequest {
            message,
            use_query_expansion: self.use_query_expansion,
            token: self.session.auth_token().map(str::to_string),
        })
    }

    /// The request could not be built or sent at all.
    pub fn send_failed(&mut self) {
        if self.phase != ExchangePhase::Sending {
            return;
        }
        self.transcript.push(Message::assistant(SEND_FAILED_TEXT));
        self.reset_exchange();
    }

    pub fn channel_opened(&mut self) {
        if self.phase == ExchangePhase::Sending {
            self.phase = ExchangePhase::Streaming;
        }
    }

    /// Apply one stream event.
    pub fn apply(&mut self, event: StreamEvent) -> Flow {
        if !matches!(self.phase, ExchangePhase::Streaming | ExchangePhase::Finalized) {
            debug!(phase = ?self.phase, ?event, "event outside an open stream ignored");
            return Flow::Continue;
        }

        match event {
            StreamEvent::Session { session_id, questions_remaining } => {
                self.session.merge_stream(session_id, questions_remaining);
            }
            StreamEvent::RewrittenQuery { content } => {
                self.optimization_mut().rewritten = Some(content);
            }
            StreamEvent::ExpandedTerms { terms } => {
                self.optimization_mut().expanded = Some(terms);
            }
            StreamEvent::Sources { sources, total_docs } => {
                self.live.pending_citations = Some(Citations { sources, total_docs });
            }
            StreamEvent::Status { message } => {
                self.live.status = message;
            }
            StreamEvent::AnswerStart => {
                self.live.status.clear();
                self.live.answer.clear();
            }
            StreamEvent::AnswerChunk { content } => {
                self.live.answer.push_str(&content);
            }
            StreamEvent::AnswerComplete => {
                let content = std::mem::take(&mut self.live.answer);
                let optimization = self
                    .live
                    .optimization
                    .take()
                    .unwrap_or_else(|| QueryOptimization::new(self.original.clone()));
                let citations = self.live.pending_citations.take();
                self.transcript.push(Message::answer(content, optimization, citations));
                self.live.status.clear();
                self.phase = ExchangePhase::Finalized;
            }
            StreamEvent::Done => {
                self.reset_exchange();
                return Flow::Done;
            }
            StreamEvent::Error { message } => {
                error!(detail = %message, "server reported a stream error");
                self.phase = ExchangePhase::Errored;
                self.transcript.push(Message::assistant(format!("Error: {message}")));
                self.reset_exchange();
                return Flow::Failed;
            }
            StreamEvent::Unknown => {
                debug!("ignoring unrecognised stream event");
            }
        }
        Flow::Continue
    }

    fn optimization_mut(&mut self) -> &mut QueryOptimization {
        let original = &self.original;
        self.live
            .optimization
            .get_or_insert_with(|| QueryOptimization::new(original.clone()))
    }

    /// The channel failed underneath an open exchange. Clears the in-flight
    /// state; the driver then probes the session and calls
    /// [`resolve_transport_failure`](Self::resolve_transport_failure).
    pub fn abort_stream(&mut self) {
        if self.phase.in_flight() {
            self.live = LiveExchange::default();
            self.phase = ExchangePhase::Errored;
        }
    }

    /// Report the transport failure using the session probe result.
    ///
    /// Returns the delay before an automatic logout when the session is gone.
    pub fn resolve_transport_failure(&mut self, probe: &SessionProbe) -> Option<Duration> {
        let verdict = match probe {
            SessionProbe::Expired { status } => {
                info!(status, "session rejected after stream failure");
                self.transcript.push(Message::assistant(SESSION_EXPIRED_TEXT));
                Some(self.logout_delay)
            }
            SessionProbe::Valid | SessionProbe::Unreachable { .. } => {
                self.transcript.push(Message::assistant(CONNECTION_ERROR_TEXT));
                None
            }
        };
        self.reset_exchange();
        verdict
    }
}
