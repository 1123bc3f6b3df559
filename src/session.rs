//! The single live session record.
//!
//! Written only through [`SessionState::replace`], [`SessionState::merge_stream`]
//! and [`SessionState::reset`]; no other code path touches the fields.

use tracing::warn;

use crate::types::{AuthMeResponse, RegisterResponse};

/// Identity returned by a successful session check or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub session_id: String,
    /// `None` when the session rides on a cookie only.
    pub token: Option<String>,
    pub questions_remaining: u32,
}

impl From<AuthMeResponse> for SessionInfo {
    fn from(r: AuthMeResponse) -> Self {
        Self {
            name: r.name,
            session_id: r.session_id,
            token: None,
            questions_remaining: r.questions_remaining,
        }
    }
}

impl From<RegisterResponse> for SessionInfo {
    fn from(r: RegisterResponse) -> Self {
        Self {
            name: r.name,
            session_id: r.session_id,
            token: Some(r.token),
            questions_remaining: r.questions_remaining,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    user_name: Option<String>,
    session_id: Option<String>,
    auth_token: Option<String>,
    questions_remaining: Option<u32>,
    is_authenticated: bool,
}

impl SessionState {
    /// The unauthenticated starting state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn questions_remaining(&self) -> Option<u32> {
        self.questions_remaining
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    /// Quota known and used up.
    pub fn quota_exhausted(&self) -> bool {
        self.questions_remaining == Some(0)
    }

    /// Install a freshly established session, discarding the old one.
    pub fn replace(&mut self, info: SessionInfo) {
        *self = Self {
            user_name: Some(info.name),
            session_id: Some(info.session_id),
            auth_token: info.token,
            questions_remaining: Some(info.questions_remaining),
            is_authenticated: true,
        };
    }

    /// Fold a `session` stream event in. An absent quota keeps the current one.
    pub fn merge_stream(&mut self, session_id: String, questions_remaining: Option<u32>) {
        self.session_id = Some(session_id);
        if let Some(q) = questions_remaining {
            if let Some(prev) = self.questions_remaining {
                if q > prev {
                    warn!(previous = prev, reported = q, "server reported a quota increase");
                }
            }
            self.questions_remaining = Some(q);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
