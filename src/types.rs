use serde::{Deserialize, Serialize};

// -- Transcript types --------------------------------------------------------

/// One cited passage returned by the retrieval backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub source_file: String,
    /// 1-based page number.
    pub page: u32,
    pub preview: String,
}

/// How the backend rewrote and expanded the user's question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptimization {
    pub original: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<Vec<String>>,
}

impl QueryOptimization {
    pub fn new(original: impl Into<String>) -> Self {
        Self { original: original.into(), rewritten: None, expanded: None }
    }
}

/// Sources attached to a finalized answer. Keeping the list and the document
/// count in one value means a message has both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citations {
    pub sources: Vec<Source>,
    pub total_docs: u32,
}

/// A finalized transcript entry. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub is_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<QueryOptimization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Citations>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_user: true, optimization: None, citations: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_user: false, optimization: None, citations: None }
    }

    pub fn answer(
        content: impl Into<String>,
        optimization: QueryOptimization,
        citations: Option<Citations>,
    ) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            optimization: Some(optimization),
            citations,
        }
    }

    pub fn sources(&self) -> Option<&[Source]> {
        self.citations.as_ref().map(|c| c.sources.as_slice())
    }

    pub fn total_docs(&self) -> Option<u32> {
        self.citations.as_ref().map(|c| c.total_docs)
    }
}

// -- Auth endpoint payloads --------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub name: String,
    pub session_id: String,
    pub token: String,
    pub questions_remaining: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthMeResponse {
    pub name: String,
    pub session_id: String,
    pub questions_remaining: u32,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: Option<String>,
}

// -- Chat stream events ------------------------------------------------------

/// One event on the `/chat/stream` channel, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Session {
        session_id: String,
        #[serde(default)]
        questions_remaining: Option<u32>,
    },
    RewrittenQuery {
        content: String,
    },
    ExpandedTerms {
        terms: Vec<String>,
    },
    Sources {
        sources: Vec<Source>,
        total_docs: u32,
    },
    Status {
        message: String,
    },
    AnswerStart,
    AnswerChunk {
        content: String,
    },
    AnswerComplete,
    Done,
    Error {
        message: String,
    },
    /// Any tag this client does not know about.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> StreamEvent {
        serde_json::from_str(json).expect("event should parse")
    }

    #[test]
    fn session_event_with_and_without_quota() {
        assert_eq!(
            parse(r#"{"type":"session","session_id":"s1","questions_remaining":9}"#),
            StreamEvent::Session { session_id: "s1".into(), questions_remaining: Some(9) }
        );
        assert_eq!(
            parse(r#"{"type":"session","session_id":"s1"}"#),
            StreamEvent::Session { session_id: "s1".into(), questions_remaining: None }
        );
    }

    #[test]
    fn payloadless_events_parse() {
        assert_eq!(parse(r#"{"type":"answer_start"}"#), StreamEvent::AnswerStart);
        assert_eq!(parse(r#"{"type":"answer_complete"}"#), StreamEvent::AnswerComplete);
        assert_eq!(parse(r#"{"type":"done"}"#), StreamEvent::Done);
    }

    #[test]
    fn sources_event_parses_batch() {
        let ev = parse(
            r#"{"type":"sources","total_docs":3,"sources":[{"source_file":"budget.pdf","page":12,"preview":"Housing..."}]}"#,
        );
        match ev {
            StreamEvent::Sources { sources, total_docs } => {
                assert_eq!(total_docs, 3);
                assert_eq!(sources[0].page, 12);
                assert_eq!(sources[0].source_file, "budget.pdf");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_tolerated() {
        assert_eq!(parse(r#"{"type":"heartbeat","n":1}"#), StreamEvent::Unknown);
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(serde_json::from_str::<StreamEvent>(r#"{"content":"x"}"#).is_err());
    }

    #[test]
    fn message_citations_come_together() {
        let m = Message::answer(
            "hi",
            QueryOptimization::new("q"),
            Some(Citations { sources: vec![], total_docs: 0 }),
        );
        assert_eq!(m.sources().map(|s| s.len()), Some(0));
        assert_eq!(m.total_docs(), Some(0));
        let plain = Message::assistant("x");
        assert!(plain.sources().is_none() && plain.total_docs().is_none());
    }

    #[test]
    fn optimization_skips_absent_fields() {
        let json = serde_json::to_string(&QueryOptimization::new("q")).unwrap();
        assert_eq!(json, r#"{"original":"q"}"#);
    }
}
