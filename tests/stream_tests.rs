//! End-to-end tests for the chat client against an in-process HTTP backend
//! serving canned auth responses and SSE streams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use budget_navigator::chat::{ChatClient, ExchangeOutcome};
use budget_navigator::config::NavigatorConfig;
use budget_navigator::controller::{CONNECTION_ERROR_TEXT, SESSION_EXPIRED_TEXT};
use budget_navigator::error::{AuthError, NavError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Route {
    method: &'static str,
    path: &'static str,
    status: u16,
    content_type: &'static str,
    body: String,
}

fn json(method: &'static str, path: &'static str, status: u16, body: &str) -> Route {
    Route { method, path, status, content_type: "application/json", body: body.to_string() }
}

fn sse(events: &[&str]) -> Route {
    let body = events.iter().map(|e| format!("data: {e}\n\n")).collect::<String>();
    Route { method: "GET", path: "/chat/stream", status: 200, content_type: "text/event-stream", body }
}

type Log = Arc<Mutex<Vec<String>>>;

/// Start the backend and return its origin plus a log of request targets.
async fn serve(routes: Vec<Route>) -> (String, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let seen = log.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let _ = handle(socket, &routes, &seen).await;
            });
        }
    });

    (format!("http://{addr}"), log)
}

async fn handle(mut socket: TcpStream, routes: &[Route], log: &Log) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let (method, target, body_start, content_length) = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        if let Ok(httparse::Status::Complete(len)) = req.parse(&buf) {
            let content_length = req
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                .and_then(|h| std::str::from_utf8(h.value).ok())
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            break (
                req.method.unwrap_or("").to_string(),
                req.path.unwrap_or("").to_string(),
                len,
                content_length,
            );
        }
    };
    while buf.len() < body_start + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    log.lock().unwrap().push(format!("{method} {target}"));
    let path = target.split('?').next().unwrap_or("");
    let route = routes.iter().find(|r| r.method == method && r.path == path);

    let response = match route {
        Some(r) if r.content_type == "text/event-stream" => format!(
            "HTTP/1.1 {} OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n{}",
            r.status, r.body
        ),
        Some(r) => format!(
            "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            r.status,
            r.content_type,
            r.body.len(),
            r.body
        ),
        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    };
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

const REGISTER_OK: &str =
    r#"{"name":"Ada","session_id":"s-1","token":"tok-1","questions_remaining":10}"#;
const ME_OK: &str = r#"{"name":"Ada","session_id":"s-1","questions_remaining":7}"#;

fn config_for(origin: &str) -> NavigatorConfig {
    let mut cfg = NavigatorConfig::default().with_overrides(Some(origin), Some(5));
    cfg.logout_delay_ms = 10;
    cfg
}

async fn registered(routes: Vec<Route>) -> (ChatClient, Log) {
    let mut all = vec![json("POST", "/auth/register", 200, REGISTER_OK)];
    all.extend(routes);
    let (origin, log) = serve(all).await;
    let mut client = ChatClient::new(config_for(&origin)).unwrap();
    client.register("Ada").await.unwrap();
    (client, log)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_resume_uses_existing_session() {
    let (origin, _) = serve(vec![json("GET", "/auth/me", 200, ME_OK)]).await;
    let mut client = ChatClient::new(config_for(&origin)).unwrap();
    assert!(client.resume().await);
    let view = client.view();
    assert_eq!(view.session.user_name(), Some("Ada"));
    assert_eq!(view.session.questions_remaining(), Some(7));
    assert!(view.session.auth_token().is_none());
}

#[tokio::test]
async fn test_resume_without_session() {
    let (origin, _) = serve(vec![json("GET", "/auth/me", 401, r#"{"detail":"no"}"#)]).await;
    let mut client = ChatClient::new(config_for(&origin)).unwrap();
    assert!(!client.resume().await);
    assert!(!client.view().session.is_authenticated());
}

#[tokio::test]
async fn test_register_success_installs_session() {
    let (client, _) = registered(vec![]).await;
    let view = client.view();
    assert_eq!(view.session.auth_token(), Some("tok-1"));
    assert_eq!(view.session.questions_remaining(), Some(10));
    assert_eq!(view.messages.len(), 1);
}

#[tokio::test]
async fn test_register_rejection_carries_server_detail() {
    let (origin, _) =
        serve(vec![json("POST", "/auth/register", 409, r#"{"detail":"Name already taken"}"#)]).await;
    let mut client = ChatClient::new(config_for(&origin)).unwrap();
    let err = client.register("Ada").await.unwrap_err();
    assert_eq!(err.to_string(), "Name already taken");
    assert!(matches!(err, NavError::Auth(AuthError::Rejected { status: 409, .. })));
    assert!(!client.view().session.is_authenticated());
}

#[tokio::test]
async fn test_register_rejection_without_detail_uses_fallback() {
    let (origin, _) = serve(vec![json("POST", "/auth/register", 500, "oops")]).await;
    let mut client = ChatClient::new(config_for(&origin)).unwrap();
    let err = client.register("Ada").await.unwrap_err();
    assert_eq!(err.to_string(), "Registration failed");
}

#[tokio::test]
async fn test_logout_clears_local_state_and_calls_server() {
    let (mut client, log) = registered(vec![json("POST", "/auth/logout", 200, "{}")]).await;
    client.logout().await;
    assert!(!client.view().session.is_authenticated());
    assert!(client.view().messages.is_empty());
    assert!(log.lock().unwrap().iter().any(|r| r == "POST /auth/logout"));
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_exchange_over_sse() {
    let (mut client, log) = registered(vec![sse(&[
        r#"{"type":"session","session_id":"s-1","questions_remaining":9}"#,
        r#"{"type":"rewritten_query","content":"housing investment 2025"}"#,
        r#"{"type":"expanded_terms","terms":["housing","homes"]}"#,
        r#"{"type":"status","message":"Searching documents"}"#,
        r#"{"type":"sources","sources":[{"source_file":"budget.pdf","page":12,"preview":"Housing..."}],"total_docs":4}"#,
        r#"{"type":"answer_start"}"#,
        r#"{"type":"answer_chunk","content":"Budget 2025 "}"#,
        r#"{"type":"heartbeat"}"#,
        r#"{"type":"answer_chunk","content":"adds homes."}"#,
        r#"{"type":"answer_complete"}"#,
        r#"{"type":"done"}"#,
    ])])
    .await;

    let mut statuses = Vec::new();
    let outcome = client
        .send("How much for housing?", |view| {
            if !view.live.status.is_empty() {
                statuses.push(view.live.status.clone());
            }
        })
        .await;
    assert_eq!(outcome, ExchangeOutcome::Completed);
    assert!(statuses.contains(&"Searching documents".to_string()));

    let view = client.view();
    let answer = view.messages.last().unwrap();
    assert_eq!(answer.content, "Budget 2025 adds homes.");
    assert_eq!(answer.total_docs(), Some(4));
    assert_eq!(answer.sources().unwrap()[0].page, 12);
    let opt = answer.optimization.as_ref().unwrap();
    assert_eq!(opt.original, "How much for housing?");
    assert_eq!(opt.rewritten.as_deref(), Some("housing investment 2025"));
    assert_eq!(opt.expanded.as_ref().unwrap().len(), 2);
    assert_eq!(view.session.questions_remaining(), Some(9));

    let log = log.lock().unwrap();
    let stream_req = log.iter().find(|r| r.starts_with("GET /chat/stream?")).unwrap();
    assert!(stream_req.contains("message=How"));
    assert!(stream_req.contains("use_query_expansion=true"));
    assert!(stream_req.contains("token=tok-1"));
}

#[tokio::test]
async fn test_error_event_is_reported_in_transcript() {
    let (mut client, _) = registered(vec![sse(&[
        r#"{"type":"status","message":"Searching documents"}"#,
        r#"{"type":"error","message":"Vector store unavailable"}"#,
    ])])
    .await;
    let outcome = client.send("Tell me about defence", |_| {}).await;
    assert_eq!(outcome, ExchangeOutcome::ServerError);
    assert_eq!(client.view().messages.last().unwrap().content, "Error: Vector store unavailable");
}

#[tokio::test]
async fn test_truncated_stream_with_valid_session_is_connection_error() {
    let (mut client, _) = registered(vec![
        sse(&[r#"{"type":"answer_start"}"#, r#"{"type":"answer_chunk","content":"Part"}"#]),
        json("GET", "/auth/me", 200, ME_OK),
    ])
    .await;
    let outcome = client.send("Tell me about taxes", |_| {}).await;
    assert_eq!(outcome, ExchangeOutcome::ConnectionLost);
    let view = client.view();
    assert_eq!(view.messages.last().unwrap().content, CONNECTION_ERROR_TEXT);
    assert!(view.session.is_authenticated());
    assert!(view.live.answer.is_empty());
}

#[tokio::test]
async fn test_stream_refused_with_expired_session_schedules_logout() {
    let (mut client, _) = registered(vec![
        json("GET", "/chat/stream", 401, r#"{"detail":"expired"}"#),
        json("GET", "/auth/me", 401, r#"{"detail":"expired"}"#),
    ])
    .await;
    let outcome = client.send("Tell me about taxes", |_| {}).await;
    assert_eq!(outcome, ExchangeOutcome::SessionExpired { logout_after: Duration::from_millis(10) });
    assert_eq!(client.view().messages.last().unwrap().content, SESSION_EXPIRED_TEXT);
}

#[tokio::test]
async fn test_expired_session_logs_out_after_delay() {
    let (mut client, log) = registered(vec![
        sse(&[r#"{"type":"answer_start"}"#]),
        json("GET", "/auth/me", 401, r#"{"detail":"expired"}"#),
        json("POST", "/auth/logout", 200, "{}"),
    ])
    .await;
    let ExchangeOutcome::SessionExpired { logout_after } = client.send("Tell me about taxes", |_| {}).await
    else {
        panic!("expected an expired session");
    };
    assert!(client.view().session.is_authenticated());
    assert!(!log.lock().unwrap().iter().any(|r| r == "POST /auth/logout"));

    let started = tokio::time::Instant::now();
    client.expire(logout_after).await;
    assert!(started.elapsed() >= logout_after);
    assert!(log.lock().unwrap().iter().any(|r| r == "POST /auth/logout"));
    assert!(!client.view().session.is_authenticated());
    assert!(client.view().messages.is_empty());
}

#[tokio::test]
async fn test_captured_markup_is_sent_escaped() {
    let (mut client, log) = registered(vec![sse(&[r#"{"type":"done"}"#])]).await;
    let outcome = client.send("<b>hi</b>", |_| {}).await;
    assert_eq!(outcome, ExchangeOutcome::Completed);
    let view = client.view();
    assert_eq!(view.messages.last().unwrap().content, "&lt;b&gt;hi&lt;&#x2F;b&gt;");
    let log = log.lock().unwrap();
    let stream_req = log.iter().find(|r| r.starts_with("GET /chat/stream?")).unwrap();
    assert!(stream_req.contains("message=%26lt%3Bb%26gt%3Bhi"), "{stream_req}");
}

#[tokio::test]
async fn test_unsafe_text_never_reaches_server() {
    let (mut client, log) = registered(vec![sse(&[r#"{"type":"done"}"#])]).await;
    let outcome = client.send("<script>alert(1)</script>", |_| {}).await;
    assert!(matches!(outcome, ExchangeOutcome::NotStarted(_)));
    assert!(!log.lock().unwrap().iter().any(|r| r.contains("/chat/stream")));
}
