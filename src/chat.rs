//! Async driver: opens the chat stream and pumps its events into the
//! [`StreamingController`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::auth::{http_client, AuthClient, SessionProbe};
use crate::config::NavigatorConfig;
use crate::controller::{ChatView, Flow, SendOutcome, StreamRequest, StreamingController};
use crate::error::NavError;
use crate::sanitize::validate_name_input;
use crate::sse::{decode_events, ChannelHandle, EventStream};

/// How one call to [`ChatClient::send`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Nothing was sent; the controller refused the text.
    NotStarted(SendOutcome),
    /// The stream reached `done`.
    Completed,
    /// The server sent an `error` event.
    ServerError,
    /// Transport failed; the session is still usable.
    ConnectionLost,
    /// Transport failed and the session is gone. Log out after the delay.
    SessionExpired { logout_after: Duration },
    /// The request could not be issued at all.
    SendFailed,
}

/// Open `GET /chat/stream` and decode its body.
pub async fn open_stream(
    client: &reqwest::Client,
    config: &NavigatorConfig,
    request: &StreamRequest,
) -> Result<EventStream, NavError> {
    let endpoint = config.endpoint("/chat/stream");
    let url = reqwest::Url::parse(&endpoint)
        .map_err(|e| NavError::Config(format!("invalid API origin {endpoint}: {e}")))?;

    let response = client
        .get(url)
        .query(&request.query_pairs())
        .header("Accept", "text/event-stream")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(NavError::Http { status: response.status().as_u16(), url: endpoint });
    }

    debug!(url = %endpoint, "chat stream connected");
    Ok(decode_events(response.bytes_stream()))
}

/// Read `channel` to a terminal event, applying each event to `controller`
/// and calling `on_change` after every state change.
///
/// The channel is closed on every exit path. On transport failure `probe`
/// decides between "session expired" and "connection error".
pub async fn drive_exchange<P, Fut, F>(
    controller: &mut StreamingController,
    mut channel: ChannelHandle,
    idle_timeout: Option<Duration>,
    probe: P,
    mut on_change: F,
) -> ExchangeOutcome
where
    P: FnOnce() -> Fut,
    Fut: Future<Output = SessionProbe>,
    F: FnMut(&ChatView<'_>),
{
    controller.channel_opened();
    on_change(&controller.view());

    let failure = loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, channel.next_event()).await {
                Ok(next) => next,
                Err(_) => Some(Err(NavError::StreamTimeout(limit.as_secs()))),
            },
            None => channel.next_event().await,
        };

        match next {
            Some(Ok(event)) => {
                let flow = controller.apply(event);
                on_change(&controller.view());
                match flow {
                    Flow::Continue => {}
                    Flow::Done => {
                        channel.close();
                        return ExchangeOutcome::Completed;
                    }
                    Flow::Failed => {
                        channel.close();
                        return ExchangeOutcome::ServerError;
                    }
                }
            }
            Some(Err(e)) => break e,
            None => break NavError::Transport("stream ended before completion".to_string()),
        }
    };

    error!(error = %failure, "chat stream failed");
    channel.close();
    recover_from_transport(controller, probe, &mut on_change).await
}

async fn recover_from_transport<P, Fut, F>(
    controller: &mut StreamingController,
    probe: P,
    on_change: &mut F,
) -> ExchangeOutcome
where
    P: FnOnce() -> Fut,
    Fut: Future<Output = SessionProbe>,
    F: FnMut(&ChatView<'_>),
{
    controller.abort_stream();
    on_change(&controller.view());

    let result = probe().await;
    if let SessionProbe::Unreachable { detail } = &result {
        // Can't tell expired from offline; treated as a connection error.
        warn!(detail = %detail, "session probe unreachable, assuming session still valid");
    }
    let verdict = controller.resolve_transport_failure(&result);
    on_change(&controller.view());

    match verdict {
        Some(logout_after) => ExchangeOutcome::SessionExpired { logout_after },
        None => ExchangeOutcome::ConnectionLost,
    }
}

/// Everything a running client needs: config, HTTP, auth and the controller.
#[derive(Debug)]
pub struct ChatClient {
    config: NavigatorConfig,
    http: reqwest::Client,
    auth: AuthClient,
    controller: StreamingController,
}

impl ChatClient {
    pub fn new(config: NavigatorConfig) -> Result<Self, NavError> {
        let http = http_client(&config)?;
        let auth = AuthClient::new(&config, http.clone());
        let controller = StreamingController::new(&config);
        Ok(Self { config, http, auth, controller })
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn controller(&self) -> &StreamingController {
        &self.controller
    }

    pub fn view(&self) -> ChatView<'_> {
        self.controller.view()
    }

    /// Resume an existing session if the server recognises our cookie.
    pub async fn resume(&mut self) -> bool {
        match self.auth.check_session().await {
            Some(info) => {
                self.controller.sign_in(info);
                true
            }
            None => false,
        }
    }

    /// Validate `name`, register it and sign in.
    pub async fn register(&mut self, name: &str) -> Result<(), NavError> {
        let name = validate_name_input(name).map_err(|r| NavError::Validation(r.error))?;
        let info = self.auth.register(&name).await?;
        self.controller.sign_in(info);
        Ok(())
    }

    /// End the session. Local state is wiped even if the server call fails.
    pub async fn logout(&mut self) {
        self.auth.logout().await;
        self.controller.sign_out();
        info!("signed out");
    }

    /// The session was found expired: leave the notice up for `delay`, then
    /// log out.
    pub async fn expire(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
        info!(delay_ms = delay.as_millis() as u64, "logging out expired session");
        self.logout().await;
    }

    /// Run one exchange for `text`.
    pub async fn send<F>(&mut self, text: &str, mut on_change: F) -> ExchangeOutcome
    where
        F: FnMut(&ChatView<'_>),
    {
        let request = match self.controller.submit(text) {
            SendOutcome::Started(request) => request,
            other => return ExchangeOutcome::NotStarted(other),
        };
        on_change(&self.controller.view());

        let opened = open_stream(&self.http, &self.config, &request).await;
        let auth = &self.auth;
        match opened {
            Ok(stream) => {
                drive_exchange(
                    &mut self.controller,
                    ChannelHandle::new(stream),
                    self.config.stream_idle_timeout(),
                    || auth.probe_session(),
                    on_change,
                )
                .await
            }
            Err(NavError::Config(detail)) => {
                error!(detail = %detail, "could not build chat request");
                self.controller.send_failed();
                on_change(&self.controller.view());
                ExchangeOutcome::SendFailed
            }
            Err(e) => {
                error!(error = %e, "could not open chat stream");
                recover_from_transport(&mut self.controller, || auth.probe_session(), &mut on_change)
                    .await
            }
        }
    }
}
