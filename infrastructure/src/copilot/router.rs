//! Transport demultiplexer: message routing for concurrent Copilot CLI sessions.
//!
//! The Copilot CLI communicates over a **single TCP connection** using JSON-RPC 2.0,
//! while a review run keeps one session open per in-flight (agent, pass) task.
//! [`MessageRouter`] runs a single background reader task that owns the read
//! half exclusively and routes incoming `session.event` notifications to the
//! matching [`SessionChannel`] by `sessionId`.

use crate::copilot::error::{CopilotError, Result};
use crate::copilot::protocol::{
    CreateSessionParams, JsonRpcErrorOut, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
use crate::copilot::transport::{
    MessageKind, classify_message, parse_port_announcement, read_frame, write_frame,
};
use reviewer_domain::StreamEvent;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Timeout for session creation.
const SESSION_CREATE_TIMEOUT: Duration = Duration::from_secs(30);

type Routes = Arc<std::sync::RwLock<HashMap<String, mpsc::UnboundedSender<RoutedEvent>>>>;
type PendingResponses = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;
type Writer = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// A `session.event` notification routed to one session.
#[derive(Debug)]
pub struct RoutedEvent {
    pub event_type: String,
    pub event: serde_json::Value,
}

/// Try to extract text content from a session event's data payload.
///
/// Handles the shapes the CLI uses for completed messages:
///
/// - `{ "data": { "content": "text" } }`
/// - `{ "data": { "content": [{ "type": "text", "text": "..." }] } }`
/// - `{ "data": { "message": { "content": "text" } } }`
/// - `{ "data": { "text": "..." } }`
fn extract_event_text(event: &serde_json::Value) -> Option<String> {
    let data = event.get("data")?;

    if let Some(s) = data.get("content").and_then(|c| c.as_str()) {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }

    if let Some(blocks) = data.get("content").and_then(|c| c.as_array()) {
        let text = blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n");
        if !text.is_empty() {
            return Some(text);
        }
    }

    data.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .or_else(|| data.get("text").and_then(|t| t.as_str()))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Converts the CLI's session events into [`StreamEvent`]s.
///
/// Deltas are forwarded as they come. A completed message (or turn end) only
/// contributes text when its turn produced no deltas, so content is never
/// duplicated. `session.idle` ends the stream.
#[derive(Debug, Default)]
pub struct StreamTranslator {
    full_content: String,
    turn_delta_bytes: usize,
}

impl StreamTranslator {
    fn push(&mut self, text: String) -> Option<StreamEvent> {
        self.full_content.push_str(&text);
        Some(StreamEvent::Delta(text))
    }

    pub fn translate(&mut self, event_type: &str, event: &serde_json::Value) -> Option<StreamEvent> {
        let data = event.get("data");
        match event_type {
            "assistant.message.delta" => {
                let chunk = data
                    .and_then(|d| d.get("deltaContent").or_else(|| d.get("content")))
                    .and_then(|c| c.as_str())
                    .filter(|c| !c.is_empty())?;
                self.turn_delta_bytes += chunk.len();
                self.push(chunk.to_string())
            }
            "assistant.message" | "assistant.message.completed" | "assistant.turn_end" => {
                if self.turn_delta_bytes > 0 {
                    return None;
                }
                let text = extract_event_text(event)?;
                debug!("Stream: {} fallback content ({} bytes)", event_type, text.len());
                // Counts as this turn's content so turn_end does not repeat it
                self.turn_delta_bytes += text.len();
                self.push(text)
            }
            "assistant.turn_start" => {
                self.turn_delta_bytes = 0;
                None
            }
            "session.idle" => {
                debug!(
                    "Session idle, streaming complete ({} bytes)",
                    self.full_content.len()
                );
                Some(StreamEvent::Completed(std::mem::take(&mut self.full_content)))
            }
            "session.error" => {
                let message = data
                    .and_then(|d| d.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown session error");
                warn!("Session error: {}", message);
                Some(StreamEvent::Error(message.to_string()))
            }
            other => {
                trace!("Stream: {}", other);
                None
            }
        }
    }
}

/// A per-session channel for receiving routed events.
///
/// Dropping the channel deregisters the session from the router.
pub struct SessionChannel {
    rx: mpsc::UnboundedReceiver<RoutedEvent>,
    session_id: String,
    router: Arc<MessageRouter>,
}

impl SessionChannel {
    /// Receive the next routed event.
    ///
    /// Returns [`CopilotError::RouterStopped`] once the session was
    /// deregistered or the reader task has ended.
    pub async fn recv(&mut self) -> Result<RoutedEvent> {
        self.rx.recv().await.ok_or(CopilotError::RouterStopped)
    }

    /// Forward translated events until the stream ends or the consumer goes away.
    pub async fn forward(&mut self, events: mpsc::Sender<StreamEvent>) {
        let mut translator = StreamTranslator::default();
        loop {
            let routed = match self.recv().await {
                Ok(routed) => routed,
                Err(e) => {
                    debug!("Session {} stream ended: {}", self.session_id, e);
                    let _ = events
                        .send(StreamEvent::Error("Copilot CLI connection closed".to_string()))
                        .await;
                    return;
                }
            };
            if let Some(event) = translator.translate(&routed.event_type, &routed.event) {
                let terminal = event.is_terminal();
                if events.send(event).await.is_err() || terminal {
                    return;
                }
            }
        }
    }

    /// Returns the session ID associated with this channel.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.router.deregister_session(&self.session_id);
    }
}

/// Central message router that demultiplexes a single connection
/// across multiple concurrent Copilot sessions.
///
/// 1. Spawns the Copilot CLI process and connects to its TCP server
/// 2. Owns the read half in a background task
/// 3. Routes `session.event` notifications by `sessionId`
/// 4. Correlates request/response pairs via `oneshot` channels
/// 5. Serializes session creation through `create_lock`
pub struct MessageRouter {
    reader_handle: JoinHandle<()>,

    /// Session-specific event channels (session_id -> sender).
    ///
    /// `std::sync::RwLock` so [`SessionChannel::drop`] can deregister synchronously.
    routes: Routes,

    pending_responses: PendingResponses,

    /// `session.start` notifications, consumed during session creation.
    session_start_rx: Mutex<mpsc::UnboundedReceiver<String>>,

    create_lock: Mutex<()>,

    writer: Writer,

    /// Copilot CLI child process (killed on Drop to prevent orphans).
    child: Option<Child>,
}

impl MessageRouter {
    /// Spawn the Copilot CLI (`copilot --server`) and build the router.
    pub async fn spawn() -> Result<Arc<Self>> {
        Self::spawn_with_command("copilot").await
    }

    /// Spawn with a custom command (useful for testing or a pinned binary).
    pub async fn spawn_with_command(cmd: &str) -> Result<Arc<Self>> {
        debug!("Spawning Copilot CLI: {} --server", cmd);

        let mut command = Command::new(cmd);
        command
            .arg("--server")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Linux: request kernel to send SIGTERM to child when parent dies.
        // This catches cases where Drop doesn't run (SIGKILL, OOM kill).
        #[cfg(target_os = "linux")]
        unsafe {
            command.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = command.spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CopilotError::SpawnError(std::io::Error::other("Failed to capture stdout"))
        })?;

        let mut stdout_reader = BufReader::new(stdout);
        let mut line = String::new();

        let port = loop {
            line.clear();
            if stdout_reader.read_line(&mut line).await? == 0 {
                return Err(CopilotError::UnexpectedResponse(
                    "Copilot CLI exited without announcing port".into(),
                ));
            }
            debug!("Copilot CLI output: {}", line.trim());
            if let Some(port) = parse_port_announcement(&line) {
                break port?;
            }
        };

        info!("Copilot CLI listening on port {}, connecting...", port);

        let stream = TcpStream::connect(("127.0.0.1", port)).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self::from_io(read_half, write_half, Some(child)))
    }

    /// Build a router over an established connection.
    pub fn from_io<R, W>(read_half: R, write_half: W, child: Option<Child>) -> Arc<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let routes: Routes = Arc::new(std::sync::RwLock::new(HashMap::new()));
        let pending_responses: PendingResponses = Arc::new(Mutex::new(HashMap::new()));
        let (session_start_tx, session_start_rx) = mpsc::unbounded_channel();
        let boxed: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write_half);
        let writer: Writer = Arc::new(Mutex::new(boxed));

        let reader_handle = tokio::spawn(Self::reader_loop(
            BufReader::new(read_half),
            Arc::clone(&routes),
            Arc::clone(&pending_responses),
            session_start_tx,
            Arc::clone(&writer),
        ));

        Arc::new(Self {
            reader_handle,
            routes,
            pending_responses,
            session_start_rx: Mutex::new(session_start_rx),
            create_lock: Mutex::new(()),
            writer,
            child,
        })
    }

    /// Background reader loop: single owner of the read half.
    ///
    /// When the loop exits every sender is dropped, so receivers observe
    /// [`CopilotError::RouterStopped`].
    async fn reader_loop<R>(
        mut reader: BufReader<R>,
        routes: Routes,
        pending_responses: PendingResponses,
        session_start_tx: mpsc::UnboundedSender<String>,
        writer: Writer,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut line = String::new();

        loop {
            let body = match read_frame(&mut reader, &mut line).await {
                Ok(body) => body,
                Err(CopilotError::TransportClosed) => break,
                Err(e) => {
                    warn!("Reader loop: failed to read frame: {}", e);
                    break;
                }
            };
            trace!("Router received: {}", String::from_utf8_lossy(&body));

            let json_value: serde_json::Value = match serde_json::from_slice(&body) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Router: failed to parse JSON: {}", e);
                    continue;
                }
            };

            match classify_message(&json_value) {
                MessageKind::Response => {
                    let response: JsonRpcResponse = match serde_json::from_value(json_value) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("Router: failed to parse response: {}", e);
                            continue;
                        }
                    };
                    let Some(id) = response.id else { continue };
                    let sender = pending_responses.lock().await.remove(&id);
                    match sender {
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => debug!("Router: no pending receiver for response id={}", id),
                    }
                }

                // Review sessions expose no client-side tools or handlers
                MessageKind::IncomingRequest { id } => {
                    let method = json_value
                        .get("method")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    warn!("Router: rejecting incoming request method={} id={}", method, id);
                    let reply = JsonRpcErrorOut::method_not_found(id, method);
                    if let Ok(json) = serde_json::to_string(&reply) {
                        let mut w = writer.lock().await;
                        if let Err(e) = write_frame(&mut *w, &json).await {
                            warn!("Router: failed to reject request id={}: {}", id, e);
                        }
                    }
                }

                MessageKind::Notification => {
                    let notification: JsonRpcNotification =
                        match serde_json::from_value(json_value) {
                            Ok(n) => n,
                            Err(e) => {
                                warn!("Router: failed to parse notification: {}", e);
                                continue;
                            }
                        };
                    if notification.method != "session.event" {
                        trace!("Router: ignoring notification method={}", notification.method);
                        continue;
                    }
                    let Some(params) = notification.params else { continue };
                    let session_id = params.get("sessionId").and_then(|v| v.as_str());
                    let event = params.get("event");
                    let (Some(session_id), Some(event)) = (session_id, event) else {
                        debug!("Router: session.event without sessionId/event");
                        continue;
                    };
                    let event_type = event
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .to_string();

                    if event_type == "session.start" {
                        debug!("Router: session.start for {}", session_id);
                        let _ = session_start_tx.send(session_id.to_string());
                        continue;
                    }

                    let routes_read = routes.read().unwrap_or_else(|e| e.into_inner());
                    match routes_read.get(session_id) {
                        Some(tx) => {
                            let _ = tx.send(RoutedEvent {
                                event_type,
                                event: event.clone(),
                            });
                        }
                        None => debug!(
                            "Router: no route for session_id={}, dropping event type={}",
                            session_id, event_type
                        ),
                    }
                }
            }
        }

        info!("Router: reader loop ended, closing all session channels");
        routes.write().unwrap_or_else(|e| e.into_inner()).clear();
        pending_responses.lock().await.clear();
    }

    /// Create a new Copilot session and return its ID + channel.
    ///
    /// The session id is taken from the `session.create` response, or from
    /// the `session.start` notification when the response carries none.
    /// Creation is serialized so a `session.start` is never attributed to
    /// the wrong caller.
    pub async fn create_session(
        self: &Arc<Self>,
        params: CreateSessionParams,
    ) -> Result<(String, SessionChannel)> {
        let _guard = self.create_lock.lock().await;
        let mut starts = self.session_start_rx.lock().await;
        // Drop announcements left over from earlier creations
        while starts.try_recv().is_ok() {}

        let request = JsonRpcRequest::new("session.create", Some(serde_json::to_value(&params)?));
        let request_id = request.id;
        let mut response = self.register(request_id).await;
        if let Err(e) = self.send_request(&request).await {
            self.forget(request_id).await;
            return Err(e);
        }

        let wait = async {
            let mut response_pending = true;
            loop {
                tokio::select! {
                    reply = &mut response, if response_pending => {
                        response_pending = false;
                        let reply = reply.map_err(|_| CopilotError::RouterStopped)?;
                        if let Some(error) = reply.error {
                            return Err(CopilotError::RpcError {
                                code: error.code,
                                message: error.message,
                            });
                        }
                        let session_id = reply
                            .result
                            .as_ref()
                            .and_then(|r| r.get("sessionId"))
                            .and_then(|v| v.as_str());
                        if let Some(session_id) = session_id {
                            return Ok(session_id.to_string());
                        }
                    }
                    start = starts.recv() => {
                        return start.ok_or(CopilotError::RouterStopped);
                    }
                }
            }
        };

        let session_id = match tokio::time::timeout(SESSION_CREATE_TIMEOUT, wait).await {
            Ok(result) => result?,
            Err(_) => {
                self.forget(request_id).await;
                return Err(CopilotError::Timeout("session.create".into()));
            }
        };
        debug!("Router: session created: {}", session_id);

        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.clone(), tx);

        let channel = SessionChannel {
            rx,
            session_id: session_id.clone(),
            router: Arc::clone(self),
        };
        Ok((session_id, channel))
    }

    async fn register(&self, request_id: u64) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending_responses.lock().await.insert(request_id, tx);
        rx
    }

    async fn forget(&self, request_id: u64) {
        self.pending_responses.lock().await.remove(&request_id);
    }

    /// Send a JSON-RPC request and wait for the correlated response.
    pub async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let rx = self.register(request.id).await;
        if let Err(e) = self.send_request(request).await {
            self.forget(request.id).await;
            return Err(e);
        }
        // Nobody is left to answer once the reader has stopped
        if self.reader_handle.is_finished() {
            self.forget(request.id).await;
            return Err(CopilotError::RouterStopped);
        }
        rx.await.map_err(|_| CopilotError::RouterStopped)
    }

    /// [`request`](Self::request) bounded by `timeout`; the pending entry is
    /// dropped when the timeout fires.
    pub async fn request_with_timeout(
        &self,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        match tokio::time::timeout(timeout, self.request(request)).await {
            Ok(result) => result,
            Err(_) => {
                self.forget(request.id).await;
                Err(CopilotError::Timeout(request.method.clone()))
            }
        }
    }

    /// Send a JSON-RPC request without waiting for a response.
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<()> {
        let request_json = serde_json::to_string(request)?;
        trace!("Router sending: {} ({} bytes)", request.method, request_json.len());
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &request_json).await
    }

    /// Deregister a session from the routing table.
    ///
    /// Called by [`SessionChannel::drop`]; safe to call more than once.
    pub fn deregister_session(&self, session_id: &str) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        if routes.remove(session_id).is_some() {
            debug!("Router: deregistered session {}", session_id);
        }
    }

    /// Number of sessions currently receiving events.
    pub fn active_sessions(&self) -> usize {
        self.routes.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for MessageRouter {
    fn drop(&mut self) {
        self.reader_handle.abort();
        if let Some(child) = self.child.as_mut() {
            debug!("MessageRouter dropping, killing copilot-cli child process");
            let _ = child.start_kill();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_text_from_string_content() {
        let event = json!({"data": {"content": "hello"}});
        assert_eq!(extract_event_text(&event), Some("hello".to_string()));
    }

    #[test]
    fn extract_text_from_content_blocks_array() {
        let event = json!({"data": {"content": [
            {"type": "text", "text": "a"},
            {"type": "image"},
            {"type": "text", "text": "b"}
        ]}});
        assert_eq!(extract_event_text(&event), Some("a\nb".to_string()));
    }

    #[test]
    fn extract_text_from_message_or_text() {
        assert_eq!(
            extract_event_text(&json!({"data": {"message": {"content": "m"}}})),
            Some("m".to_string())
        );
        assert_eq!(
            extract_event_text(&json!({"data": {"text": "t"}})),
            Some("t".to_string())
        );
        assert_eq!(extract_event_text(&json!({"data": {"content": ""}})), None);
        assert_eq!(extract_event_text(&json!({})), None);
    }

    #[test]
    fn translator_prefers_deltas() {
        let mut translator = StreamTranslator::default();
        assert_eq!(
            translator.translate("assistant.message.delta", &json!({"data": {"deltaContent": "ab"}})),
            Some(StreamEvent::Delta("ab".to_string()))
        );
        assert_eq!(
            translator.translate("assistant.message", &json!({"data": {"content": "ab"}})),
            None
        );
        assert_eq!(
            translator.translate("session.idle", &json!({})),
            Some(StreamEvent::Completed("ab".to_string()))
        );
    }

    #[test]
    fn translator_falls_back_to_completed_message() {
        let mut translator = StreamTranslator::default();
        assert_eq!(
            translator.translate("assistant.message", &json!({"data": {"content": "full"}})),
            Some(StreamEvent::Delta("full".to_string()))
        );
        // turn_end of the same turn does not repeat it
        assert_eq!(
            translator.translate("assistant.turn_end", &json!({"data": {"content": "full"}})),
            None
        );
        assert_eq!(
            translator.translate("session.idle", &json!({})),
            Some(StreamEvent::Completed("full".to_string()))
        );
    }

    #[test]
    fn translator_maps_errors_and_ignores_noise() {
        let mut translator = StreamTranslator::default();
        assert_eq!(translator.translate("session.usage_info", &json!({})), None);
        assert_eq!(
            translator.translate("session.error", &json!({"data": {"message": "quota"}})),
            Some(StreamEvent::Error("quota".to_string()))
        );
    }

    #[tokio::test]
    async fn create_session_registers_route() {
        let router = fake_cli::connect();
        let params = CreateSessionParams {
            model: "gpt-5".to_string(),
            streaming: true,
            system_message: None,
            mcp_servers: None,
            reasoning_effort: None,
        };
        let (session_id, channel) = router.create_session(params).await.unwrap();
        assert_eq!(session_id, fake_cli::SESSION_ID);
        assert_eq!(router.active_sessions(), 1);

        drop(channel);
        assert_eq!(router.active_sessions(), 0);
    }

    #[tokio::test]
    async fn request_fails_when_connection_closes() {
        let (client, server) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(client);
        let router = MessageRouter::from_io(read_half, write_half, None);
        drop(server);

        let request = JsonRpcRequest::new("session.send", None);
        assert!(router.request(&request).await.is_err());
    }
}
