//! Transport layer for Copilot CLI communication.
//!
//! Frames are JSON-RPC bodies preceded by a `Content-Length` header block,
//! the same framing the Language Server Protocol uses.
//!
//! - [`MessageKind`] / [`classify_message`]: decide how the router
//!   dispatches an incoming frame
//! - [`read_frame`] / [`write_frame`]: Content-Length framing
//! - [`parse_port_announcement`]: the line the CLI prints once its server is up

use crate::copilot::error::{CopilotError, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const PORT_ANNOUNCEMENT: &str = "CLI server listening on port ";

/// Classification of an incoming JSON-RPC message.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// A response to a request we sent (has `id`, no `method`).
    Response,
    /// An incoming request from the CLI (has `id` + `method`).
    IncomingRequest { id: u64 },
    /// A notification (has `method`, no `id`), e.g. `session.event`.
    Notification,
}

/// Classify a JSON-RPC message by inspecting `id` and `method` fields.
pub fn classify_message(json: &serde_json::Value) -> MessageKind {
    let has_id = json.get("id").and_then(|v| v.as_u64());
    let has_method = json.get("method").and_then(|v| v.as_str());

    match (has_id, has_method) {
        (Some(id), Some(_)) => MessageKind::IncomingRequest { id },
        (Some(_), None) => MessageKind::Response,
        _ => MessageKind::Notification,
    }
}

/// Port number from the CLI's startup announcement, if `line` is one.
pub fn parse_port_announcement(line: &str) -> Option<Result<u16>> {
    let port = line.trim().strip_prefix(PORT_ANNOUNCEMENT)?;
    Some(port.trim().parse::<u16>().map_err(|_| {
        CopilotError::UnexpectedResponse(format!("Failed to parse port number: {}", port))
    }))
}

/// Read one framed message body.
///
/// Returns [`CopilotError::TransportClosed`] on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R, line: &mut String) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        line.clear();
        if reader.read_line(line).await? == 0 {
            return Err(CopilotError::TransportClosed);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            // Blank line ends the header block once a length was seen
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = value.trim().parse::<usize>().ok();
        }
    }

    let mut body = vec![0u8; content_length.unwrap_or_default()];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Write one framed message and flush.
pub async fn write_frame<W>(writer: &mut W, body: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
