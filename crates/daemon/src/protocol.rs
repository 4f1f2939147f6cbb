// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC wire format: a 4-byte big-endian length prefix followed by a JSON
//! payload, over the Unix socket at `Config::socket_path`. The `orch`
//! CLI and the lifecycle-tool hooks agents invoke are the only clients.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Caps a single message well above anything this protocol legitimately
/// carries (a handoff summary, a transcript excerpt) while still
/// bounding a misbehaving client's memory footprint.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("connection closed")]
    ConnectionClosed,
}

/// Every request the `orch` CLI or a lifecycle-tool hook can send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// The session-registration hook, called on every agent spawn with
    /// the environment contract (spec.md §6).
    Register {
        session_id: String,
        role: String,
        mode: String,
        pane: Option<String>,
        transcript_path: Option<String>,
        conversation_id: Option<String>,
        parent_session_id: Option<String>,
        mission_execution_id: Option<String>,
        cwd: String,
        description: Option<String>,
        spec_path: Option<String>,
    },
    /// `status(text)`.
    Status { session_id: String, text: String },
    /// `done(summary)`.
    Done { session_id: String, summary: String },
    /// `reset(summary, path?)`.
    Reset {
        session_id: String,
        summary: String,
        work_file: Option<String>,
    },
    /// `mission_complete(execution_id, status, summary)`.
    MissionComplete {
        execution_id: String,
        status: String,
        summary: Option<String>,
        error: Option<String>,
    },
    /// Resolves "who am I" from a tmux pane, for CLI invocations that
    /// only know `$TMUX_PANE`.
    WhoAmI { pane: String },
    /// Admin queries — read-only, used by `orch session|handoff|duty|
    /// mission|trigger list/show`. None of these mutate state.
    SessionList { all: bool },
    SessionGet { session_id: String },
    HandoffList { limit: u32 },
    DutyList,
    MissionList,
    TriggerList,
    Ping,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { value: serde_json::Value },
    Error { message: String },
}

impl Response {
    pub fn ok(value: impl Serialize) -> Self {
        Response::Ok {
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn err(message: impl std::fmt::Display) -> Self {
        Response::Error {
            message: message.to_string(),
        }
    }
}

pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge { size: payload.len(), max: MAX_MESSAGE_SIZE });
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::ConnectionClosed),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(serde_json::from_slice(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trips_over_a_duplex_pipe() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let req = Request::Status { session_id: "abc12345".into(), text: "triaging email".into() };
        write_message(&mut client, &req).await.unwrap();
        let received: Request = read_message(&mut server).await.unwrap();
        match received {
            Request::Status { session_id, text } => {
                assert_eq!(session_id, "abc12345");
                assert_eq!(text, "triaging email");
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_before_allocating() {
        let (mut client, mut server) = tokio::io::duplex(16);
        client.write_all(&(MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes()).await.unwrap();
        let result: Result<Request, ProtocolError> = read_message(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::TooLarge { .. })));
    }
}
