// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: a one-shot Unix-socket connection per request, matching
//! `orchd`'s listener (spec.md §4.O — every call is a fresh connection,
//! not a persistent session).

use orch_daemon::config::Config;
use orch_daemon::protocol::{read_message, write_message, ProtocolError, Request, Response};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("orchd is not running (no socket at {0})")]
    NotRunning(PathBuf),
    #[error("failed to start orchd: {0}")]
    StartFailed(String),
    #[error("timed out waiting for orchd to start")]
    StartTimeout,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("orchd rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected response shape for this request")]
    UnexpectedResponse,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connects to an already-running daemon. Does not start one.
    pub fn connect(config: &Config) -> Result<Self, ClientError> {
        if !config.socket_path.exists() {
            return Err(ClientError::NotRunning(config.socket_path.clone()));
        }
        Ok(Self { socket_path: config.socket_path.clone() })
    }

    /// Connects to a running daemon, starting one in the background and
    /// waiting for its socket to appear if none is running yet. Used by
    /// action commands (`done`, `reset`, `status`) — a specialist calling
    /// `done` should not fail just because nobody ran `orch daemon start`.
    pub async fn connect_or_start(config: &Config) -> Result<Self, ClientError> {
        if config.socket_path.exists() && probe(&config.socket_path).await {
            return Ok(Self { socket_path: config.socket_path.clone() });
        }
        crate::daemon_process::start_background(config)?;
        Self::wait_for_socket(config).await
    }

    async fn wait_for_socket(config: &Config) -> Result<Self, ClientError> {
        let start = Instant::now();
        let timeout = Duration::from_secs(10);
        while start.elapsed() < timeout {
            if config.socket_path.exists() && probe(&config.socket_path).await {
                return Ok(Self { socket_path: config.socket_path.clone() });
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Err(ClientError::StartTimeout)
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        write_message(&mut stream, request).await?;
        let response: Response = read_message(&mut stream).await?;
        Ok(response)
    }

    /// Sends a request expecting `Ok`/`Error` only, discarding any value.
    pub async fn send_ok(&self, request: &Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok { .. } => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
        }
    }

    /// Sends a request and deserializes the `Ok` value into `T`.
    pub async fn send_value<T: DeserializeOwned>(&self, request: &Request) -> Result<T, ClientError> {
        match self.send(request).await? {
            Response::Ok { value } => serde_json::from_value(value).map_err(|e| ProtocolError::Json(e).into()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
        }
    }
}

async fn probe(socket_path: &std::path::Path) -> bool {
    UnixStream::connect(socket_path).await.is_ok()
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
