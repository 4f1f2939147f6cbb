// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket listener: accepts one connection per request (the CLI and
//! lifecycle hooks are short-lived, one-shot callers), decodes a
//! [`Request`], dispatches it against the running daemon's engine
//! components, and writes back a [`Response`].

use crate::protocol::{read_message, write_message, ProtocolError, Request, Response};
use orch_adapters::{ProcessAgentLauncher, TmuxCliDriver};
use orch_core::{ConversationId, HandoffReason, Mode, MissionExecutionId, MissionExecutionStatus, Role, SessionId};
use orch_engine::{LifecyclePrimitives, MissionExecutor, RegisterRequest, SessionRegistry};
use orch_storage::{DutyRepo, HandoffRepo, MissionRepo, Store, TriggerRepo};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::warn;

#[derive(Clone)]
pub struct Handlers {
    pub registry: SessionRegistry,
    pub lifecycle: Arc<LifecyclePrimitives<TmuxCliDriver, ProcessAgentLauncher>>,
    pub missions: MissionExecutor<ProcessAgentLauncher>,
    pub store: Store,
    pub clock: Arc<dyn orch_core::Clock>,
    pub shutdown: Arc<Notify>,
}

impl Handlers {
    async fn dispatch(&self, req: Request) -> Response {
        match req {
            Request::Register {
                session_id,
                role,
                mode,
                pane,
                transcript_path,
                conversation_id,
                parent_session_id,
                mission_execution_id,
                cwd,
                description,
                spec_path,
            } => self.handle_register(
                session_id,
                role,
                mode,
                pane,
                transcript_path,
                conversation_id,
                parent_session_id,
                mission_execution_id,
                cwd,
                description,
                spec_path,
            ),
            Request::Status { session_id, text } => self
                .lifecycle
                .status(&SessionId::new(session_id), &text)
                .map(|()| Response::ok(()))
                .unwrap_or_else(|e| Response::err(e)),
            Request::Done { session_id, summary } => match self.lifecycle.done(&SessionId::new(session_id), &summary).await {
                Ok(()) => Response::ok(()),
                Err(e) => Response::err(e),
            },
            Request::Reset { session_id, summary, work_file } => {
                let work_file = work_file.map(PathBuf::from);
                match self
                    .lifecycle
                    .reset(&SessionId::new(session_id), &summary, work_file.as_ref(), Some(HandoffReason::ContextLow))
                    .await
                {
                    Ok(handoff) => Response::ok(handoff.id.as_str()),
                    Err(e) => Response::err(e),
                }
            }
            Request::MissionComplete { execution_id, status, summary, error } => {
                let status = parse_mission_status(&status);
                match self
                    .missions
                    .complete(&MissionExecutionId::new(execution_id), status, summary.as_deref(), error.as_deref())
                {
                    Ok(()) => Response::ok(()),
                    Err(e) => Response::err(e),
                }
            }
            Request::WhoAmI { pane } => match self.registry.get_by_pane(&pane) {
                Ok(Some(session)) => Response::ok(session.id.as_str()),
                Ok(None) => Response::err("no live session on that pane"),
                Err(e) => Response::err(e),
            },
            Request::SessionList { all } => {
                let result = if all {
                    orch_storage::SessionRepo::new(&self.store).list_all(500)
                } else {
                    orch_storage::SessionRepo::new(&self.store).list_live()
                };
                match result {
                    Ok(sessions) => Response::ok(sessions),
                    Err(e) => Response::err(e),
                }
            }
            Request::SessionGet { session_id } => match self.registry.get(&SessionId::new(session_id)) {
                Ok(Some(session)) => Response::ok(session),
                Ok(None) => Response::err("no such session"),
                Err(e) => Response::err(e),
            },
            Request::HandoffList { limit } => match HandoffRepo::new(&self.store).list(limit) {
                Ok(handoffs) => Response::ok(handoffs),
                Err(e) => Response::err(e),
            },
            Request::DutyList => match DutyRepo::new(&self.store).list_all() {
                Ok(duties) => Response::ok(duties),
                Err(e) => Response::err(e),
            },
            Request::MissionList => match MissionRepo::new(&self.store).list_all() {
                Ok(missions) => Response::ok(missions),
                Err(e) => Response::err(e),
            },
            Request::TriggerList => match TriggerRepo::new(&self.store).list_all() {
                Ok(triggers) => Response::ok(triggers),
                Err(e) => Response::err(e),
            },
            Request::Ping => Response::ok("pong"),
            Request::Shutdown => {
                self.shutdown.notify_one();
                Response::ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_register(
        &self,
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
    ) -> Response {
        let mode = match mode.parse::<Mode>() {
            Ok(m) => m,
            Err(e) => return Response::err(e),
        };
        let req = RegisterRequest {
            id: SessionId::new(session_id),
            role: Role::new(role),
            mode,
            pane,
            transcript_path: transcript_path.map(PathBuf::from),
            conversation_id: conversation_id.map(ConversationId::new),
            parent_session_id: parent_session_id.map(SessionId::new),
            mission_execution_id: mission_execution_id.map(MissionExecutionId::new),
            cwd: PathBuf::from(cwd),
            description,
            spec_path: spec_path.map(PathBuf::from),
        };
        match self.registry.register(req, self.clock.now()) {
            Ok(session) => Response::ok(session.id.as_str()),
            Err(e) => Response::err(e),
        }
    }
}

fn parse_mission_status(s: &str) -> MissionExecutionStatus {
    match s {
        "complete" => MissionExecutionStatus::Complete,
        "failed" => MissionExecutionStatus::Failed,
        "timed_out" => MissionExecutionStatus::TimedOut,
        _ => MissionExecutionStatus::Running,
    }
}

/// Binds the socket (removing a stale one left behind by an unclean
/// shutdown) and serves connections until `shutdown` fires.
pub async fn serve(socket_path: &std::path::Path, handlers: Handlers, shutdown: Arc<Notify>) -> std::io::Result<()> {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let handlers = handlers.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handlers).await {
                        warn!(error = %e, "connection error");
                    }
                });
            }
            _ = shutdown.notified() => {
                let _ = std::fs::remove_file(socket_path);
                return Ok(());
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, handlers: Handlers) -> Result<(), ProtocolError> {
    let req: Request = read_message(&mut stream).await?;
    let response = handlers.dispatch(req).await;
    write_message(&mut stream, &response).await?;
    Ok(())
}

/// Sends a single request over `socket_path` and returns the response.
/// Used by the `orch` CLI, which is a one-shot client.
pub async fn send_request(socket_path: &std::path::Path, req: &Request) -> Result<Response, ProtocolError> {
    let mut stream = UnixStream::connect(socket_path).await?;
    write_message(&mut stream, req).await?;
    read_message(&mut stream).await
}
