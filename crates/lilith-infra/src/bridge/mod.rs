//! Transport backed by a bridge process.
//!
//! The bridge wraps the upstream protocol library. Lilith spawns it with the
//! credential directory in `LILITH_AUTH_DIR`, reads newline-delimited JSON
//! events from its stdout, and writes lookup replies to its stdin. Each
//! `connect()` starts a fresh process; the previous one is killed first.

pub mod wire;

use std::path::PathBuf;
use std::process::Stdio;

use lilith_core::session::{Transport, TransportConnection};
use lilith_types::config::{BridgeCommand, IngestConfig};
use lilith_types::error::TransportError;
use lilith_types::event::{LookupReply, TransportEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AUTH_DIR_ENV;

/// Spawns and supervises the bridge process.
pub struct BridgeTransport {
    command: BridgeCommand,
    auth_dir: PathBuf,
    buffer: usize,
    child: Option<Child>,
}

impl BridgeTransport {
    pub fn new(command: BridgeCommand, auth_dir: impl Into<PathBuf>, buffer: usize) -> Self {
        Self {
            command,
            auth_dir: auth_dir.into(),
            buffer: buffer.max(1),
            child: None,
        }
    }

    pub fn from_config(config: &IngestConfig, auth_dir: impl Into<PathBuf>) -> Self {
        Self::new(config.bridge.clone(), auth_dir, config.event_buffer)
    }

    /// Kill the running bridge process, if any.
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "bridge process already gone");
            }
        }
    }
}

impl Transport for BridgeTransport {
    async fn connect(&mut self) -> Result<TransportConnection, TransportError> {
        self.stop().await;

        tokio::fs::create_dir_all(&self.auth_dir).await.map_err(|e| {
            TransportError::Io(format!("cannot create {}: {e}", self.auth_dir.display()))
        })?;

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .env(AUTH_DIR_ENV, &self.auth_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {e}", self.command.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Io("bridge stdout not captured".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Io("bridge stdin not captured".to_string()))?;

        info!(
            program = %self.command.program,
            pid = child.id(),
            auth_dir = %self.auth_dir.display(),
            "bridge process started"
        );

        let (event_tx, events) = mpsc::channel(self.buffer);
        let (replies, reply_rx) = mpsc::channel(self.buffer);
        tokio::spawn(read_events(stdout, event_tx));
        tokio::spawn(write_replies(stdin, reply_rx));
        self.child = Some(child);

        Ok(TransportConnection { events, replies })
    }
}

/// Forward decoded events until the bridge closes stdout or the consumer
/// drops the channel. Ending drops the sender, which the session sees as a
/// lost connection.
async fn read_events(stdout: ChildStdout, events: mpsc::Sender<TransportEvent>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("bridge closed its event stream");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read from bridge");
                return;
            }
        };

        let decoded = match wire::decode_line(&line) {
            Ok(decoded) => decoded,
            Err(wire::WireError::UnknownKind(kind)) => {
                debug!(%kind, "ignoring bridge event");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "ignoring bridge line");
                continue;
            }
        };

        for event in decoded {
            if events.send(event).await.is_err() {
                debug!("session dropped the event channel");
                return;
            }
        }
    }
}

async fn write_replies(mut stdin: ChildStdin, mut replies: mpsc::Receiver<LookupReply>) {
    while let Some(reply) = replies.recv().await {
        let line = match wire::encode_reply(&reply) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, request_id = %reply.request_id, "failed to encode lookup reply");
                continue;
            }
        };
        let send = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        };
        if let Err(e) = send.await {
            warn!(error = %e, "failed to write to bridge");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lilith_types::event::{ConnectionState, DisconnectReason};
    use lilith_types::message::StoredMessage;
    use serde_json::json;

    fn shell(script: &str) -> BridgeCommand {
        BridgeCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_events_are_read_from_stdout() {
        let tmp = tempfile::tempdir().unwrap();
        let script = r#"
echo '{"event":"connection.update","data":{"connection":"open"}}'
echo 'garbage'
echo '{"event":"presence.update","data":{}}'
echo '{"event":"chats.upsert","data":[{"id":"1@g.us"}]}'
echo '{"event":"connection.update","data":{"connection":"close","statusCode":401}}'
"#;
        let mut transport = BridgeTransport::new(shell(script), tmp.path().join("auth"), 8);

        let mut connection = transport.connect().await.unwrap();

        assert_eq!(
            connection.events.recv().await,
            Some(TransportEvent::Connection(ConnectionState::Open))
        );
        assert!(matches!(
            connection.events.recv().await,
            Some(TransportEvent::Chats(chats)) if chats.len() == 1
        ));
        assert_eq!(
            connection.events.recv().await,
            Some(TransportEvent::Connection(ConnectionState::Close(
                DisconnectReason::LoggedOut
            )))
        );
        assert_eq!(connection.events.recv().await, None);
        assert!(tmp.path().join("auth").is_dir());
    }

    #[tokio::test]
    async fn test_auth_dir_is_passed_in_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let auth_dir = tmp.path().join("auth");
        let script = r#"printf '{"event":"creds.update","data":{"dir":"%s"}}\n' "$LILITH_AUTH_DIR""#;
        let mut transport = BridgeTransport::new(shell(script), &auth_dir, 8);

        let mut connection = transport.connect().await.unwrap();

        assert_eq!(
            connection.events.recv().await,
            Some(TransportEvent::CredentialsChanged(
                json!({ "dir": auth_dir.display().to_string() })
            ))
        );
    }

    #[tokio::test]
    async fn test_replies_are_written_to_stdin() {
        let tmp = tempfile::tempdir().unwrap();
        // Echo the first stdin line back as the payload of a credentials event.
        let script = r#"read -r line; printf '{"event":"creds.update","data":%s}\n' "$line""#;
        let mut transport = BridgeTransport::new(shell(script), tmp.path(), 8);

        let mut connection = transport.connect().await.unwrap();
        connection
            .replies
            .send(LookupReply {
                request_id: "r1".to_string(),
                message: Some(StoredMessage {
                    external_message_id: "M1".to_string(),
                    body_text: Some("hi".to_string()),
                    raw_payload: None,
                }),
            })
            .await
            .unwrap();

        let Some(TransportEvent::CredentialsChanged(echoed)) = connection.events.recv().await
        else {
            panic!("expected echoed reply");
        };
        assert_eq!(echoed["event"], "messages.get.result");
        assert_eq!(echoed["data"]["requestId"], "r1");
        assert_eq!(echoed["data"]["body"], "hi");
    }

    #[tokio::test]
    async fn test_reconnect_replaces_process() {
        let tmp = tempfile::tempdir().unwrap();
        let script = r#"echo '{"event":"connection.update","data":{"connection":"open"}}'; exec sleep 30"#;
        let mut transport = BridgeTransport::new(shell(script), tmp.path(), 8);

        let mut first = transport.connect().await.unwrap();
        assert!(first.events.recv().await.is_some());
        let mut second = transport.connect().await.unwrap();

        // Killing the first process closes its stream.
        assert_eq!(first.events.recv().await, None);
        assert_eq!(
            second.events.recv().await,
            Some(TransportEvent::Connection(ConnectionState::Open))
        );
        transport.stop().await;
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let command = BridgeCommand {
            program: "/nonexistent/lilith-bridge".to_string(),
            args: Vec::new(),
        };
        let mut transport = BridgeTransport::new(command, tmp.path(), 8);

        let result = transport.connect().await;

        assert!(matches!(result, Err(TransportError::Spawn(_))));
    }
}
