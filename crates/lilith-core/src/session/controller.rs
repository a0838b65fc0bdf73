//! Session controller: owns one ingestion run from first connect to outcome.
//!
//! A single worker drains the transport's event channel, processing each
//! batch fully before reading the next. Shutdown is observed only between
//! batches. In backfill mode an idle timer, armed when the connection opens
//! and reset after every successful batch, ends the run once history
//! delivery has gone quiet.

use std::time::Duration;

use lilith_types::config::IngestConfig;
use lilith_types::error::RepositoryError;
use lilith_types::event::{
    ConnectionState, DisconnectReason, HistoryBatch, IdentityMapping, LookupReply, LookupRequest,
    RawRecord, TransportEvent,
};
use lilith_types::session::{SessionOutcome, SessionState, SessionStats, SyncMode};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::transport::{CredentialSink, Transport, TransportConnection};
use crate::ingest::cache::ChatIdCache;
use crate::ingest::normalize::{
    contact_row_for_mapping, message_key, to_chat_row, to_contact_row, to_message_row,
};
use crate::repository::IngestStore;

/// Timing and mode for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub mode: SyncMode,
    pub reconnect_delay: Duration,
    pub idle_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(mode: SyncMode, config: &IngestConfig) -> Self {
        Self {
            mode,
            reconnect_delay: config.reconnect_delay(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// How one connection ended.
enum ConnectionEnd {
    Finished(SessionOutcome),
    Disconnected(DisconnectReason),
}

/// Effect of one event on the idle timer.
enum Handled {
    Opened,
    Progress,
    Stalled,
    Closed(DisconnectReason),
    StoreLost,
}

/// Drives a transport into a store until the run reaches an outcome.
pub struct SessionController<S, T, C> {
    store: S,
    transport: T,
    credentials: C,
    settings: SessionSettings,
    state: SessionState,
    stats: SessionStats,
    cache: ChatIdCache,
}

impl<S, T, C> SessionController<S, T, C>
where
    S: IngestStore,
    T: Transport,
    C: CredentialSink,
{
    pub fn new(store: S, transport: T, credentials: C, settings: SessionSettings) -> Self {
        Self {
            store,
            transport,
            credentials,
            settings,
            state: SessionState::Disconnected,
            stats: SessionStats::default(),
            cache: ChatIdCache::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run until idle completion (backfill), logout, an unrecoverable
    /// disconnect (backfill), or cancellation of `shutdown`.
    pub async fn run(&mut self, shutdown: CancellationToken) -> SessionOutcome {
        info!(mode = %self.settings.mode, "ingestion session starting");

        let outcome = loop {
            self.transition(SessionState::Connecting);

            let connected = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break SessionOutcome::Shutdown,
                result = self.transport.connect() => result,
            };

            let reason = match connected {
                Ok(connection) => match self.drive(connection, &shutdown).await {
                    ConnectionEnd::Finished(outcome) => break outcome,
                    ConnectionEnd::Disconnected(reason) => reason,
                },
                Err(e) => {
                    warn!(error = %e, "transport connect failed");
                    DisconnectReason::ConnectionLost
                }
            };

            match reason {
                reason if !reason.is_recoverable() => {
                    error!(
                        "session was logged out upstream; clear the auth directory and pair the device again"
                    );
                    break SessionOutcome::LoggedOut;
                }
                DisconnectReason::RestartRequired => {
                    info!("upstream requested a restart, reconnecting");
                    self.transition(SessionState::Disconnected);
                    self.stats.reconnects += 1;
                }
                reason => match self.settings.mode {
                    SyncMode::Backfill => {
                        warn!(%reason, "connection closed before backfill completed");
                        break SessionOutcome::Disconnected(reason);
                    }
                    SyncMode::Live => {
                        self.transition(SessionState::Disconnected);
                        info!(
                            %reason,
                            delay_secs = self.settings.reconnect_delay.as_secs(),
                            "connection closed, reconnecting after delay"
                        );
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break SessionOutcome::Shutdown,
                            _ = sleep(self.settings.reconnect_delay) => {}
                        }
                        self.stats.reconnects += 1;
                    }
                },
            }
        };

        self.transition(match outcome {
            SessionOutcome::IdleComplete => SessionState::IdleComplete,
            SessionOutcome::LoggedOut | SessionOutcome::StoreUnavailable => SessionState::Fatal,
            SessionOutcome::Disconnected(_) | SessionOutcome::Shutdown => SessionState::Closed,
        });
        info!(
            ?outcome,
            chats = self.stats.chats,
            contacts = self.stats.contacts,
            messages = self.stats.messages,
            skipped = self.stats.skipped_messages,
            failed_batches = self.stats.failed_batches,
            reconnects = self.stats.reconnects,
            "ingestion session finished"
        );
        outcome
    }

    async fn drive(
        &mut self,
        connection: TransportConnection,
        shutdown: &CancellationToken,
    ) -> ConnectionEnd {
        let TransportConnection {
            mut events,
            replies,
        } = connection;
        let idle_timeout = self.settings.idle_timeout;
        let idle = sleep(idle_timeout);
        tokio::pin!(idle);
        let mut idle_armed = false;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return ConnectionEnd::Finished(SessionOutcome::Shutdown);
                }
                _ = &mut idle, if idle_armed => {
                    info!(
                        idle_secs = idle_timeout.as_secs(),
                        "no batches within idle timeout, backfill complete"
                    );
                    return ConnectionEnd::Finished(SessionOutcome::IdleComplete);
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("transport event stream ended");
                        return ConnectionEnd::Disconnected(DisconnectReason::ConnectionLost);
                    };
                    match self.handle(event, &replies).await {
                        Handled::Opened => {
                            if self.settings.mode == SyncMode::Backfill {
                                idle.as_mut().reset(Instant::now() + idle_timeout);
                                idle_armed = true;
                            }
                        }
                        Handled::Progress => {
                            if idle_armed {
                                idle.as_mut().reset(Instant::now() + idle_timeout);
                            }
                        }
                        Handled::Stalled => {}
                        Handled::Closed(reason) => {
                            info!(%reason, "connection closed");
                            return ConnectionEnd::Disconnected(reason);
                        }
                        Handled::StoreLost => {
                            return ConnectionEnd::Finished(SessionOutcome::StoreUnavailable);
                        }
                    }
                }
            }
        }
    }

    async fn handle(&mut self, event: TransportEvent, replies: &mpsc::Sender<LookupReply>) -> Handled {
        let kind = event.kind();
        let result = match event {
            TransportEvent::Connection(update) => return self.on_connection(update),
            TransportEvent::Chats(chats) => self.ingest_chats(&chats).await,
            TransportEvent::Contacts(contacts) => self.ingest_contacts(&contacts).await,
            TransportEvent::Messages(messages) => self.ingest_messages(&messages).await,
            TransportEvent::History(batch) => self.ingest_history(&batch).await,
            TransportEvent::IdentityMapping(mapping) => self.apply_identity_mapping(&mapping).await,
            TransportEvent::MessageLookup(request) => {
                return match self.answer_lookup(request, replies).await {
                    Err(e) if e.is_connection() => self.store_lost(kind, &e),
                    _ => Handled::Stalled,
                };
            }
            TransportEvent::CredentialsChanged(credentials) => {
                self.relay_credentials(&credentials).await;
                return Handled::Stalled;
            }
        };

        match result {
            Ok(()) => Handled::Progress,
            Err(e) if e.is_connection() => self.store_lost(kind, &e),
            Err(e) => {
                self.stats.failed_batches += 1;
                error!(batch = kind, error = %e, "store write failed, batch aborted");
                Handled::Stalled
            }
        }
    }

    fn store_lost(&mut self, kind: &str, e: &RepositoryError) -> Handled {
        self.stats.failed_batches += 1;
        error!(batch = kind, error = %e, "store unreachable, ending session");
        Handled::StoreLost
    }

    fn on_connection(&mut self, update: ConnectionState) -> Handled {
        match update {
            ConnectionState::Connecting => {
                debug!("transport connecting");
                Handled::Stalled
            }
            ConnectionState::Open => {
                self.transition(SessionState::Open);
                info!(mode = %self.settings.mode, "connection open");
                Handled::Opened
            }
            ConnectionState::Close(reason) => Handled::Closed(reason),
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state change");
            self.state = next;
        }
    }

    // -----------------------------------------------------------------------
    // Batch handlers
    // -----------------------------------------------------------------------

    async fn ingest_chats(&mut self, chats: &[RawRecord]) -> Result<(), RepositoryError> {
        for raw in chats {
            let row = to_chat_row(raw);
            if row.external_key.is_empty() {
                debug!("skipping chat without id");
                continue;
            }
            let id = self.store.upsert_chat(&row).await?;
            self.cache.remember(row.external_key, id);
            self.stats.chats += 1;
        }
        debug!(count = chats.len(), "chat batch stored");
        Ok(())
    }

    async fn ingest_contacts(&mut self, contacts: &[RawRecord]) -> Result<(), RepositoryError> {
        for raw in contacts {
            let row = to_contact_row(raw);
            if row.identity_key.is_empty() {
                debug!("skipping contact without id");
                continue;
            }
            self.store.upsert_contact(&row).await?;
            self.stats.contacts += 1;
        }
        debug!(count = contacts.len(), "contact batch stored");
        Ok(())
    }

    async fn ingest_messages(&mut self, messages: &[RawRecord]) -> Result<(), RepositoryError> {
        for raw in messages {
            let key = message_key(raw);
            let (Some(chat_key), Some(_)) = (key.remote_key.as_deref(), key.id.as_deref()) else {
                debug!("skipping message without conversation key or id");
                self.stats.skipped_messages += 1;
                continue;
            };

            let chat_id = self.cache.resolve(&self.store, chat_key).await?;
            let row = to_message_row(chat_id, &key, raw);
            self.store.upsert_message(&row).await?;
            self.stats.messages += 1;
        }
        debug!(count = messages.len(), "message batch stored");
        Ok(())
    }

    async fn ingest_history(&mut self, batch: &HistoryBatch) -> Result<(), RepositoryError> {
        debug!(
            chats = batch.chats.len(),
            contacts = batch.contacts.len(),
            messages = batch.messages.len(),
            is_latest = batch.is_latest,
            "history batch received"
        );
        self.ingest_chats(&batch.chats).await?;
        self.ingest_contacts(&batch.contacts).await?;
        self.ingest_messages(&batch.messages).await
    }

    /// Record the anonymized → phone-linked pairing on the contact and, if the
    /// chat for the anonymized key has no alternate key yet, on the chat.
    async fn apply_identity_mapping(&mut self, mapping: &IdentityMapping) -> Result<(), RepositoryError> {
        if mapping.lid.is_empty() || mapping.pn.is_empty() {
            debug!("skipping incomplete identity mapping");
            return Ok(());
        }

        self.store.upsert_contact(&contact_row_for_mapping(mapping)).await?;
        let linked = self.store.link_chat_alt_key(&mapping.lid, &mapping.pn).await?;
        self.stats.identity_mappings += 1;
        debug!(lid = %mapping.lid, pn = %mapping.pn, linked, "identity mapping applied");
        Ok(())
    }

    /// Every request gets a reply; a failed or unkeyed lookup answers "not
    /// found". The store error is handed back so a lost store ends the run.
    async fn answer_lookup(
        &mut self,
        request: LookupRequest,
        replies: &mpsc::Sender<LookupReply>,
    ) -> Result<(), RepositoryError> {
        let mut outcome = Ok(());
        let message = if request.chat_key.is_empty() || request.message_id.is_empty() {
            debug!(request_id = %request.request_id, "lookup without chat key or message id");
            None
        } else {
            match self
                .store
                .lookup_message_by_key(&request.chat_key, &request.message_id)
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, message_id = %request.message_id, "message lookup failed");
                    outcome = Err(e);
                    None
                }
            }
        };
        self.stats.lookups += 1;

        let reply = LookupReply {
            request_id: request.request_id,
            message,
        };
        if replies.send(reply).await.is_err() {
            debug!("lookup reply dropped, transport is gone");
        }
        outcome
    }

    async fn relay_credentials(&self, credentials: &Value) {
        match self.credentials.save(credentials).await {
            Ok(()) => debug!("credentials saved"),
            Err(e) => error!(error = %e, "failed to save credentials"),
        }
    }
}
