use std::sync::Arc;

use {
    futures::StreamExt,
    relay_agents::{
        EventStream, MemoryStore, Message, RemoteAgent, SessionStore, TurnUser, build, enrich_text,
    },
    relay_channels::{DeliveryAdapter, DeliveryHandle, chunk_text},
    relay_common::{AttachedFile, NormalizedPart},
    relay_media::{AttachmentPolicy, normalize},
    relay_sessions::{ConversationIdentity, SessionCache, SessionRecord},
    serde_json::{Map, Value},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    accumulator::ReplyState,
    error::Context,
    classify::{Classified, classify},
    retry::{FaultAction, RetryController},
};

/// State key the agent reads to decide whose memory it may access.
const USER_ID_STATE_KEY: &str = "user_id";

/// Author recorded for context messages.
const CONTEXT_AUTHOR: &str = "user";

/// Behaviour knobs shared by every turn.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Text of the placeholder posted before streaming starts.
    pub placeholder: String,
    /// Forward tool-call and tool-response traces live.
    pub show_tools: bool,
    /// Switch the session to the sender's personal identity for the turn.
    pub personal_memory: bool,
    /// Capacity of the channel between the stream reader and the accumulator.
    pub stream_buffer: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            placeholder: "🧠 Thinking...".into(),
            show_tools: false,
            personal_memory: true,
            stream_buffer: 64,
        }
    }
}

/// One inbound message that expects a reply.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation: ConversationIdentity,
    pub user: Option<TurnUser>,
    pub text: String,
    pub attachments: Vec<AttachedFile>,
    pub show_tools: bool,
}

/// How a turn ended from the user's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The placeholder could not be posted; nothing was sent.
    Aborted,
    /// The agent produced nothing to show; the placeholder was removed.
    Discarded,
    /// The reply (or an apology) was delivered in `chunks` messages.
    Delivered { chunks: usize },
    /// Writing the reply to the platform failed.
    DeliveryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NoActiveSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    NoActiveSession,
    /// The conversation was bound to a session the store no longer has.
    SessionMissing,
}

/// What the stream reader hands to the accumulator.
enum StreamItem {
    Outcome(Classified),
    DecodeError(String),
    Fault(relay_agents::Error),
}

pub struct ChatOrchestrator {
    sessions: Arc<SessionCache>,
    agent: Arc<dyn RemoteAgent>,
    store: Arc<dyn SessionStore>,
    memory: Option<Arc<dyn MemoryStore>>,
    attachments: AttachmentPolicy,
    settings: ChatSettings,
}

impl ChatOrchestrator {
    pub fn new(
        sessions: Arc<SessionCache>,
        agent: Arc<dyn RemoteAgent>,
        store: Arc<dyn SessionStore>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            sessions,
            agent,
            store,
            memory: None,
            attachments: AttachmentPolicy::default(),
            settings,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_attachment_policy(mut self, policy: AttachmentPolicy) -> Self {
        self.attachments = policy;
        self
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Reply to one conversation turn.
    ///
    /// Never returns an error: every fault ends up either as a message to the
    /// user or, when even the placeholder cannot be posted, as
    /// [`DeliveryOutcome::Aborted`].
    pub async fn handle_turn(
        &self,
        mut turn: TurnRequest,
        delivery: &dyn DeliveryAdapter,
    ) -> DeliveryOutcome {
        let attachments = std::mem::take(&mut turn.attachments);
        let conversation = &turn.conversation;
        let handle = match delivery.post_placeholder(&self.settings.placeholder).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "failed to post placeholder; aborting turn");
                return DeliveryOutcome::Aborted;
            },
        };
        if let Err(e) = delivery.send_typing().await {
            debug!(conversation = %conversation, error = %e, "typing indicator failed");
        }

        let prepared = self.prepare(turn.user.as_ref(), &turn.text, attachments);
        let result = if prepared.is_empty() {
            Err(Error::message("nothing to send: the message is empty"))
        } else {
            self.run_with_retry(&turn, &prepared, delivery).await
        };
        self.finalize(conversation, &handle, result, delivery).await
    }

    /// Enrich the text and normalize attachments once per turn; each attempt
    /// builds its own [`Message`] from the result.
    fn prepare(
        &self,
        user: Option<&TurnUser>,
        text: &str,
        attachments: Vec<AttachedFile>,
    ) -> PreparedTurn {
        let names: Vec<&str> = attachments.iter().map(|f| f.name.as_str()).collect();
        let text = if text.is_empty() && names.is_empty() {
            String::new()
        } else {
            enrich_text(user, text, &names)
        };
        let report = normalize(attachments, &self.attachments);
        PreparedTurn {
            text,
            parts: report.parts,
        }
    }

    async fn run_with_retry(
        &self,
        turn: &TurnRequest,
        prepared: &PreparedTurn,
        delivery: &dyn DeliveryAdapter,
    ) -> Result<ReplyState> {
        let mut retry = RetryController::new();
        loop {
            let record = self.sessions.resolve(&turn.conversation).await?;
            let message = prepared.message();
            let err = match self.run_attempt(turn, &record, &message, delivery).await {
                Ok(state) => return Ok(state),
                Err(e) => e,
            };
            match retry.on_fault(err.is_stale_session()) {
                FaultAction::Retry => {
                    warn!(
                        conversation = %turn.conversation,
                        session_id = %record.session_id,
                        error = %err,
                        "remote session is gone; retrying with a fresh one"
                    );
                    self.sessions
                        .invalidate_if(&turn.conversation, &record.session_id)
                        .await;
                    retry.begin_retry();
                },
                FaultAction::Abandon => return Err(err),
            }
        }
    }

    async fn run_attempt(
        &self,
        turn: &TurnRequest,
        record: &SessionRecord,
        message: &Message,
        delivery: &dyn DeliveryAdapter,
    ) -> Result<ReplyState> {
        let switched = match (&turn.user, self.settings.personal_memory) {
            (Some(user), true) => self.switch_identity(record, &user.personal_identity).await?,
            _ => false,
        };

        let outcome = self.stream_reply(turn, record, message, delivery).await;

        // A stale session cannot be written to; the retry gets its own swap.
        let stale = matches!(&outcome, Err(e) if e.is_stale_session());
        if switched && !stale {
            let own = record.identity.external_user_id().to_string();
            if let Err(e) = self.set_state_identity(record, own).await {
                warn!(
                    conversation = %record.identity,
                    session_id = %record.session_id,
                    error = %e,
                    "failed to restore session identity"
                );
            }
        }
        outcome
    }

    /// Point the session at the sender's personal identity. A stale session
    /// fails the attempt; any other failure is logged and the turn goes on
    /// without the swap.
    async fn switch_identity(&self, record: &SessionRecord, personal: &str) -> Result<bool> {
        match self.set_state_identity(record, personal.to_string()).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_stale_session() => Err(e.into()),
            Err(e) => {
                warn!(
                    conversation = %record.identity,
                    session_id = %record.session_id,
                    error = %e,
                    "failed to switch session identity"
                );
                Ok(false)
            },
        }
    }

    async fn set_state_identity(
        &self,
        record: &SessionRecord,
        identity: String,
    ) -> relay_agents::Result<()> {
        let mut delta = Map::new();
        delta.insert(USER_ID_STATE_KEY.into(), Value::String(identity));
        self.store
            .append_state_delta(
                &record.session_id,
                record.identity.external_user_id(),
                delta,
            )
            .await
    }

    async fn stream_reply(
        &self,
        turn: &TurnRequest,
        record: &SessionRecord,
        message: &Message,
        delivery: &dyn DeliveryAdapter,
    ) -> Result<ReplyState> {
        let stream = self
            .agent
            .stream_turn(
                record.identity.external_user_id(),
                &record.session_id,
                message,
            )
            .await?;

        let (tx, mut rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        tokio::spawn(read_events(stream, tx));

        let mut state = ReplyState::default();
        while let Some(item) = rx.recv().await {
            let trace = match item {
                StreamItem::Outcome(outcome) => state.apply(outcome, turn.show_tools),
                StreamItem::DecodeError(detail) => {
                    warn!(conversation = %turn.conversation, detail = %detail, "undecodable agent event");
                    Some(state.record_decode_error(&detail))
                },
                StreamItem::Fault(e) => return Err(e.into()),
            };
            if let Some(trace) = trace
                && let Err(e) = delivery.post_trace(&trace).await
            {
                warn!(conversation = %turn.conversation, error = %e, "failed to post trace");
            }
        }
        debug!(
            conversation = %turn.conversation,
            session_id = %record.session_id,
            answer_len = state.final_answer().len(),
            traces = state.trace_log().len(),
            "agent stream finished"
        );
        Ok(state)
    }

    async fn finalize(
        &self,
        conversation: &ConversationIdentity,
        handle: &DeliveryHandle,
        result: Result<ReplyState>,
        delivery: &dyn DeliveryAdapter,
    ) -> DeliveryOutcome {
        let text = match result {
            Ok(state) => match state.display_text() {
                Some(text) => text.to_string(),
                None => {
                    info!(conversation = %conversation, "agent produced no output");
                    if let Err(e) = delivery.delete_placeholder(handle).await {
                        warn!(conversation = %conversation, error = %e, "failed to delete placeholder");
                    }
                    return DeliveryOutcome::Discarded;
                },
            },
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "turn failed");
                format!("Sorry, an error occurred: {e}")
            },
        };

        let chunks = chunk_text(&text, delivery.max_message_len());
        match deliver_chunks(handle, &chunks, delivery).await {
            Ok(()) => {
                info!(conversation = %conversation, chunks = chunks.len(), "reply delivered");
                DeliveryOutcome::Delivered {
                    chunks: chunks.len(),
                }
            },
            Err(e) => {
                warn!(conversation = %conversation, error = %e, "failed to deliver reply");
                let notice = format!("Sorry, an error occurred while sending the reply: {e}");
                if let Err(e) = delivery.post_follow_up(&notice).await {
                    warn!(conversation = %conversation, error = %e, "failed to report delivery error");
                }
                DeliveryOutcome::DeliveryFailed
            },
        }
    }

    /// Add a message to the conversation's session without running the agent.
    pub async fn record_context(
        &self,
        conversation: &ConversationIdentity,
        user: Option<&TurnUser>,
        text: &str,
        attachments: Vec<AttachedFile>,
    ) -> Result<()> {
        let prepared = self.prepare(user, text, attachments);
        if prepared.is_empty() {
            return Ok(());
        }

        let mut retry = RetryController::new();
        loop {
            let record = self.sessions.resolve(conversation).await?;
            let message = prepared.message();
            let err = match self
                .store
                .append_message(
                    &record.session_id,
                    conversation.external_user_id(),
                    CONTEXT_AUTHOR,
                    message.parts,
                )
                .await
            {
                Ok(()) => {
                    debug!(conversation = %conversation, session_id = %record.session_id, "recorded context message");
                    return Ok(());
                },
                Err(e) => e,
            };
            match retry.on_fault(err.is_stale_session()) {
                FaultAction::Retry => {
                    self.sessions
                        .invalidate_if(conversation, &record.session_id)
                        .await;
                },
                FaultAction::Abandon => return Err(err.into()),
            }
            retry.begin_retry();
        }
    }

    /// Bind the conversation to its newest existing remote session, if any.
    /// Administrative callers use this before [`Self::delete_session`] or
    /// [`Self::save_session_to_memory`] in a process that never saw a turn.
    pub async fn adopt_session(&self, conversation: &ConversationIdentity) -> Result<bool> {
        Ok(self.sessions.adopt(conversation).await?.is_some())
    }

    /// Delete the conversation's remote session and forget it.
    pub async fn delete_session(
        &self,
        conversation: &ConversationIdentity,
    ) -> Result<DeleteOutcome> {
        Ok(match self.sessions.delete(conversation).await? {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NoActiveSession,
        })
    }

    /// Turn the conversation's session into long-term memories.
    pub async fn save_session_to_memory(
        &self,
        conversation: &ConversationIdentity,
    ) -> Result<SaveOutcome> {
        let memory = self
            .memory
            .as_ref()
            .context("no memory store is configured")?;
        let Some(record) = self.sessions.cached(conversation).await else {
            return Ok(SaveOutcome::NoActiveSession);
        };
        let Some(session) = self
            .store
            .get_session(conversation.external_user_id(), &record.session_id)
            .await?
        else {
            return Ok(SaveOutcome::SessionMissing);
        };
        memory.commit_session_to_memory(&session).await?;
        info!(conversation = %conversation, session_id = %session.id, "saved session to memory");
        Ok(SaveOutcome::Saved)
    }
}

/// Enriched text and normalized attachments of one turn.
struct PreparedTurn {
    text: String,
    parts: Vec<NormalizedPart>,
}

impl PreparedTurn {
    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.parts.is_empty()
    }

    fn message(&self) -> Message {
        build(&self.text, self.parts.clone())
    }
}

async fn deliver_chunks(
    handle: &DeliveryHandle,
    chunks: &[String],
    delivery: &dyn DeliveryAdapter,
) -> relay_channels::Result<()> {
    let Some((first, rest)) = chunks.split_first() else {
        return Ok(());
    };
    delivery.update_placeholder(handle, first).await?;
    for chunk in rest {
        delivery.post_follow_up(chunk).await?;
    }
    Ok(())
}

/// Drain the agent stream in the background. Stops at the first fatal fault
/// or once the receiving side is dropped.
async fn read_events(mut stream: EventStream, tx: mpsc::Sender<StreamItem>) {
    while let Some(item) = stream.next().await {
        let batch = match item {
            Ok(event) => classify(event)
                .into_iter()
                .map(StreamItem::Outcome)
                .collect(),
            Err(relay_agents::Error::Decode { detail }) => vec![StreamItem::DecodeError(detail)],
            Err(e) => vec![StreamItem::Fault(e)],
        };
        for item in batch {
            let fatal = matches!(item, StreamItem::Fault(_));
            if tx.send(item).await.is_err() {
                debug!("reply consumer dropped; stopping stream reader");
                return;
            }
            if fatal {
                return;
            }
        }
    }
}
