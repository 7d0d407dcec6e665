//! Chat client: single-flight turn lifecycle and event interpretation
//!
//! One [`ChatClient`] drives one conversation. `send` opens the response
//! stream for a turn (at most one in flight), the interpreter applies each
//! decoded frame to the identity cell and the accumulator, and the reveal
//! scheduler republishes a display-safe prefix until the turn ends. All
//! transient turn state is torn down before the next turn may start,
//! whatever the outcome.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;

use opchat_wire::{FrameDecoder, StreamEvent, delta_fragment};

use crate::accumulator::TurnAccumulator;
use crate::error::{Error, Result};
use crate::events::ChatEvent;
use crate::identity::{Identity, IdentityCell};
use crate::message::Message;
use crate::reveal::{self, RevealConfig};
use crate::store::{SessionRecord, SessionStore};
use crate::transport::{Environment, Transport, TurnRequest};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Target agent for every turn
    pub agent_id: String,
    /// Reveal pacing
    pub reveal: RevealConfig,
}

impl ChatConfig {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            reveal: RevealConfig::default(),
        }
    }
}

/// Observable conversation state, shared with the reveal scheduler.
pub(crate) struct ChatState {
    pub(crate) messages: Vec<Message>,
    pub(crate) turn: TurnAccumulator,
    pub(crate) displayed_chars: usize,
    pub(crate) is_streaming: bool,
}

impl ChatState {
    pub(crate) fn new() -> Self {
        Self {
            messages: Vec::new(),
            turn: TurnAccumulator::new(),
            displayed_chars: 0,
            is_streaming: false,
        }
    }

    /// Characters accumulated but not yet revealed.
    pub(crate) fn reveal_gap(&self) -> usize {
        self.turn
            .text()
            .chars()
            .count()
            .saturating_sub(self.displayed_chars)
    }

    /// Advance the displayed prefix by at most `step` characters.
    pub(crate) fn advance_reveal(&mut self, step: usize) {
        let total = self.turn.text().chars().count();
        self.displayed_chars = (self.displayed_chars + step).min(total);
    }

    /// The paced prefix of the in-progress turn.
    pub(crate) fn displayed_text(&self) -> String {
        let text = self.turn.text();
        match text.char_indices().nth(self.displayed_chars) {
            Some((boundary, _)) => text[..boundary].to_string(),
            None => text.to_string(),
        }
    }

    /// Tear down all transient turn state.
    fn clear_turn(&mut self) {
        self.turn.reset();
        self.displayed_chars = 0;
        self.is_streaming = false;
    }
}

/// Cancellation and single-flight bookkeeping for the in-flight turn.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
struct TurnHandle {
    cancel: Arc<Mutex<CancellationToken>>,
    is_running: Arc<AtomicBool>,
    idle_notify: Arc<Notify>,
}

impl TurnHandle {
    fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_running: Arc::new(AtomicBool::new(false)),
            idle_notify: Arc::new(Notify::new()),
        }
    }

    /// Claim the single-flight slot and install a fresh token.
    /// Returns `None` when a turn is already active.
    fn try_begin(&self) -> Option<CancellationToken> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        Some(token)
    }

    /// Cancel the current token. Idempotent; cancelling a finished turn is
    /// a safe no-op.
    fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    fn finish(&self) {
        self.is_running.store(false, Ordering::Release);
        self.idle_notify.notify_waiters();
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    async fn wait_for_idle(&self) {
        loop {
            let notified = self.idle_notify.notified();
            tokio::pin!(notified);
            // Register the waiter before re-checking, so a finish() landing
            // between the check and the await cannot be missed.
            notified.as_mut().enable();
            if !self.is_running.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

/// Streaming chat client for one conversation.
pub struct ChatClient {
    config: ChatConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    identity: IdentityCell,
    state: Arc<Mutex<ChatState>>,
    event_tx: broadcast::Sender<ChatEvent>,
    reveal_notify: Arc<Notify>,
    handle: TurnHandle,
}

impl ChatClient {
    pub fn new(
        config: ChatConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            transport,
            store,
            identity: IdentityCell::new(),
            state: Arc::new(Mutex::new(ChatState::new())),
            event_tx,
            reveal_notify: Arc::new(Notify::new()),
            handle: TurnHandle::new(),
        }
    }

    /// Subscribe to turn lifecycle events. `Error` events are the caller's
    /// failure surface; cancellation is reported as `Cancelled`.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Restore persisted identity for this agent, if any.
    pub async fn load_session(&self) {
        if let Some(record) = self.store.get(&self.config.agent_id).await {
            self.identity.restore(Identity {
                thread_id: record.thread_id,
                user_id: record.user_id,
            });
        }
    }

    /// Start a turn. Fire-and-forget: the turn runs on a spawned task and
    /// reports through the event channel and the observable state.
    ///
    /// A no-op when `text` is empty after trimming or a turn is already in
    /// flight.
    pub fn send(&self, text: &str, user_name: Option<&str>, test_mode: bool) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let Some(token) = self.handle.try_begin() else {
            tracing::debug!("send ignored: a turn is already in flight");
            return;
        };

        {
            let mut state = self.state.lock();
            state.messages.push(Message::user(text.clone()));
            state.clear_turn();
            state.is_streaming = true;
        }
        let _ = self.event_tx.send(ChatEvent::TurnStart);

        let ctx = TurnCtx {
            agent_id: self.config.agent_id.clone(),
            text,
            user_name: user_name.map(str::to_string),
            environment: if test_mode {
                Environment::Test
            } else {
                Environment::Live
            },
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            identity: self.identity.clone(),
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
            reveal_notify: Arc::clone(&self.reveal_notify),
        };
        let handle = self.handle.clone();
        let reveal_config = self.config.reveal;

        tokio::spawn(async move {
            let reveal_task = reveal::spawn(
                Arc::clone(&ctx.state),
                Arc::clone(&ctx.reveal_notify),
                token.child_token(),
                reveal_config,
            );

            let outcome = tokio::select! {
                result = ctx.run() => result,
                _ = token.cancelled() => Err(Error::Aborted),
            };

            // Invalidate this turn's scheduler before tearing down buffers;
            // it is replaced, never reused.
            token.cancel();
            let _ = reveal_task.await;
            ctx.state.lock().clear_turn();

            match outcome {
                Ok(()) => {
                    let _ = ctx.event_tx.send(ChatEvent::TurnEnd);
                }
                Err(e) if e.is_cancellation() => {
                    let _ = ctx.event_tx.send(ChatEvent::Cancelled);
                }
                Err(e) => {
                    tracing::warn!("turn failed: {e}");
                    let _ = ctx.event_tx.send(ChatEvent::Error {
                        message: e.to_string(),
                    });
                }
            }

            handle.finish();
        });
    }

    /// Cancel the in-flight turn, if any. A normal exit, not a failure;
    /// idempotent.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Start a new conversation: ends any in-flight turn, clears history
    /// and identity, and removes the persisted session record.
    pub async fn reset(&self) {
        self.handle.cancel();
        self.handle.wait_for_idle().await;
        self.identity.clear();
        self.store.remove(&self.config.agent_id).await;
        let mut state = self.state.lock();
        state.messages.clear();
        state.clear_turn();
    }

    /// Ordered, append-only message history.
    pub fn history(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    /// The paced prefix of the in-progress assistant turn.
    pub fn displayed_text(&self) -> String {
        self.state.lock().displayed_text()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().is_streaming
    }

    pub fn thread_id(&self) -> Option<String> {
        self.identity.thread_id()
    }

    pub fn user_id(&self) -> Option<String> {
        self.identity.user_id()
    }

    /// Whether a turn is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.handle.is_running()
    }

    /// Wait until the in-flight turn (if any) has fully torn down.
    pub async fn wait_for_idle(&self) {
        self.handle.wait_for_idle().await;
    }

    /// Wait for idle with a timeout. Returns `true` if idle was reached.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }
}

/// Outcome of applying one event.
enum Flow {
    Continue,
    Finished,
}

/// Everything one turn's task needs, cloned out of the client at send time.
/// Identity is still read through the shared cell at each point of use.
struct TurnCtx {
    agent_id: String,
    text: String,
    user_name: Option<String>,
    environment: Environment,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    identity: IdentityCell,
    state: Arc<Mutex<ChatState>>,
    event_tx: broadcast::Sender<ChatEvent>,
    reveal_notify: Arc<Notify>,
}

impl TurnCtx {
    /// Open the stream and pump decoded events through the interpreter.
    async fn run(&self) -> Result<()> {
        // The identity snapshot happens here, when the request is built,
        // not when the turn was queued.
        let request = TurnRequest::build(
            &self.agent_id,
            &self.text,
            self.environment,
            &self.identity.snapshot(),
            self.user_name.as_deref(),
        );

        let mut stream = self.transport.open(&request).await?;
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in decoder.feed(&chunk) {
                if let Flow::Finished = self.apply(event).await? {
                    return Ok(());
                }
            }
        }
        if let Some(event) = decoder.finish() {
            if let Flow::Finished = self.apply(event).await? {
                return Ok(());
            }
        }

        // Stream ended without a terminal frame; finish with whatever
        // accumulated. The idempotent commit keeps this safe under every
        // completion ordering.
        self.commit_turn(None, None, true);
        Ok(())
    }

    /// Apply one decoded event; the §4.2-style dispatch table.
    async fn apply(&self, event: StreamEvent) -> Result<Flow> {
        match event {
            StreamEvent::Session { user_id } => {
                if let Some(user_id) = user_id {
                    self.identity.commit_user(user_id);
                    self.persist_identity().await;
                }
            }
            StreamEvent::Thread { thread_id, user_id } => {
                self.identity.commit_thread(thread_id, user_id);
                self.persist_identity().await;
            }
            event if event.is_liveness() => {
                self.state.lock().is_streaming = true;
            }
            StreamEvent::MessageDelta { payload } => {
                if let Some(fragment) = delta_fragment(&payload) {
                    self.state.lock().turn.append(fragment);
                    self.reveal_notify.notify_one();
                    let _ = self.event_tx.send(ChatEvent::Delta {
                        fragment: fragment.to_string(),
                    });
                }
            }
            StreamEvent::MessageCompleted { id, run_id } => {
                self.commit_turn(id, run_id, false);
            }
            StreamEvent::RunCompleted => {
                self.commit_turn(None, None, true);
            }
            StreamEvent::Done => {
                self.commit_turn(None, None, true);
                return Ok(Flow::Finished);
            }
            StreamEvent::Error { message } => {
                return Err(Error::Protocol(message));
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    /// Freeze the accumulator into a history message, at most once per turn.
    ///
    /// `thread.message.completed` is the authoritative commit point and
    /// always commits; run-completed/done/EOF only commit when text
    /// accumulated (`require_text`), guarding the duplicate-completion case.
    fn commit_turn(&self, id: Option<String>, run_id: Option<String>, require_text: bool) {
        let committed = {
            let mut state = self.state.lock();
            if require_text && state.turn.is_empty() {
                state.is_streaming = false;
                None
            } else {
                state.turn.commit(id, run_id).map(|message| {
                    state.displayed_chars = 0;
                    state.is_streaming = false;
                    state.messages.push(message.clone());
                    message
                })
            }
        };
        if let Some(message) = committed {
            let _ = self.event_tx.send(ChatEvent::MessageCommitted { message });
        }
    }

    /// Write the latest committed identity through the injected store.
    async fn persist_identity(&self) {
        let snapshot = self.identity.snapshot();
        self.store
            .set(
                &self.agent_id,
                SessionRecord {
                    thread_id: snapshot.thread_id,
                    user_id: snapshot.user_id,
                },
            )
            .await;
    }
}
