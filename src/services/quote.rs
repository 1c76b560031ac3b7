use std::sync::Mutex;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{opening_message, FALLBACK_REPLY, OPENING_TRANSCRIPT};
use crate::models::{ConversationRecord, FrameMessage, UploadedFile, UserKey};
use crate::services::attachments::AttachmentEncoder;
use crate::services::gateway::AssistantGateway;
use crate::services::locks::ConversationLocks;
use crate::services::session::SessionResolver;
use crate::services::transcript::TranscriptStore;

/// Where a quote interaction currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingSession,
    AwaitingAttachments { remaining: usize },
    AwaitingAssistantReply,
    AppendingTranscript,
}

/// One visitor's session with the quote widget. A guest keeps the same key
/// for every message sent through the session.
#[derive(Debug, Clone)]
pub struct QuoteSession {
    pub user_key: UserKey,
}

impl QuoteSession {
    pub fn new(member_id: Option<&str>) -> Self {
        Self {
            user_key: UserKey::resolve(member_id),
        }
    }
}

/// Drives the "get quote" and "send" interactions end to end.
pub struct QuoteFlow {
    resolver: SessionResolver,
    gateway: AssistantGateway,
    encoder: AttachmentEncoder,
    transcripts: TranscriptStore,
    locks: ConversationLocks,
    frames: UnboundedSender<FrameMessage>,
    state: Mutex<FlowState>,
}

impl QuoteFlow {
    pub fn new(
        resolver: SessionResolver,
        gateway: AssistantGateway,
        encoder: AttachmentEncoder,
        transcripts: TranscriptStore,
        frames: UnboundedSender<FrameMessage>,
    ) -> Self {
        Self {
            resolver,
            gateway,
            encoder,
            transcripts,
            locks: ConversationLocks::new(),
            frames,
            state: Mutex::new(FlowState::Idle),
        }
    }

    pub fn state(&self) -> FlowState {
        *self.state.lock().unwrap()
    }

    /// Open the conversation with the canned quote request. Does nothing when
    /// no email was entered.
    pub async fn request_quote(
        &self,
        session: &QuoteSession,
        email: &str,
    ) -> Result<Option<ConversationRecord>> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(None);
        }

        let opening = opening_message(email);
        let mut reply_shown = false;
        let result = self
            .exchange(session, email, &opening, OPENING_TRANSCRIPT, &[], &mut reply_shown)
            .await;
        self.finish(result, reply_shown).map(|(record, _)| Some(record))
    }

    /// Send a visitor prompt with optional uploads. Returns the reply shown,
    /// or `None` when the prompt was blank.
    pub async fn send_message(
        &self,
        session: &QuoteSession,
        email: &str,
        prompt: &str,
        uploads: &[UploadedFile],
    ) -> Result<Option<String>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(None);
        }

        let mut reply_shown = false;
        let result = self
            .exchange(session, email.trim(), prompt, prompt, uploads, &mut reply_shown)
            .await;
        self.finish(result, reply_shown).map(|(_, reply)| Some(reply))
    }

    async fn exchange(
        &self,
        session: &QuoteSession,
        email: &str,
        message: &str,
        transcript_line: &str,
        uploads: &[UploadedFile],
        reply_shown: &mut bool,
    ) -> Result<(ConversationRecord, String)> {
        self.post(FrameMessage::user(message));
        self.post(FrameMessage::show_waiting());

        self.transition(FlowState::AwaitingSession);
        let record = self
            .resolver
            .resolve(session.user_key.as_str(), email)
            .await?;

        let _guard = self.locks.acquire(&record.id).await;

        self.transition(FlowState::AwaitingAttachments {
            remaining: uploads.len(),
        });
        let file_ids = self.encoder.encode_all(&record.id, uploads).await;

        self.transition(FlowState::AwaitingAssistantReply);
        let reply = self.gateway.send(&record.thread_id, message, &file_ids).await;

        self.post(FrameMessage::hide_waiting());
        self.post(FrameMessage::bot(reply.as_str()));
        *reply_shown = true;

        self.transition(FlowState::AppendingTranscript);
        self.transcripts
            .append(&record.id, &TranscriptStore::exchange(transcript_line, &reply))
            .await?;

        Ok((record, reply))
    }

    fn finish<T>(&self, result: Result<T>, reply_shown: bool) -> Result<T> {
        if let Err(e) = &result {
            tracing::error!("Quote interaction failed: {:#}", e);
            if !reply_shown {
                self.post(FrameMessage::hide_waiting());
                self.post(FrameMessage::bot(FALLBACK_REPLY));
            }
        }
        self.transition(FlowState::Idle);
        result
    }

    fn transition(&self, next: FlowState) {
        let mut state = self.state.lock().unwrap();
        if let FlowState::AwaitingAttachments { remaining } = next {
            tracing::debug!("Quote flow {:?} -> awaiting {} attachment(s)", *state, remaining);
        } else {
            tracing::debug!("Quote flow {:?} -> {:?}", *state, next);
        }
        *state = next;
    }

    fn post(&self, message: FrameMessage) {
        if self.frames.send(message).is_err() {
            tracing::debug!("Frame receiver dropped");
        }
    }
}
