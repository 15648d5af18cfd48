// Chat screen state
//
// ChatState is the single source of truth for the chat screen: which client
// is selected, which conversation is current, its messages, and whether a
// reply is streaming. It is synchronous and owned by exactly one writer (the
// chat service task); backend results are fed back in through the `*_loaded`
// / `apply_reply` methods, which drop anything that arrives for a context
// the operator has already left.
//
// Flow:
//
//   no client ──change_user──▶ client, no conversation
//        ──start_new_conversation / select_conversation / send_message──▶
//   conversation active ──send_message──▶ (Awaiting → Receiving → Idle)

use super::streaming::{ReplyPhase, ReplyStateMachine};
use crate::backend::ReplyEvent;
use crate::model::{
    title_from_message, Client, Conversation, DeliveryStatus, Message, MessageKind, Policy,
};
use chrono::Utc;
use thiserror::Error;

/// Rejected chat operations
///
/// The view disables the controls that would trigger most of these; they
/// still reach the operator as a toast if a command slips through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Selecione um cliente primeiro")]
    NoClientSelected,
    #[error("A mensagem está vazia")]
    BlankMessage,
    #[error("Aguarde a resposta anterior")]
    SendInFlight,
    #[error("Cliente não encontrado: {0}")]
    UnknownClient(String),
    #[error("Nenhum cliente informado")]
    BlankClientId,
    #[error("A conversa não pertence ao cliente selecionado")]
    ForeignConversation,
    #[error("Nenhuma mensagem com falha para reenviar")]
    NothingToRetry,
    #[error("O serviço de chat foi encerrado")]
    Stopped,
}

/// What the service has to do to deliver a submitted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendPlan {
    /// Send into the current conversation
    Send {
        conversation_id: String,
        text: String,
    },
    /// No conversation yet: create one for the client, then send
    CreateThenSend {
        client_id: String,
        title: Option<String>,
        text: String,
    },
}

/// The send currently awaiting its reply
#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    /// Unset until an implicitly created conversation exists
    conversation_id: Option<String>,
    /// Local id at first, the stored id once accepted
    message_id: String,
}

/// Loads in flight; `ChatState::is_loading` is set while any is pending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PendingLoads {
    clients: bool,
    /// Conversations and policies of the selected client
    client_data: bool,
    conversation: bool,
    history: bool,
}

impl PendingLoads {
    fn any(self) -> bool {
        self.clients || self.client_data || self.conversation || self.history
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub selected_user_id: Option<String>,
    pub current_conversation: Option<Conversation>,
    /// Messages of the current conversation, chronological
    pub messages: Vec<Message>,
    /// Conversations of the selected client, most recent first
    pub conversations: Vec<Conversation>,
    pub available_users: Vec<Client>,
    pub user_policies: Vec<Policy>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    /// Bumped whenever an error is surfaced, so views can toast each one once
    pub error_count: u64,

    reply: ReplyStateMachine,
    /// Load generation; results tagged with an older one are stale
    generation: u64,
    in_flight: Option<InFlight>,
    pending: PendingLoads,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Derived state
    // ─────────────────────────────────────────────────────────────────────

    pub fn reply_phase(&self) -> ReplyPhase {
        self.reply.phase()
    }

    pub fn is_streaming(&self) -> bool {
        self.reply.phase().is_streaming()
    }

    pub fn selected_client(&self) -> Option<&Client> {
        let id = self.selected_user_id.as_deref()?;
        self.available_users.iter().find(|c| c.id == id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The composer may submit this input
    pub fn can_send(&self, input: &str) -> bool {
        !input.trim().is_empty() && self.selected_user_id.is_some() && !self.is_streaming()
    }

    /// Conversations whose title or client name contains `term`
    ///
    /// Case-insensitive; a blank term matches everything.
    pub fn filtered_conversations(&self, term: &str) -> Vec<&Conversation> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.conversations.iter().collect();
        }

        let client_matches = self
            .selected_client()
            .is_some_and(|c| c.name.to_lowercase().contains(&term));

        self.conversations
            .iter()
            .filter(|c| client_matches || c.display_title().to_lowercase().contains(&term))
            .collect()
    }

    pub fn active_policy_count(&self) -> usize {
        self.user_policies.iter().filter(|p| p.is_active()).count()
    }

    /// Newest user message that failed to send
    pub fn failed_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user() && m.status == DeliveryStatus::Failed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Errors
    // ─────────────────────────────────────────────────────────────────────

    pub fn surface_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.error_count += 1;
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Clients
    // ─────────────────────────────────────────────────────────────────────

    pub fn begin_clients_load(&mut self) {
        self.pending.clients = true;
        self.sync_loading();
    }

    /// Replace the client list; a selection that disappeared is dropped
    pub fn clients_loaded(&mut self, clients: Vec<Client>) {
        self.available_users = clients;
        self.pending.clients = false;

        let still_visible = match self.selected_user_id.as_deref() {
            Some(id) => self.available_users.iter().any(|c| c.id == id),
            None => true,
        };
        if !still_visible {
            self.reset_client_context();
            self.selected_user_id = None;
        }
        self.sync_loading();
    }

    /// The client list could not be loaded; the previous list stays
    pub fn clients_failed(&mut self, error: impl Into<String>) {
        self.pending.clients = false;
        self.sync_loading();
        self.surface_error(error);
    }

    /// Switch the client context
    ///
    /// Returns the load generation the conversations/policies load must be
    /// tagged with.
    pub fn change_user(&mut self, user_id: &str) -> Result<u64, ChatError> {
        if user_id.trim().is_empty() {
            return Err(ChatError::BlankClientId);
        }
        if !self.available_users.iter().any(|c| c.id == user_id) {
            return Err(ChatError::UnknownClient(user_id.to_string()));
        }

        self.reset_client_context();
        self.selected_user_id = Some(user_id.to_string());
        self.pending.client_data = true;
        self.sync_loading();
        self.generation += 1;
        Ok(self.generation)
    }

    fn reset_client_context(&mut self) {
        self.current_conversation = None;
        self.messages.clear();
        self.conversations.clear();
        self.user_policies.clear();
        self.pending = PendingLoads {
            clients: self.pending.clients,
            ..PendingLoads::default()
        };
    }

    fn sync_loading(&mut self) {
        self.is_loading = self.pending.any();
    }

    /// Conversations and policies of a client arrived
    ///
    /// Returns false (and changes nothing) for a stale generation.
    pub fn users_loaded(
        &mut self,
        generation: u64,
        conversations: Vec<Conversation>,
        policies: Vec<Policy>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        self.conversations = conversations;
        self.user_policies = policies;
        // The query may predate a conversation created since
        if let Some(current) = &self.current_conversation {
            let belongs = self.selected_user_id.as_deref() == Some(current.client_id.as_str());
            if belongs && !self.conversations.iter().any(|c| c.id == current.id) {
                self.conversations.insert(0, current.clone());
            }
        }
        self.pending.client_data = false;
        self.sync_loading();
        true
    }

    /// Loading the selected client's conversations or policies failed
    pub fn load_failed(&mut self, generation: u64, error: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.pending.client_data = false;
        self.sync_loading();
        self.surface_error(error);
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Conversations
    // ─────────────────────────────────────────────────────────────────────

    /// Begin creating an empty conversation for the selected client
    ///
    /// The current conversation is left unset until the backend answers, so
    /// a failed creation leaves no conversation active.
    pub fn start_new_conversation(&mut self, user_id: &str) -> Result<(), ChatError> {
        if user_id.trim().is_empty() {
            return Err(ChatError::BlankClientId);
        }
        if self.selected_user_id.as_deref() != Some(user_id) {
            return Err(ChatError::UnknownClient(user_id.to_string()));
        }

        self.current_conversation = None;
        self.messages.clear();
        self.pending.conversation = true;
        self.pending.history = false;
        self.sync_loading();
        Ok(())
    }

    /// A conversation was created for the selected client
    ///
    /// It becomes current and is listed first. When it was created to carry
    /// a pending send (`carries_send`), the optimistic message moves into it.
    pub fn conversation_created(&mut self, conversation: Conversation, carries_send: bool) -> bool {
        let waiting = carries_send && self.waiting_for_conversation();
        if waiting {
            if let Some(in_flight) = self.in_flight.as_mut() {
                in_flight.conversation_id = Some(conversation.id.clone());
            }
        }
        if self.selected_user_id.as_deref() != Some(conversation.client_id.as_str()) {
            return false;
        }

        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation.clone());
        self.pending.conversation = false;

        if waiting {
            // The operator opened another conversation in the meantime
            if self.current_conversation.is_some() {
                self.sync_loading();
                return true;
            }
            for message in &mut self.messages {
                message.conversation_id = conversation.id.clone();
            }
        } else {
            self.messages.clear();
        }

        self.current_conversation = Some(conversation);
        self.pending.history = false;
        self.sync_loading();
        true
    }

    /// Creating a conversation failed
    ///
    /// A send waiting on that conversation fails with it.
    pub fn conversation_failed(
        &mut self,
        client_id: &str,
        error: impl Into<String>,
        carries_send: bool,
    ) -> bool {
        if carries_send && self.waiting_for_conversation() {
            if let Some(in_flight) = self.in_flight.take() {
                self.mark_failed(&in_flight.message_id);
                self.reply.on_finished();
            }
        }
        if self.selected_user_id.as_deref() != Some(client_id) {
            return false;
        }
        self.pending.conversation = false;
        self.sync_loading();
        self.surface_error(error);
        true
    }

    fn waiting_for_conversation(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| f.conversation_id.is_none())
    }

    /// Make an existing conversation current; its history loads separately
    pub fn select_conversation(&mut self, conversation: &Conversation) -> Result<(), ChatError> {
        let Some(selected) = self.selected_user_id.as_deref() else {
            return Err(ChatError::NoClientSelected);
        };
        if conversation.client_id != selected {
            return Err(ChatError::ForeignConversation);
        }

        self.current_conversation = Some(conversation.clone());
        self.messages.clear();
        self.pending.history = true;
        self.sync_loading();
        Ok(())
    }

    /// History of a conversation arrived; ignored unless it is still current
    pub fn messages_loaded(&mut self, conversation_id: &str, messages: Vec<Message>) -> bool {
        if !self.is_current(conversation_id) {
            return false;
        }
        self.messages = messages;
        self.pending.history = false;
        self.sync_loading();
        true
    }

    /// A history load failed for a conversation
    pub fn messages_failed(&mut self, conversation_id: &str, error: impl Into<String>) -> bool {
        if !self.is_current(conversation_id) {
            return false;
        }
        self.pending.history = false;
        self.sync_loading();
        self.surface_error(error);
        true
    }

    fn is_current(&self, conversation_id: &str) -> bool {
        self.current_conversation
            .as_ref()
            .is_some_and(|c| c.id == conversation_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────

    /// Submit a message
    ///
    /// The user message is appended immediately (pending) and the reply
    /// phase starts. The returned plan tells the service what to call.
    pub fn send_message(&mut self, text: &str) -> Result<SendPlan, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::BlankMessage);
        }
        let Some(client_id) = self.selected_user_id.clone() else {
            return Err(ChatError::NoClientSelected);
        };
        if self.is_streaming() {
            return Err(ChatError::SendInFlight);
        }

        let conversation_id = self.current_conversation.as_ref().map(|c| c.id.clone());
        let message = Message::pending_user(conversation_id.as_deref().unwrap_or_default(), text);

        self.in_flight = Some(InFlight {
            conversation_id: conversation_id.clone(),
            message_id: message.id.clone(),
        });
        self.messages.push(message);
        self.reply.on_submit();
        self.last_error = None;

        Ok(match conversation_id {
            Some(conversation_id) => SendPlan::Send {
                conversation_id,
                text: text.to_string(),
            },
            None => SendPlan::CreateThenSend {
                client_id,
                title: title_from_message(text),
                text: text.to_string(),
            },
        })
    }

    /// Resend the newest failed message
    ///
    /// The failed bubble is removed and its text goes out as a new send.
    pub fn retry_failed(&mut self) -> Result<SendPlan, ChatError> {
        if self.selected_user_id.is_none() {
            return Err(ChatError::NoClientSelected);
        }
        if self.is_streaming() {
            return Err(ChatError::SendInFlight);
        }
        let Some(index) = self
            .messages
            .iter()
            .rposition(|m| m.is_user() && m.status == DeliveryStatus::Failed)
        else {
            return Err(ChatError::NothingToRetry);
        };

        let failed = self.messages.remove(index);
        self.send_message(&failed.content)
    }

    /// Apply reply progress for a conversation
    ///
    /// Progress for anything but the in-flight send is dropped. Messages are
    /// only touched while that conversation is on screen, but the terminal
    /// event always ends the send.
    pub fn apply_reply(&mut self, conversation_id: &str, event: ReplyEvent) -> bool {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return false;
        };
        if in_flight.conversation_id.as_deref() != Some(conversation_id) {
            return false;
        }
        let visible = self
            .current_conversation
            .as_ref()
            .is_some_and(|c| c.id == conversation_id);

        match event {
            ReplyEvent::Accepted(stored) => {
                let local_id = std::mem::replace(&mut in_flight.message_id, stored.id.clone());
                self.touch_conversation(&stored);
                if visible {
                    if let Some(message) = self.messages.iter_mut().find(|m| m.id == local_id) {
                        *message = stored;
                    }
                }
            }
            ReplyEvent::Delta(text) => {
                self.reply.on_delta();
                if visible {
                    self.append_delta(conversation_id, &text);
                }
            }
            ReplyEvent::Completed(stored) => {
                if visible {
                    self.drop_streaming_bubble();
                    self.messages.push(stored.clone());
                }
                self.touch_conversation(&stored);
                self.in_flight = None;
                self.reply.on_finished();
            }
            ReplyEvent::Failed(reason) => {
                let message_id = in_flight.message_id.clone();
                if visible {
                    self.drop_streaming_bubble();
                    self.mark_failed(&message_id);
                }
                self.in_flight = None;
                self.reply.on_finished();
                self.surface_error(format!("Falha ao enviar: {}", reason));
            }
        }
        true
    }

    /// Append reply text to the AI bubble being streamed, creating it first
    fn append_delta(&mut self, conversation_id: &str, text: &str) {
        match self.messages.last_mut() {
            Some(last) if last.kind == MessageKind::Ai && last.status == DeliveryStatus::Pending => {
                last.content.push_str(text);
            }
            _ => self.messages.push(Message {
                id: format!("streaming-{}", crate::model::new_id()),
                conversation_id: conversation_id.to_string(),
                kind: MessageKind::Ai,
                content: text.to_string(),
                created_at: Utc::now(),
                tokens: None,
                status: DeliveryStatus::Pending,
            }),
        }
    }

    fn drop_streaming_bubble(&mut self) {
        if self
            .messages
            .last()
            .is_some_and(|m| m.kind == MessageKind::Ai && m.status == DeliveryStatus::Pending)
        {
            self.messages.pop();
        }
    }

    fn mark_failed(&mut self, message_id: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.status = DeliveryStatus::Failed;
        }
    }

    /// Mirror the backend: a stored message bumps its conversation to the top
    fn touch_conversation(&mut self, message: &Message) {
        let title = if message.is_user() {
            title_from_message(&message.content)
        } else {
            None
        };
        let bump = |c: &mut Conversation| {
            c.updated_at = c.updated_at.max(message.created_at);
            if c.title.is_none() {
                c.title = title.clone();
            }
        };

        if let Some(index) = self
            .conversations
            .iter()
            .position(|c| c.id == message.conversation_id)
        {
            let mut conversation = self.conversations.remove(index);
            bump(&mut conversation);
            self.conversations.insert(0, conversation);
        }
        if let Some(current) = self.current_conversation.as_mut() {
            if current.id == message.conversation_id {
                bump(current);
            }
        }
    }
}
