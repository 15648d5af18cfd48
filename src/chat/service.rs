// Chat service: the single writer of ChatState
//
// Views never touch ChatState directly. They send ChatCommands through a
// ChatHandle and render ChatSnapshots published on a watch channel.
//
//   ChatHandle ──ChatCommand──▶ ┌─────────────┐ ──spawn──▶ backend call
//                               │ ChatService │                │
//   watch::Receiver ◀─snapshot─ │ (ChatState) │ ◀──Internal────┘
//                               └─────────────┘
//
// Backend work runs in spawned tasks that report back over the internal
// channel, so a slow reply never blocks client switching or scrolling.

use super::state::{ChatError, ChatState, SendPlan};
use crate::backend::{ChatBackend, ReplyEvent};
use crate::model::{Client, Conversation, Message, Operator, Policy};
use futures::StreamExt;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Pending commands from views
const COMMAND_BUFFER: usize = 64;

/// Pending results from backend tasks
const INTERNAL_BUFFER: usize = 256;

/// Operations views can request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// (Re)load the clients visible to the operator
    ReloadClients,
    ChangeUser(String),
    /// Start an empty conversation for the selected client
    NewConversation,
    SelectConversation(String),
    SendMessage(String),
    RetryFailed,
    DismissError,
}

/// Immutable view of the chat state at one point in time
#[derive(Debug, Clone)]
pub struct ChatSnapshot(Arc<ChatState>);

impl ChatSnapshot {
    fn capture(state: &ChatState) -> Self {
        Self(Arc::new(state.clone()))
    }
}

impl From<ChatState> for ChatSnapshot {
    fn from(state: ChatState) -> Self {
        Self(Arc::new(state))
    }
}

impl Deref for ChatSnapshot {
    type Target = ChatState;

    fn deref(&self) -> &ChatState {
        &self.0
    }
}

struct Request {
    command: ChatCommand,
    respond: Option<oneshot::Sender<Result<(), ChatError>>>,
}

/// Results reported by spawned backend tasks
enum Internal {
    Clients(Result<Vec<Client>, String>),
    ClientLoaded {
        generation: u64,
        result: Result<(Vec<Conversation>, Vec<Policy>), String>,
    },
    Created {
        client_id: String,
        carries_send: bool,
        result: Result<Conversation, String>,
    },
    History {
        conversation_id: String,
        result: Result<Vec<Message>, String>,
    },
    Reply {
        conversation_id: String,
        event: ReplyEvent,
    },
}

/// Cloneable front end of the chat service
#[derive(Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<ChatSnapshot>,
}

impl ChatHandle {
    /// Receiver that wakes on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Queue a command without waiting; rejections show up as `last_error`
    pub fn dispatch(&self, command: ChatCommand) {
        let request = Request {
            command,
            respond: None,
        };
        if let Err(e) = self.commands.try_send(request) {
            tracing::warn!("Chat command dropped: {}", e);
        }
    }

    /// Run a command and wait until the service has accepted or rejected it
    ///
    /// Backend work started by the command continues in the background.
    pub async fn execute(&self, command: ChatCommand) -> Result<(), ChatError> {
        let (tx, rx) = oneshot::channel();
        let request = Request {
            command,
            respond: Some(tx),
        };
        self.commands
            .send(request)
            .await
            .map_err(|_| ChatError::Stopped)?;
        rx.await.map_err(|_| ChatError::Stopped)?
    }

    pub async fn change_user(&self, user_id: &str) -> Result<(), ChatError> {
        self.execute(ChatCommand::ChangeUser(user_id.to_string()))
            .await
    }

    pub async fn select_conversation(&self, conversation_id: &str) -> Result<(), ChatError> {
        self.execute(ChatCommand::SelectConversation(conversation_id.to_string()))
            .await
    }

    pub async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        self.execute(ChatCommand::SendMessage(text.to_string()))
            .await
    }
}

pub struct ChatService {
    state: ChatState,
    backend: Arc<dyn ChatBackend>,
    operator: Operator,
    snapshots: watch::Sender<ChatSnapshot>,
    internal: mpsc::Sender<Internal>,
}

impl ChatService {
    /// Start the service task and load the operator's clients
    pub fn spawn(backend: Arc<dyn ChatBackend>, operator: Operator) -> ChatHandle {
        let state = ChatState::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(ChatSnapshot::capture(&state));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::channel(INTERNAL_BUFFER);

        let service = Self {
            state,
            backend,
            operator,
            snapshots: snapshot_tx,
            internal: internal_tx,
        };
        tokio::spawn(service.run(command_rx, internal_rx));

        ChatHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Request>,
        mut internal: mpsc::Receiver<Internal>,
    ) {
        tracing::debug!(operator = %self.operator.id, role = %self.operator.role, "Chat service started");
        self.load_clients();
        self.publish();

        loop {
            tokio::select! {
                request = commands.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    let result = self.handle(request.command);
                    if let Err(e) = &result {
                        tracing::debug!("Chat command rejected: {}", e);
                        self.state.surface_error(e.to_string());
                    }
                    // Callers see the effect of their command once it returns
                    self.publish();
                    if let Some(respond) = request.respond {
                        let _ = respond.send(result);
                    }
                }

                Some(event) = internal.recv() => {
                    self.apply(event);
                    self.publish();
                }
            }
        }

        tracing::debug!("Chat service stopped");
    }

    fn publish(&self) {
        self.snapshots.send_replace(ChatSnapshot::capture(&self.state));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    fn handle(&mut self, command: ChatCommand) -> Result<(), ChatError> {
        match command {
            ChatCommand::ReloadClients => {
                self.load_clients();
            }
            ChatCommand::ChangeUser(user_id) => {
                let generation = self.state.change_user(&user_id)?;
                self.load_client(user_id, generation);
            }
            ChatCommand::NewConversation => {
                let client_id = self
                    .state
                    .selected_user_id
                    .clone()
                    .ok_or(ChatError::NoClientSelected)?;
                self.state.start_new_conversation(&client_id)?;
                self.create_conversation(client_id);
            }
            ChatCommand::SelectConversation(conversation_id) => {
                let conversation = self
                    .state
                    .conversations
                    .iter()
                    .find(|c| c.id == conversation_id)
                    .cloned()
                    .ok_or(ChatError::ForeignConversation)?;
                self.state.select_conversation(&conversation)?;
                self.load_history(conversation_id);
            }
            ChatCommand::SendMessage(text) => {
                let plan = self.state.send_message(&text)?;
                self.deliver(plan);
            }
            ChatCommand::RetryFailed => {
                let plan = self.state.retry_failed()?;
                tracing::info!("Retrying failed message");
                self.deliver(plan);
            }
            ChatCommand::DismissError => self.state.clear_error(),
        }
        Ok(())
    }

    fn load_clients(&mut self) {
        self.state.begin_clients_load();
        let backend = self.backend.clone();
        let operator = self.operator.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = backend
                .list_clients(&operator)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(Internal::Clients(result)).await;
        });
    }

    fn load_client(&self, client_id: String, generation: u64) {
        let backend = self.backend.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = tokio::try_join!(
                backend.list_conversations(&client_id),
                backend.list_policies(&client_id)
            )
            .map_err(|e| format!("{:#}", e));
            let _ = tx.send(Internal::ClientLoaded { generation, result }).await;
        });
    }

    fn create_conversation(&self, client_id: String) {
        let backend = self.backend.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = backend
                .create_conversation(&client_id, None)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx
                .send(Internal::Created {
                    client_id,
                    carries_send: false,
                    result,
                })
                .await;
        });
    }

    fn load_history(&self, conversation_id: String) {
        let backend = self.backend.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = backend
                .list_messages(&conversation_id)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx
                .send(Internal::History {
                    conversation_id,
                    result,
                })
                .await;
        });
    }

    /// Carry out a send, creating the conversation first when needed
    fn deliver(&self, plan: SendPlan) {
        let backend = self.backend.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let (conversation_id, text) = match plan {
                SendPlan::Send {
                    conversation_id,
                    text,
                } => (conversation_id, text),
                SendPlan::CreateThenSend {
                    client_id,
                    title,
                    text,
                } => {
                    let result = backend
                        .create_conversation(&client_id, title)
                        .await
                        .map_err(|e| format!("{:#}", e));
                    let created = result.as_ref().ok().map(|c| c.id.clone());
                    let _ = tx
                        .send(Internal::Created {
                            client_id,
                            carries_send: true,
                            result,
                        })
                        .await;
                    match created {
                        Some(conversation_id) => (conversation_id, text),
                        None => return,
                    }
                }
            };
            forward_reply(backend, conversation_id, text, tx).await;
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Results
    // ─────────────────────────────────────────────────────────────────────

    fn apply(&mut self, event: Internal) {
        match event {
            Internal::Clients(Ok(clients)) => {
                tracing::info!(count = clients.len(), "Clients loaded");
                self.state.clients_loaded(clients);
            }
            Internal::Clients(Err(e)) => {
                tracing::error!("Failed to load clients: {}", e);
                self.state
                    .clients_failed(format!("Não foi possível carregar os clientes: {}", e));
            }
            Internal::ClientLoaded { generation, result } => {
                let applied = match result {
                    Ok((conversations, policies)) => {
                        self.state.users_loaded(generation, conversations, policies)
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load client data: {}", e);
                        self.state.load_failed(
                            generation,
                            format!("Não foi possível carregar as conversas: {}", e),
                        )
                    }
                };
                if !applied {
                    tracing::debug!(generation, "Dropped stale client load");
                }
            }
            Internal::Created {
                client_id,
                carries_send,
                result,
            } => match result {
                Ok(conversation) => {
                    if !self.state.conversation_created(conversation, carries_send) {
                        tracing::debug!(client = %client_id, "Conversation created for a client no longer selected");
                    }
                }
                Err(e) => {
                    tracing::warn!(client = %client_id, "Failed to create conversation: {}", e);
                    self.state.conversation_failed(
                        &client_id,
                        format!("Não foi possível criar a conversa: {}", e),
                        carries_send,
                    );
                }
            },
            Internal::History {
                conversation_id,
                result,
            } => {
                let applied = match result {
                    Ok(messages) => self.state.messages_loaded(&conversation_id, messages),
                    Err(e) => {
                        tracing::warn!(conversation = %conversation_id, "Failed to load messages: {}", e);
                        self.state.messages_failed(
                            &conversation_id,
                            format!("Não foi possível carregar as mensagens: {}", e),
                        )
                    }
                };
                if !applied {
                    tracing::debug!(conversation = %conversation_id, "Dropped stale history");
                }
            }
            Internal::Reply {
                conversation_id,
                event,
            } => {
                if let ReplyEvent::Failed(reason) = &event {
                    tracing::warn!(conversation = %conversation_id, "Reply failed: {}", reason);
                }
                self.state.apply_reply(&conversation_id, event);
            }
        }
    }
}

/// Pipe a reply stream into the service
///
/// A stream that ends without `Completed`/`Failed` is reported as failed so
/// the composer never stays locked.
async fn forward_reply(
    backend: Arc<dyn ChatBackend>,
    conversation_id: String,
    text: String,
    tx: mpsc::Sender<Internal>,
) {
    let mut stream = match backend.send_message(&conversation_id, &text).await {
        Ok(stream) => stream,
        Err(e) => {
            let event = ReplyEvent::Failed(format!("{:#}", e));
            let _ = tx
                .send(Internal::Reply {
                    conversation_id,
                    event,
                })
                .await;
            return;
        }
    };

    let mut finished = false;
    while let Some(event) = stream.next().await {
        finished = event.is_terminal();
        let reply = Internal::Reply {
            conversation_id: conversation_id.clone(),
            event,
        };
        if tx.send(reply).await.is_err() || finished {
            break;
        }
    }

    if !finished {
        let _ = tx
            .send(Internal::Reply {
                conversation_id,
                event: ReplyEvent::Failed("a resposta foi interrompida".to_string()),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::ScriptedAssistant;
    use crate::backend::SqliteBackend;
    use crate::model::{DeliveryStatus, MessageKind, Role};
    use std::time::Duration;

    const ANA: &str = "cli-ana";
    const BRUNO: &str = "cli-bruno";
    const CARLA: &str = "cli-carla";

    async fn start() -> (ChatHandle, watch::Receiver<ChatSnapshot>) {
        let assistant = Arc::new(ScriptedAssistant::new(Duration::ZERO));
        let backend = SqliteBackend::in_memory(assistant, 20).unwrap();
        backend.seed_demo().await.unwrap();

        let operator = Operator {
            id: "admin".into(),
            role: Role::Admin,
            office_id: None,
        };
        let handle = ChatService::spawn(Arc::new(backend), operator);
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |s| s.available_users.len() == 3).await;
        (handle, rx)
    }

    async fn wait_for(
        rx: &mut watch::Receiver<ChatSnapshot>,
        ready: impl Fn(&ChatState) -> bool,
    ) -> ChatSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if ready(&snapshot) {
                    return snapshot;
                }
                rx.changed().await.expect("chat service stopped");
            }
        })
        .await
        .expect("timed out waiting for chat state")
    }

    async fn open_client(
        handle: &ChatHandle,
        rx: &mut watch::Receiver<ChatSnapshot>,
        client: &str,
    ) -> ChatSnapshot {
        handle.change_user(client).await.unwrap();
        wait_for(rx, |s| !s.is_loading && s.selected_user_id.as_deref() == Some(client)).await
    }

    async fn open_conversation(
        handle: &ChatHandle,
        rx: &mut watch::Receiver<ChatSnapshot>,
        title: &str,
    ) -> ChatSnapshot {
        let id = handle
            .snapshot()
            .conversations
            .iter()
            .find(|c| c.display_title() == title)
            .map(|c| c.id.clone())
            .expect("conversation listed");
        handle.select_conversation(&id).await.unwrap();
        wait_for(rx, |s| {
            !s.is_loading && s.current_conversation.as_ref().is_some_and(|c| c.id == id)
        })
        .await
    }

    #[tokio::test]
    async fn test_reselecting_client_restores_history() {
        let (handle, mut rx) = start().await;

        open_client(&handle, &mut rx, ANA).await;
        let first = open_conversation(&handle, &mut rx, "Cobertura auto").await;
        assert_eq!(first.messages.len(), 2);

        handle.change_user(BRUNO).await.unwrap();
        let switched = handle.snapshot();
        assert!(switched.current_conversation.is_none());
        assert!(switched.messages.is_empty());

        let bruno = wait_for(&mut rx, |s| !s.is_loading).await;
        assert!(bruno.conversations.iter().all(|c| c.client_id == BRUNO));

        open_client(&handle, &mut rx, ANA).await;
        let again = open_conversation(&handle, &mut rx, "Cobertura auto").await;

        let contents = |s: &ChatSnapshot| -> Vec<String> {
            s.messages.iter().map(|m| m.content.clone()).collect()
        };
        assert_eq!(contents(&again), contents(&first));
        assert_eq!(again.messages[0].kind, MessageKind::User);
        assert_eq!(again.messages[1].kind, MessageKind::Ai);
    }

    #[tokio::test]
    async fn test_new_conversation_for_client_without_any() {
        let (handle, mut rx) = start().await;
        let carla = open_client(&handle, &mut rx, CARLA).await;
        assert!(carla.conversations.is_empty());

        handle.execute(ChatCommand::NewConversation).await.unwrap();
        let created = wait_for(&mut rx, |s| s.current_conversation.is_some()).await;

        assert_eq!(created.conversations.len(), 1);
        assert!(created.messages.is_empty());
        assert_eq!(
            created.current_conversation.as_ref().unwrap().display_title(),
            "Nova conversa"
        );
    }

    #[tokio::test]
    async fn test_send_streams_reply_into_new_conversation() {
        let (handle, mut rx) = start().await;
        open_client(&handle, &mut rx, CARLA).await;

        handle.send_message("Quais coberturas tenho?").await.unwrap();
        let sent = handle.snapshot();
        assert_eq!(sent.messages.len(), 1);
        assert!(sent.messages[0].is_user());
        assert!(sent.is_streaming());

        let done = wait_for(&mut rx, |s| !s.is_streaming() && s.messages.len() == 2).await;
        assert!(done.messages.iter().all(|m| m.status == DeliveryStatus::Sent));
        assert!(done.messages[1].tokens.is_some());
        assert_eq!(done.conversations.len(), 1);
        assert_eq!(
            done.current_conversation.as_ref().unwrap().display_title(),
            "Quais coberturas tenho?"
        );
    }

    #[tokio::test]
    async fn test_rejected_commands_surface_errors() {
        let (handle, mut rx) = start().await;

        assert_eq!(
            handle.send_message("Oi").await,
            Err(ChatError::NoClientSelected)
        );
        let snapshot = wait_for(&mut rx, |s| s.last_error.is_some()).await;
        assert_eq!(snapshot.error_count, 1);

        assert_eq!(
            handle.change_user("ghost").await,
            Err(ChatError::UnknownClient("ghost".into()))
        );

        handle.execute(ChatCommand::DismissError).await.unwrap();
        assert!(handle.snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn test_second_send_rejected_while_streaming() {
        let assistant = Arc::new(ScriptedAssistant::new(Duration::from_millis(20)));
        let backend = SqliteBackend::in_memory(assistant, 20).unwrap();
        backend.seed_demo().await.unwrap();
        let handle = ChatService::spawn(
            Arc::new(backend),
            Operator {
                id: "admin".into(),
                role: Role::Admin,
                office_id: None,
            },
        );
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |s| !s.available_users.is_empty()).await;
        open_client(&handle, &mut rx, ANA).await;
        open_conversation(&handle, &mut rx, "Cobertura auto").await;

        handle.send_message("Quando vence?").await.unwrap();
        assert_eq!(
            handle.send_message("E o valor?").await,
            Err(ChatError::SendInFlight)
        );

        let done = wait_for(&mut rx, |s| !s.is_streaming()).await;
        assert_eq!(done.messages.len(), 4);
    }
}
