// Domain types shared by the backend, the chat state and the views
//
// These are the shapes the chat screen consumes, not database rows. The
// SQLite backend maps its tables onto them; the assistant reads them to build
// its prompt; the TUI renders them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Title shown for conversations that were never named
pub const UNTITLED_CONVERSATION: &str = "Nova conversa";

/// Maximum characters of the first message used as a conversation title
const TITLE_MAX_CHARS: usize = 48;

/// Generate a fresh entity id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Account role, as stored by the back office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    OfficeAdmin,
    Advisor,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::OfficeAdmin => "OFFICE_ADMIN",
            Role::Advisor => "ADVISOR",
            Role::User => "USER",
        }
    }

    /// Parse a role name (case-insensitive, accepts `-` for `_`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "ADMIN" => Some(Role::Admin),
            "OFFICE_ADMIN" => Some(Role::OfficeAdmin),
            "ADVISOR" => Some(Role::Advisor),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logged-in advisor or administrator operating the chat screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub id: String,
    pub role: Role,
    pub office_id: Option<String>,
}

/// A selectable client (policy holder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub office_id: Option<String>,
    pub advisor_id: Option<String>,
}

/// A named thread of messages about one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub client_id: String,
    pub title: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Title for display, falling back to "Nova conversa"
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => UNTITLED_CONVERSATION,
        }
    }
}

/// Derive a conversation title from the first user message
///
/// Cuts on a char boundary and marks the cut with an ellipsis.
pub fn title_from_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let first_line = trimmed.lines().next().unwrap_or(trimmed).trim();
    if first_line.chars().count() <= TITLE_MAX_CHARS {
        return Some(first_line.to_string());
    }
    let cut: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
    Some(format!("{}…", cut.trim_end()))
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    User,
    Ai,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "USER",
            MessageKind::Ai => "AI",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(MessageKind::User),
            "AI" => Some(MessageKind::Ai),
            _ => None,
        }
    }
}

/// Delivery state of a message as seen by the chat screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Appended optimistically, not yet confirmed by the backend
    Pending,
    #[default]
    Sent,
    /// The send failed; the bubble stays with a retry hint
    Failed,
}

/// One exchange unit in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Token usage, AI messages only
    pub tokens: Option<u32>,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl Message {
    /// Build a locally-created user message awaiting confirmation
    pub fn pending_user(conversation_id: &str, content: &str) -> Self {
        Self {
            id: format!("local-{}", new_id()),
            conversation_id: conversation_id.to_string(),
            kind: MessageKind::User,
            content: content.to_string(),
            created_at: Utc::now(),
            tokens: None,
            status: DeliveryStatus::Pending,
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind == MessageKind::User
    }
}

/// Lifecycle state of an insurance policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyStatus {
    Active,
    Pending,
    Expired,
    Cancelled,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Active => "ACTIVE",
            PolicyStatus::Pending => "PENDING",
            PolicyStatus::Expired => "EXPIRED",
            PolicyStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(PolicyStatus::Active),
            "PENDING" => Some(PolicyStatus::Pending),
            "EXPIRED" => Some(PolicyStatus::Expired),
            "CANCELLED" => Some(PolicyStatus::Cancelled),
            _ => None,
        }
    }

    /// Portuguese label used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            PolicyStatus::Active => "ativa",
            PolicyStatus::Pending => "pendente",
            PolicyStatus::Expired => "vencida",
            PolicyStatus::Cancelled => "cancelada",
        }
    }
}

/// An insurance policy belonging to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub client_id: String,
    pub insurer: String,
    pub number: String,
    /// Line of business, e.g. "Auto", "Vida", "Residencial"
    pub category: String,
    pub status: PolicyStatus,
    /// Free-text coverage summary
    pub coverage: String,
    pub premium_cents: i64,
    pub ends_on: Option<NaiveDate>,
}

impl Policy {
    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }

    /// Premium formatted as Brazilian reais, e.g. "R$ 1.234,56"
    pub fn premium_display(&self) -> String {
        format_brl(self.premium_cents)
    }
}

/// Format cents as "R$ 1.234,56"
pub fn format_brl(cents: i64) -> String {
    let negative = cents < 0;
    let cents = cents.unsigned_abs();
    let reais = (cents / 100).to_string();
    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, c) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!(
        "{}R$ {},{:02}",
        if negative { "-" } else { "" },
        grouped,
        cents % 100
    )
}

/// Badge text for the number of active policies
pub fn active_policies_badge(count: usize) -> String {
    if count == 1 {
        "1 apólice ativa".to_string()
    } else {
        format!("{} apólices ativas", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untitled_conversation_falls_back() {
        let mut conv = Conversation {
            id: "c1".into(),
            client_id: "u1".into(),
            title: None,
            updated_at: Utc::now(),
        };
        assert_eq!(conv.display_title(), "Nova conversa");
        conv.title = Some("   ".into());
        assert_eq!(conv.display_title(), "Nova conversa");
        conv.title = Some("Cobertura auto".into());
        assert_eq!(conv.display_title(), "Cobertura auto");
    }

    #[test]
    fn title_is_cut_on_char_boundary() {
        let text = "Quais são as coberturas do meu seguro residencial contra incêndio?";
        let title = title_from_message(text).unwrap();
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= 49);
        assert_eq!(title_from_message("  \n "), None);
        assert_eq!(
            title_from_message("Oi\nsegunda linha").as_deref(),
            Some("Oi")
        );
    }

    #[test]
    fn brl_formatting() {
        assert_eq!(format_brl(0), "R$ 0,00");
        assert_eq!(format_brl(123_456), "R$ 1.234,56");
        assert_eq!(format_brl(100_000_000), "R$ 1.000.000,00");
        assert_eq!(format_brl(-550), "-R$ 5,50");
    }

    #[test]
    fn badge_pluralization() {
        assert_eq!(active_policies_badge(1), "1 apólice ativa");
        assert_eq!(active_policies_badge(3), "3 apólices ativas");
        assert_eq!(active_policies_badge(0), "0 apólices ativas");
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("advisor"), Some(Role::Advisor));
        assert_eq!(Role::parse("office-admin"), Some(Role::OfficeAdmin));
        assert_eq!(Role::parse("boss"), None);
        assert_eq!(Role::Admin.to_string(), "ADMIN");
    }
}
