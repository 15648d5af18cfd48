//! Demo data
//!
//! Two offices, three advisors, three clients with a mix of active and
//! expired policies, and a couple of conversations to browse.

use super::sqlite::{store_client, store_conversation, store_message, store_policy};
use crate::model::{
    Client, Conversation, DeliveryStatus, Message, MessageKind, Policy, PolicyStatus, Role,
};
use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use rusqlite::Connection;

/// Fixed ids so the demo can be scripted against
pub(crate) mod ids {
    pub const OFFICE_CENTRO: &str = "office-centro";
    pub const OFFICE_NORTE: &str = "office-norte";
    pub const ADVISOR_MARCOS: &str = "adv-marcos";
    pub const ADVISOR_JULIANA: &str = "adv-juliana";
    pub const ADVISOR_RAFAEL: &str = "adv-rafael";
    pub const ANA: &str = "cli-ana";
    pub const BRUNO: &str = "cli-bruno";
    pub const CARLA: &str = "cli-carla";
}

/// What a seeding run inserted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub clients: usize,
    pub policies: usize,
    pub conversations: usize,
    pub messages: usize,
}

fn account(
    id: &str,
    name: &str,
    role: Role,
    office: &str,
    advisor: Option<&str>,
) -> Client {
    let login = name.split_whitespace().next().unwrap_or(name).to_lowercase();
    Client {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@luma.example", login),
        role,
        office_id: Some(office.to_string()),
        advisor_id: advisor.map(String::from),
    }
}

#[allow(clippy::too_many_arguments)]
fn policy(
    id: &str,
    client_id: &str,
    insurer: &str,
    number: &str,
    category: &str,
    status: PolicyStatus,
    coverage: &str,
    premium_cents: i64,
    ends_on: Option<(i32, u32, u32)>,
) -> Policy {
    Policy {
        id: id.to_string(),
        client_id: client_id.to_string(),
        insurer: insurer.to_string(),
        number: number.to_string(),
        category: category.to_string(),
        status,
        coverage: coverage.to_string(),
        premium_cents,
        ends_on: ends_on.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
    }
}

/// Seed an empty database; returns `None` if users already exist
pub fn seed_demo(conn: &Connection) -> Result<Option<SeedSummary>> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if existing > 0 {
        tracing::debug!(users = existing, "Database already populated, skipping seed");
        return Ok(None);
    }

    let tx = conn.unchecked_transaction()?;
    let mut summary = SeedSummary::default();

    let staff = [
        account("admin", "Administrador Luma", Role::Admin, ids::OFFICE_CENTRO, None),
        account(ids::ADVISOR_MARCOS, "Marcos Ribeiro", Role::Advisor, ids::OFFICE_CENTRO, None),
        account(ids::ADVISOR_JULIANA, "Juliana Prado", Role::Advisor, ids::OFFICE_CENTRO, None),
        account(ids::ADVISOR_RAFAEL, "Rafael Costa", Role::Advisor, ids::OFFICE_NORTE, None),
    ];
    for member in &staff {
        store_client(&tx, member)?;
    }

    let clients = [
        account(ids::ANA, "Ana Souza", Role::User, ids::OFFICE_CENTRO, Some(ids::ADVISOR_MARCOS)),
        account(ids::BRUNO, "Bruno Lima", Role::User, ids::OFFICE_CENTRO, Some(ids::ADVISOR_JULIANA)),
        account(ids::CARLA, "Carla Mendes", Role::User, ids::OFFICE_NORTE, Some(ids::ADVISOR_RAFAEL)),
    ];
    for client in &clients {
        store_client(&tx, client)?;
        summary.clients += 1;
    }

    let policies = [
        policy(
            "pol-ana-auto",
            ids::ANA,
            "Porto Seguro",
            "AUTO-2024-0192",
            "Auto",
            PolicyStatus::Active,
            "Colisão, roubo e furto, terceiros até R$ 100 mil, carro reserva 7 dias",
            245_000,
            Some((2027, 3, 1)),
        ),
        policy(
            "pol-ana-casa",
            ids::ANA,
            "Allianz",
            "RES-88120",
            "Residencial",
            PolicyStatus::Active,
            "Incêndio, danos elétricos e roubo de bens até R$ 250 mil",
            62_000,
            Some((2026, 12, 15)),
        ),
        policy(
            "pol-ana-vida",
            ids::ANA,
            "SulAmérica",
            "VIDA-7731",
            "Vida",
            PolicyStatus::Expired,
            "Morte natural e acidental, R$ 300 mil",
            80_000,
            Some((2025, 6, 30)),
        ),
        policy(
            "pol-bruno-vida",
            ids::BRUNO,
            "MetLife",
            "VG-55012",
            "Vida",
            PolicyStatus::Active,
            "Morte, invalidez por acidente e doenças graves, R$ 500 mil",
            134_000,
            Some((2027, 1, 10)),
        ),
        policy(
            "pol-carla-emp",
            ids::CARLA,
            "Tokio Marine",
            "EMP-3301",
            "Empresarial",
            PolicyStatus::Pending,
            "Incêndio, responsabilidade civil e lucros cessantes",
            410_000,
            None,
        ),
    ];
    for p in &policies {
        store_policy(&tx, p)?;
        summary.policies += 1;
    }

    let now = Utc::now();
    let threads: [(&str, &str, &str, Duration, &[(MessageKind, &str, Option<u32>)]); 3] = [
        (
            "conv-ana-auto",
            ids::ANA,
            "Cobertura auto",
            Duration::days(2),
            &[
                (MessageKind::User, "O seguro do carro cobre roubo?", None),
                (
                    MessageKind::Ai,
                    "Sim. A apólice Auto nº AUTO-2024-0192 da Porto Seguro cobre roubo e furto, \
                     além de colisão e danos a terceiros até R$ 100 mil.",
                    Some(41),
                ),
            ],
        ),
        (
            "conv-bruno-vida",
            ids::BRUNO,
            "Seguro de vida",
            Duration::days(1),
            &[
                (MessageKind::User, "Qual o valor da cobertura de vida?", None),
                (
                    MessageKind::Ai,
                    "A apólice Vida nº VG-55012 da MetLife garante R$ 500 mil para morte, \
                     invalidez por acidente e doenças graves.",
                    Some(36),
                ),
            ],
        ),
        ("conv-bruno-fin", ids::BRUNO, "Financiamento", Duration::hours(5), &[]),
    ];

    for (id, client_id, title, age, messages) in threads {
        let started = now - age;
        let conversation = Conversation {
            id: id.to_string(),
            client_id: client_id.to_string(),
            title: Some(title.to_string()),
            updated_at: started,
        };
        store_conversation(&tx, &conversation, started)?;
        summary.conversations += 1;

        for (i, (kind, content, tokens)) in messages.iter().enumerate() {
            let created_at = started + Duration::minutes(i as i64 + 1);
            store_message(
                &tx,
                &Message {
                    id: format!("{}-m{}", id, i + 1),
                    conversation_id: conversation.id.clone(),
                    kind: *kind,
                    content: content.to_string(),
                    created_at,
                    tokens: *tokens,
                    status: DeliveryStatus::Sent,
                },
            )?;
            summary.messages += 1;
        }
    }

    tx.commit()?;
    tracing::info!(
        clients = summary.clients,
        policies = summary.policies,
        conversations = summary.conversations,
        "Demo data seeded"
    );
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::init_schema;

    #[test]
    fn test_seed_once() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let summary = seed_demo(&conn).unwrap().expect("first run seeds");
        assert_eq!(summary.clients, 3);
        assert_eq!(summary.policies, 5);
        assert_eq!(summary.conversations, 3);
        assert_eq!(summary.messages, 4);

        assert!(seed_demo(&conn).unwrap().is_none());
    }
}
