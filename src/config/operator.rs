//! Operator identity: who is using the chat screen
//!
//! The back office resolves this from the session; the terminal client
//! reads it from config or the environment.

use crate::model::{Operator, Role};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    /// User id of the advisor/admin
    pub id: String,
    /// ADMIN, OFFICE_ADMIN or ADVISOR
    pub role: Role,
    /// Office the operator belongs to (OFFICE_ADMIN scoping)
    pub office_id: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            id: "admin".to_string(),
            role: Role::Admin,
            office_id: None,
        }
    }
}

/// Operator settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileOperator {
    pub id: Option<String>,
    pub role: Option<String>,
    pub office_id: Option<String>,
}

impl OperatorConfig {
    /// Create from file config; env values win over file values
    pub fn from_file(
        file: Option<FileOperator>,
        env_id: Option<String>,
        env_role: Option<String>,
    ) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let role = env_role
            .or(file.role)
            .map(|r| {
                Role::parse(&r).unwrap_or_else(|| {
                    eprintln!("Warning: unknown operator role {:?}, using ADVISOR", r);
                    Role::Advisor
                })
            })
            .unwrap_or(defaults.role);

        Self {
            id: env_id.or(file.id).unwrap_or(defaults.id),
            role,
            office_id: file.office_id,
        }
    }

    pub fn to_operator(&self) -> Operator {
        Operator {
            id: self.id.clone(),
            role: self.role,
            office_id: self.office_id.clone(),
        }
    }
}
