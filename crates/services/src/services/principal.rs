use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::workflow_error::WorkflowError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Organizer,
    Reviewer,
    Speaker,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Organizer => write!(f, "organizer"),
            Role::Reviewer => write!(f, "reviewer"),
            Role::Speaker => write!(f, "speaker"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "organizer" | "owner" => Ok(Role::Organizer),
            "reviewer" | "member" => Ok(Role::Reviewer),
            "speaker" => Ok(Role::Speaker),
            other => Err(WorkflowError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// Already authenticated caller. Authentication itself happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_team_member(&self) -> bool {
        matches!(self.role, Role::Organizer | Role::Reviewer)
    }

    pub fn require_organizer(&self) -> Result<(), WorkflowError> {
        if self.role == Role::Organizer {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(format!(
                "{} '{}' cannot take organizer decisions",
                self.role, self.id
            )))
        }
    }

    /// Organizers and reviewers hold a reviewer identity; speakers do not.
    pub fn require_team_member(&self) -> Result<(), WorkflowError> {
        if self.is_team_member() {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(format!(
                "{} '{}' is not a member of the event team",
                self.role, self.id
            )))
        }
    }
}
