//! Closed enums shared across crates.
//!
//! Every enum persists as TEXT in SQLite, so each carries an `as_str`/`parse`
//! pair instead of relying on serde string representations.

use serde::{Deserialize, Serialize};

use crate::error::{ChanCastError, Result};

/// What a batch task does to each of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CreateChannel,
    SetUsername,
    SetPhoto,
    SetDescription,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::CreateChannel => "create_channel",
            TaskKind::SetUsername => "set_username",
            TaskKind::SetPhoto => "set_photo",
            TaskKind::SetDescription => "set_description",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "create_channel" => Ok(TaskKind::CreateChannel),
            "set_username" => Ok(TaskKind::SetUsername),
            "set_photo" => Ok(TaskKind::SetPhoto),
            "set_description" => Ok(TaskKind::SetDescription),
            other => Err(ChanCastError::UnsupportedKind(other.to_string())),
        }
    }

    /// All kinds, in worker-spawn order.
    pub fn all() -> [TaskKind; 4] {
        [
            TaskKind::CreateChannel,
            TaskKind::SetUsername,
            TaskKind::SetPhoto,
            TaskKind::SetDescription,
        ]
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch task lifecycle. COMPLETED is terminal for a finished batch; FAILED is
/// only assigned by startup reconciliation to tasks that were RUNNING when the
/// process died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(ChanCastError::Database(format!(
                "invalid task status '{other}'"
            ))),
        }
    }
}

/// Recurrence families a schedule row can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    PublishMessage,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::PublishMessage => "publish_message",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "publish_message" => Ok(ScheduleKind::PublishMessage),
            other => Err(ChanCastError::UnsupportedKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Running,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Running => "running",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "running" => Ok(ScheduleStatus::Running),
            other => Err(ChanCastError::Database(format!(
                "invalid schedule status '{other}'"
            ))),
        }
    }
}

/// Role an account holds on a channel it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    Owner,
    Admin,
    Member,
}

impl ChannelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelRole::Owner => "owner",
            ChannelRole::Admin => "admin",
            ChannelRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "owner" => Ok(ChannelRole::Owner),
            "admin" => Ok(ChannelRole::Admin),
            "member" => Ok(ChannelRole::Member),
            other => Err(ChanCastError::Database(format!(
                "invalid channel role '{other}'"
            ))),
        }
    }
}

/// Stored media asset families used by publish jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(ChanCastError::Database(format!(
                "invalid media kind '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_round_trip() {
        for kind in TaskKind::all() {
            assert_eq!(TaskKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(matches!(
            TaskKind::parse("mint_nft"),
            Err(ChanCastError::UnsupportedKind(_))
        ));
    }

    #[test]
    fn status_round_trip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(s.as_str()).unwrap(), s);
        }
    }
}
