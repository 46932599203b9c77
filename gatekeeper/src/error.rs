//! Error type returned by every access-control operation.
//!
//! Callers branch on [`AccessError::kind`] (e.g. `GroupAlreadyExists` maps to
//! a conflict response) instead of matching on message text.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::config_store::ConfigError;
use crate::core::group_registry::GroupError;
use crate::io::settings::SettingsError;
use crate::io::working_copy::{CommitId, SyncError};

pub type Result<T> = std::result::Result<T, AccessError>;

/// Fieldless discriminant of [`AccessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedConfig,
    GroupAlreadyExists,
    GroupNotFound,
    MemberAlreadyInGroup,
    MemberNotInGroup,
    InvalidName,
    ConfigurationMissing,
    Persistence,
    NoChangesToCommit,
    UnreconciledWorkingCopy,
    PushRejected,
    CommittedNotPushed,
    VersionControl,
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("malformed gitosis.conf: {0}")]
    MalformedConfig(#[source] ConfigError),

    #[error("group '{0}' already exists")]
    GroupAlreadyExists(String),

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("This user is already member of this group")]
    MemberAlreadyInGroup { group: String, member: String },

    #[error("member '{member}' is not in group '{group}'")]
    MemberNotInGroup { group: String, member: String },

    #[error("{0}")]
    InvalidName(String),

    #[error("configuration key '{key}' is unusable")]
    ConfigurationMissing {
        key: &'static str,
        source: SettingsError,
    },

    #[error("failed to {action} {}", .path.display())]
    Persistence {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no changes to commit")]
    NoChangesToCommit,

    /// Local-only state from an earlier failed request blocks new mutations
    /// until an operator resyncs the working copy.
    #[error("working copy needs reconciliation: {0}")]
    UnreconciledWorkingCopy(String),

    /// The remote diverged. The local commit was rolled back; resubmitting the
    /// same mutation is safe.
    #[error("push rejected, local commit rolled back: {reason}")]
    PushRejected { reason: String },

    /// Committed locally but the push failed; local is ahead of the remote.
    #[error("commit {commit} was not pushed: {reason}")]
    CommittedNotPushed { commit: CommitId, reason: String },

    #[error("version control failure: {0:#}")]
    VersionControl(anyhow::Error),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedConfig(_) => ErrorKind::MalformedConfig,
            Self::GroupAlreadyExists(_) => ErrorKind::GroupAlreadyExists,
            Self::GroupNotFound(_) => ErrorKind::GroupNotFound,
            Self::MemberAlreadyInGroup { .. } => ErrorKind::MemberAlreadyInGroup,
            Self::MemberNotInGroup { .. } => ErrorKind::MemberNotInGroup,
            Self::InvalidName(_) => ErrorKind::InvalidName,
            Self::ConfigurationMissing { .. } => ErrorKind::ConfigurationMissing,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::NoChangesToCommit => ErrorKind::NoChangesToCommit,
            Self::UnreconciledWorkingCopy(_) => ErrorKind::UnreconciledWorkingCopy,
            Self::PushRejected { .. } => ErrorKind::PushRejected,
            Self::CommittedNotPushed { .. } => ErrorKind::CommittedNotPushed,
            Self::VersionControl(_) => ErrorKind::VersionControl,
        }
    }

    /// Only a rejected push may be resubmitted as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::PushRejected
    }

    /// Input problems detected before any disk or network write.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedConfig
                | ErrorKind::GroupAlreadyExists
                | ErrorKind::GroupNotFound
                | ErrorKind::MemberAlreadyInGroup
                | ErrorKind::MemberNotInGroup
                | ErrorKind::InvalidName
        )
    }
}

impl From<GroupError> for AccessError {
    fn from(err: GroupError) -> Self {
        match err {
            GroupError::GroupAlreadyExists(group) => Self::GroupAlreadyExists(group),
            GroupError::GroupNotFound(group) => Self::GroupNotFound(group),
            GroupError::MemberAlreadyInGroup { group, member } => {
                Self::MemberAlreadyInGroup { group, member }
            }
            GroupError::MemberNotInGroup { group, member } => {
                Self::MemberNotInGroup { group, member }
            }
            err @ (GroupError::InvalidName { .. } | GroupError::Config(_)) => {
                Self::InvalidName(err.to_string())
            }
        }
    }
}

impl From<SyncError> for AccessError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NoChangesToCommit => Self::NoChangesToCommit,
            SyncError::PushRejected { reason } => Self::PushRejected { reason },
            err @ SyncError::Unreconciled { .. } => Self::UnreconciledWorkingCopy(err.to_string()),
            SyncError::VersionControl(err) => Self::VersionControl(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_push_rejection_is_retryable() {
        let rejected = AccessError::PushRejected {
            reason: "[rejected] (fetch first)".to_string(),
        };
        assert!(rejected.is_retryable());
        assert!(!rejected.is_validation());

        let stuck = AccessError::CommittedNotPushed {
            commit: CommitId::new("abc"),
            reason: "network down".to_string(),
        };
        assert!(!stuck.is_retryable());
        assert_eq!(stuck.kind(), ErrorKind::CommittedNotPushed);
    }

    #[test]
    fn group_errors_keep_their_kind() {
        let err: AccessError = GroupError::MemberAlreadyInGroup {
            group: "g".to_string(),
            member: "m".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::MemberAlreadyInGroup);
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "This user is already member of this group");
    }

    #[test]
    fn sync_errors_map_to_replication_kinds() {
        let err: AccessError = SyncError::Unreconciled { ahead: 1, dirty: 0 }.into();
        assert_eq!(err.kind(), ErrorKind::UnreconciledWorkingCopy);
        let err: AccessError = SyncError::NoChangesToCommit.into();
        assert_eq!(err.kind(), ErrorKind::NoChangesToCommit);
    }
}
