//! The local working copy of the authority repository.
//!
//! [`VersionControl`] is the capability the service drives; [`GitWorkingCopy`]
//! implements it over the `git` CLI. The working copy is process-wide shared
//! state: the service owns it behind a mutex and nothing else touches its path.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::io::git::{Git, Identity, PushOutcome};

/// Full SHA of a commit in the working copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no changes to commit")]
    NoChangesToCommit,

    /// The remote moved on (another writer pushed first).
    #[error("push rejected by remote: {reason}")]
    PushRejected { reason: String },

    /// Local-only commits or tracked edits from an earlier failed request.
    #[error(
        "working copy is ahead of the remote by {ahead} commit(s) with {dirty} modified tracked file(s)"
    )]
    Unreconciled { ahead: usize, dirty: usize },

    #[error("version control failure: {0:#}")]
    VersionControl(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::VersionControl(err)
    }
}

/// Version-control operations the service needs from a working copy.
///
/// All methods block on disk or network I/O.
pub trait VersionControl: Send {
    /// Root directory of the checkout.
    fn root(&self) -> &Path;

    /// Fast-forward to the remote tip. Fails with [`SyncError::Unreconciled`]
    /// rather than discarding local-only state.
    fn sync(&mut self) -> Result<CommitId, SyncError>;

    /// Stage all modified tracked files and commit with exactly `message`.
    fn stage_and_commit(&mut self, message: &str) -> Result<CommitId, SyncError>;

    /// Push the current branch tip to the bound remote.
    fn push(&mut self) -> Result<(), SyncError>;

    /// Throw away uncommitted tracked edits, returning to the last known
    /// remote tip. No network access.
    fn restore(&mut self) -> Result<CommitId, SyncError>;

    /// Fetch, then discard local commits and edits, landing on the remote's
    /// current tip.
    fn reset_to_remote(&mut self) -> Result<CommitId, SyncError>;

    fn head(&self) -> Result<CommitId, SyncError>;

    /// Subject of the newest commit on the current branch.
    fn last_message(&self) -> Result<String, SyncError>;
}

/// Working copy backed by the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitWorkingCopy {
    git: Git,
    remote: String,
    branch: String,
    identity: Option<Identity>,
}

impl GitWorkingCopy {
    /// Bind to an existing checkout. The current branch is the one pushed.
    pub fn open(
        root: impl Into<PathBuf>,
        remote: impl Into<String>,
        identity: Option<Identity>,
    ) -> Result<Self, SyncError> {
        let git = Git::new(root);
        let branch = git.current_branch()?;
        Ok(Self {
            git,
            remote: remote.into(),
            branch,
            identity,
        })
    }

    /// Provision a working copy by cloning the authority repository.
    pub fn clone_from(
        url: &str,
        root: &Path,
        identity: Option<Identity>,
    ) -> Result<Self, SyncError> {
        info!(url, root = %root.display(), "cloning authority repository");
        Git::clone_repo(url, root)?;
        Self::open(root, "origin", identity)
    }

    fn remote_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

impl VersionControl for GitWorkingCopy {
    fn root(&self) -> &Path {
        self.git.workdir()
    }

    #[instrument(skip_all, fields(branch = %self.branch))]
    fn sync(&mut self) -> Result<CommitId, SyncError> {
        self.git.fetch(&self.remote)?;
        let remote_ref = self.remote_ref();
        let dirty = self.git.count_tracked_changes()?;
        let ahead = self.git.count_between(&remote_ref, "HEAD")?;
        if dirty > 0 || ahead > 0 {
            warn!(ahead, dirty, "working copy has local-only state");
            return Err(SyncError::Unreconciled { ahead, dirty });
        }
        // No local-only commits, so this only ever fast-forwards.
        self.git.reset_hard(&remote_ref)?;
        let head = self.head()?;
        debug!(head = %head, "working copy in sync with remote");
        Ok(head)
    }

    #[instrument(skip_all)]
    fn stage_and_commit(&mut self, message: &str) -> Result<CommitId, SyncError> {
        self.git.add_tracked()?;
        if !self.git.commit_staged(message, self.identity.as_ref())? {
            return Err(SyncError::NoChangesToCommit);
        }
        let head = self.head()?;
        debug!(commit = %head, "committed");
        Ok(head)
    }

    fn push(&mut self) -> Result<(), SyncError> {
        match self.git.push(&self.remote, &self.branch)? {
            PushOutcome::Accepted => Ok(()),
            PushOutcome::Rejected { reason } => Err(SyncError::PushRejected { reason }),
        }
    }

    fn restore(&mut self) -> Result<CommitId, SyncError> {
        let remote_ref = self.remote_ref();
        self.git.reset_hard(&remote_ref)?;
        self.head()
    }

    #[instrument(skip_all, fields(branch = %self.branch))]
    fn reset_to_remote(&mut self) -> Result<CommitId, SyncError> {
        self.git.fetch(&self.remote)?;
        let head = self.restore()?;
        info!(head = %head, "working copy reset to remote tip");
        Ok(head)
    }

    fn head(&self) -> Result<CommitId, SyncError> {
        Ok(CommitId::new(self.git.rev_parse("HEAD")?))
    }

    fn last_message(&self) -> Result<String, SyncError> {
        Ok(self.git.log_subject("HEAD")?)
    }
}
