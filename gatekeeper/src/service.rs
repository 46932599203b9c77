//! Orchestration for access-control mutations.
//!
//! Each mutation runs the full sequence under one process-wide lock:
//!
//! ```text
//! Locked -> Loaded -> Mutated -> Persisted -> Committed -> Pushed
//! ```
//!
//! Domain failures abort before anything is written. A rejected push rolls
//! the local commit back and reports a retryable error; any other push failure
//! leaves the commit in place and reports `CommittedNotPushed`. The service
//! never retries on its own, so concurrent callers are never silently
//! reordered.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, instrument, warn};

use crate::core::group_registry;
use crate::core::types::Mutation;
use crate::error::{AccessError, Result};
use crate::io::conf_file;
use crate::io::settings::{CONF_FILE_NAME, ConfigProvider, WorkingCopySettings};
use crate::io::working_copy::{CommitId, GitWorkingCopy, SyncError, VersionControl};

/// Entry point for group and member changes.
///
/// Safe to share across request-handling threads; calls block on disk and
/// network I/O and are serialized internally.
pub struct AccessControlService<V: VersionControl> {
    conf_path: PathBuf,
    working_copy: Mutex<V>,
}

impl AccessControlService<GitWorkingCopy> {
    /// Open the working copy named by `git:gitosis-repo`.
    pub fn from_settings(provider: &dyn ConfigProvider) -> Result<Self> {
        let settings = WorkingCopySettings::from_provider(provider)?;
        let working_copy =
            GitWorkingCopy::open(&settings.root, settings.remote, settings.identity)?;
        Ok(Self::new(working_copy))
    }
}

impl<V: VersionControl> AccessControlService<V> {
    pub fn new(working_copy: V) -> Self {
        let conf_path = working_copy.root().join(CONF_FILE_NAME);
        Self {
            conf_path,
            working_copy: Mutex::new(working_copy),
        }
    }

    /// Location of `gitosis.conf` in the working copy.
    pub fn conf_path(&self) -> &Path {
        &self.conf_path
    }

    pub fn add_group(&self, group: &str) -> Result<CommitId> {
        self.apply(&Mutation::AddGroup {
            group: group.to_string(),
        })
    }

    pub fn remove_group(&self, group: &str) -> Result<CommitId> {
        self.apply(&Mutation::RemoveGroup {
            group: group.to_string(),
        })
    }

    pub fn add_member(&self, group: &str, member: &str) -> Result<CommitId> {
        self.apply(&Mutation::AddMember {
            group: group.to_string(),
            member: member.to_string(),
        })
    }

    pub fn remove_member(&self, group: &str, member: &str) -> Result<CommitId> {
        self.apply(&Mutation::RemoveMember {
            group: group.to_string(),
            member: member.to_string(),
        })
    }

    /// Run one mutation end to end and return the pushed commit.
    #[instrument(skip_all, fields(op = %mutation, group = mutation.group(), member = mutation.member()))]
    pub fn apply(&self, mutation: &Mutation) -> Result<CommitId> {
        let mut wc = self.lock();
        debug!("locked");

        wc.sync()?;
        let mut doc = conf_file::load(&self.conf_path)?;
        debug!("loaded");

        if let Err(err) = mutation.apply(&mut doc) {
            info!(err = %err, "mutation rejected");
            return Err(err.into());
        }
        debug!("mutated");

        if let Err(err) = conf_file::store(&self.conf_path, &doc) {
            error!(err = %err, "failed to persist config");
            restore(&mut *wc);
            return Err(err);
        }
        debug!("persisted");

        let commit = commit_and_push(&mut *wc, &mutation.commit_message())?;
        info!(commit = %commit, "mutation replicated");
        Ok(commit)
    }

    /// Commit whatever tracked changes the working copy holds and push them.
    ///
    /// Lower-level than [`apply`](Self::apply): callers are responsible for
    /// having edited the working copy consistently.
    #[instrument(skip_all)]
    pub fn push_to_gitosis(&self, message: &str) -> Result<CommitId> {
        let mut wc = self.lock();
        commit_and_push(&mut *wc, message)
    }

    /// Group names in file order, as currently checked out.
    pub fn groups(&self) -> Result<Vec<String>> {
        let _wc = self.lock();
        let doc = conf_file::load(&self.conf_path)?;
        Ok(group_registry::group_names(&doc))
    }

    /// Members of `group` in insertion order, as currently checked out.
    pub fn members(&self, group: &str) -> Result<Vec<String>> {
        let _wc = self.lock();
        let doc = conf_file::load(&self.conf_path)?;
        let members = group_registry::members(&doc, group)?;
        Ok(members.as_slice().to_vec())
    }

    /// Subject of the newest commit in the working copy.
    pub fn last_commit_message(&self) -> Result<String> {
        Ok(self.lock().last_message()?)
    }

    /// Operator recovery: drop local-only commits and edits and land on the
    /// remote tip.
    #[instrument(skip_all)]
    pub fn resync(&self) -> Result<CommitId> {
        let mut wc = self.lock();
        let head = wc.reset_to_remote()?;
        warn!(head = %head, "working copy resynced to remote; local-only changes discarded");
        Ok(head)
    }

    /// The working copy is re-validated at the start of every mutation, so a
    /// panic in an earlier holder does not leave it unusable.
    fn lock(&self) -> MutexGuard<'_, V> {
        self.working_copy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The `Committed -> Pushed` leg. Must run to completion once the commit
/// exists.
fn commit_and_push<V: VersionControl + ?Sized>(wc: &mut V, message: &str) -> Result<CommitId> {
    let commit = match wc.stage_and_commit(message) {
        Ok(commit) => commit,
        Err(err) => {
            error!(err = %err, "commit failed");
            restore(wc);
            return Err(err.into());
        }
    };
    debug!(commit = %commit, "committed");

    match wc.push() {
        Ok(()) => {
            debug!(commit = %commit, "pushed");
            Ok(commit)
        }
        Err(SyncError::PushRejected { reason }) => {
            warn!(commit = %commit, %reason, "push rejected, rolling back local commit");
            match wc.reset_to_remote() {
                Ok(_) => Err(AccessError::PushRejected { reason }),
                Err(reset_err) => {
                    error!(commit = %commit, err = %reset_err, "rollback after rejected push failed");
                    Err(AccessError::CommittedNotPushed {
                        commit,
                        reason: format!("push rejected ({reason}) and rollback failed: {reset_err}"),
                    })
                }
            }
        }
        Err(err) => {
            error!(commit = %commit, err = %err, "push failed; local commit is ahead of remote");
            Err(AccessError::CommittedNotPushed {
                commit,
                reason: err.to_string(),
            })
        }
    }
}

/// Undo uncommitted edits after a failed write or commit. Failure here only
/// means the next mutation will report the working copy as unreconciled.
fn restore<V: VersionControl + ?Sized>(wc: &mut V) {
    if let Err(err) = wc.restore() {
        error!(err = %err, "failed to restore working copy");
    }
}
