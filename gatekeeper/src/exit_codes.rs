//! Stable exit codes for gatekeeper CLI commands.

use crate::error::{AccessError, ErrorKind};

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid settings, unreadable files, or a version-control failure.
pub const INVALID: i32 = 1;
/// Rejected input: duplicate group, unknown group, duplicate member, bad name.
pub const CONFLICT: i32 = 3;
/// Remote diverged; the local commit was rolled back and the command may be rerun.
pub const RETRY: i32 = 4;
/// A local commit was not pushed, or earlier local-only state needs `resync`.
pub const INCONSISTENT: i32 = 5;

pub fn for_error(err: &AccessError) -> i32 {
    match err.kind() {
        ErrorKind::PushRejected => RETRY,
        ErrorKind::CommittedNotPushed | ErrorKind::UnreconciledWorkingCopy => INCONSISTENT,
        _ if err.is_validation() => CONFLICT,
        _ => INVALID,
    }
}
