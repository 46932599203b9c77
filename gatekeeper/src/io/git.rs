//! Git adapter for the authority working copy.
//!
//! Replication correctness depends on exactly which git commands run and in
//! which order, so we keep a small, explicit wrapper around `git` subprocess
//! calls instead of a library binding.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// Author/committer identity passed per commit via `-c user.*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Result of a push that git itself completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// The remote refused a non-fast-forward update.
    Rejected { reason: String },
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Clone `url` into `dest` and return a wrapper for the new working copy.
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    pub fn clone_repo(url: &str, dest: &Path) -> Result<Self> {
        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create clone parent {}", parent.display()))?;
        let dest_arg = dest.to_string_lossy();
        let args = ["clone", "--quiet", url, dest_arg.as_ref()];
        let output = Command::new("git")
            .args(args)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        debug!("clone complete");
        Ok(Self::new(dest))
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to run)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Full SHA of `rev`.
    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--verify", rev])?;
        Ok(out.trim().to_string())
    }

    /// Number of modified, staged or deleted tracked files. Untracked files
    /// are ignored.
    pub fn count_tracked_changes(&self) -> Result<usize> {
        let out = self.run_capture(&["status", "--porcelain=v1", "--untracked-files=no"])?;
        Ok(out.lines().filter(|line| !line.trim().is_empty()).count())
    }

    /// Stage modifications and deletions of tracked files.
    pub fn add_tracked(&self) -> Result<()> {
        self.run_checked(&["add", "--update"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    ///
    /// `git diff --quiet` exits 1 when there is a difference; any other
    /// non-zero status is a failure, not an empty index.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let args = ["diff", "--cached", "--quiet"];
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()))
            }
        }
    }

    /// Commit staged changes with exactly `message`.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str, identity: Option<&Identity>) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        let mut args: Vec<String> = Vec::new();
        if let Some(id) = identity {
            args.extend([
                "-c".to_string(),
                format!("user.name={}", id.name),
                "-c".to_string(),
                format!("user.email={}", id.email),
            ]);
        }
        args.extend([
            "commit".to_string(),
            "--quiet".to_string(),
            "--cleanup=verbatim".to_string(),
            "-m".to_string(),
            message.to_string(),
        ]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!("committing staged changes");
        self.run_checked(&args)?;
        Ok(true)
    }

    #[instrument(skip_all, fields(remote = %remote))]
    pub fn fetch(&self, remote: &str) -> Result<()> {
        self.run_checked(&["fetch", "--quiet", remote])?;
        Ok(())
    }

    /// Push HEAD to `refs/heads/<branch>` on `remote`.
    ///
    /// A non-fast-forward refusal is reported as [`PushOutcome::Rejected`];
    /// every other failure (network, auth, hooks) is an error.
    #[instrument(skip_all, fields(remote = %remote, branch = %branch))]
    pub fn push(&self, remote: &str, branch: &str) -> Result<PushOutcome> {
        let refspec = format!("HEAD:refs/heads/{branch}");
        let args = ["push", "--porcelain", remote, refspec.as_str()];
        let output = self.run(&args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(reason) = rejected_ref(&stdout) {
            warn!(%reason, "push rejected by remote");
            return Ok(PushOutcome::Rejected { reason });
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "git {} failed: {} {}",
                args.join(" "),
                stdout.trim(),
                stderr.trim()
            ));
        }
        debug!("push accepted");
        Ok(PushOutcome::Accepted)
    }

    /// Move HEAD, index and tracked files to `rev`.
    #[instrument(skip_all, fields(rev = %rev))]
    pub fn reset_hard(&self, rev: &str) -> Result<()> {
        self.run_checked(&["reset", "--quiet", "--hard", rev])?;
        Ok(())
    }

    /// Number of commits reachable from `to` but not from `from`.
    pub fn count_between(&self, from: &str, to: &str) -> Result<usize> {
        let range = format!("{from}..{to}");
        let out = self.run_capture(&["rev-list", "--count", &range])?;
        out.trim()
            .parse()
            .with_context(|| format!("parse rev-list count '{}'", out.trim()))
    }

    /// Subject line of the commit at `rev`.
    pub fn log_subject(&self, rev: &str) -> Result<String> {
        let out = self.run_capture(&["log", "-1", "--pretty=format:%s", rev])?;
        Ok(out.trim_end().to_string())
    }

    /// Contents of `path` as of `rev`.
    pub fn show_file(&self, rev: &str, path: &str) -> Result<Vec<u8>> {
        let spec = format!("{rev}:{path}");
        Ok(self.run_checked(&["show", &spec])?.stdout)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Find a `[rejected]` ref in `git push --porcelain` output.
///
/// Porcelain ref lines are `<flag>\t<from>:<to>\t<summary>`; flag `!` marks a
/// refused ref. `[remote rejected]` (hook refusal) is not a fast-forward
/// conflict and is left to the exit-status check.
fn rejected_ref(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split('\t');
        let flag = fields.next()?;
        let _refs = fields.next()?;
        let summary = fields.next()?.trim();
        (flag == "!" && summary.starts_with("[rejected]")).then(|| summary.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestAuthority;

    #[test]
    fn staged_changes_outside_a_repository_are_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path());
        assert!(git.has_staged_changes().is_err());
        assert!(git.commit_staged("msg", None).is_err());
    }

    #[test]
    fn staged_and_tracked_changes_are_detected() {
        let authority = TestAuthority::new().expect("authority");
        let work = authority.conf_path().parent().expect("work dir").to_path_buf();
        let git = Git::new(&work);
        assert!(!git.has_staged_changes().expect("clean index"));
        assert_eq!(git.count_tracked_changes().expect("clean tree"), 0);

        std::fs::write(authority.conf_path(), "[group a]\n").expect("write");
        std::fs::write(work.join("untracked"), "x").expect("write");
        assert_eq!(git.count_tracked_changes().expect("dirty tree"), 1);
        assert!(!git.has_staged_changes().expect("unstaged edit"));

        git.add_tracked().expect("add");
        assert!(git.has_staged_changes().expect("staged edit"));
    }

    #[test]
    fn detects_fast_forward_rejection() {
        let out = "To /tmp/authority.git\n!\tHEAD:refs/heads/main\t[rejected] (fetch first)\nDone\n";
        assert_eq!(
            rejected_ref(out),
            Some("[rejected] (fetch first)".to_string())
        );
    }

    #[test]
    fn ignores_accepted_and_hook_refusals() {
        let ok = "To /tmp/a.git\n \tHEAD:refs/heads/main\tabc..def\nDone\n";
        assert_eq!(rejected_ref(ok), None);
        let hook = "To /tmp/a.git\n!\tHEAD:refs/heads/main\t[remote rejected] (hook declined)\nDone\n";
        assert_eq!(rejected_ref(hook), None);
    }
}
