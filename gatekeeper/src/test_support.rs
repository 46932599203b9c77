//! Test-only fixtures: a throwaway authority repository and working copy.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::io::git::{Git, Identity};
use crate::io::settings::{CONF_FILE_NAME, TomlSettings};
use crate::io::working_copy::{CommitId, GitWorkingCopy, SyncError, VersionControl};
use crate::service::AccessControlService;

pub const SEED_CONF: &str = "[gitosis]\n";
pub const BRANCH: &str = "main";

/// A bare authority repository seeded with `gitosis.conf`, plus a working
/// copy cloned from it, all inside one temp dir.
pub struct TestAuthority {
    temp: TempDir,
    bare: PathBuf,
    work: PathBuf,
    settings_path: PathBuf,
}

impl TestAuthority {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let bare = temp.path().join("gitosis-admin.git");
        let work = temp.path().join("gitosis-admin");

        run_git(temp.path(), &["init", "--quiet", "--bare", path_str(&bare)?])?;
        run_git(&bare, &["symbolic-ref", "HEAD", &format!("refs/heads/{BRANCH}")])?;

        let seed = temp.path().join("seed");
        Git::clone_repo(path_str(&bare)?, &seed)?;
        configure_identity(&seed)?;
        fs::write(seed.join(CONF_FILE_NAME), SEED_CONF).context("write seed conf")?;
        run_git(&seed, &["add", CONF_FILE_NAME])?;
        run_git(&seed, &["commit", "--quiet", "-m", "Initial gitosis.conf"])?;
        run_git(&seed, &["push", "--quiet", "origin", &format!("HEAD:refs/heads/{BRANCH}")])?;

        Git::clone_repo(path_str(&bare)?, &work)?;

        let settings_path = temp.path().join("gatekeeper.toml");
        let settings = format!(
            "[git]\ngitosis-repo = {}\nauthor-name = \"Gatekeeper Test\"\nauthor-email = \"gatekeeper@test.invalid\"\nauthority-url = {}\n",
            toml_string(&work)?,
            toml_string(&bare)?,
        );
        fs::write(&settings_path, settings).context("write settings")?;

        Ok(Self {
            temp,
            bare,
            work,
            settings_path,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn bare_path(&self) -> &Path {
        &self.bare
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn conf_path(&self) -> PathBuf {
        self.work.join(CONF_FILE_NAME)
    }

    pub fn settings(&self) -> Result<TomlSettings> {
        TomlSettings::load(&self.settings_path)
    }

    pub fn identity() -> Identity {
        Identity {
            name: "Gatekeeper Test".to_string(),
            email: "gatekeeper@test.invalid".to_string(),
        }
    }

    pub fn working_copy(&self) -> Result<GitWorkingCopy> {
        GitWorkingCopy::open(&self.work, "origin", Some(Self::identity()))
            .map_err(|err| anyhow!("open working copy: {err}"))
    }

    pub fn service(&self) -> Result<AccessControlService<GitWorkingCopy>> {
        Ok(AccessControlService::new(self.working_copy()?))
    }

    /// A second, independent clone standing in for another process.
    pub fn second_working_copy(&self, name: &str) -> Result<GitWorkingCopy> {
        let path = self.temp.path().join(name);
        GitWorkingCopy::clone_from(path_str(&self.bare)?, &path, Some(Self::identity()))
            .map_err(|err| anyhow!("clone second working copy: {err}"))
    }

    pub fn remote_head(&self) -> Result<String> {
        Git::new(&self.bare).rev_parse(BRANCH)
    }

    pub fn local_head(&self) -> Result<String> {
        Git::new(&self.work).rev_parse("HEAD")
    }

    pub fn remote_subject(&self) -> Result<String> {
        Git::new(&self.bare).log_subject(BRANCH)
    }

    pub fn remote_conf(&self) -> Result<String> {
        let bytes = Git::new(&self.bare).show_file(BRANCH, CONF_FILE_NAME)?;
        String::from_utf8(bytes).context("remote conf is not utf-8")
    }

    pub fn remote_commit_count(&self) -> Result<usize> {
        let out = run_git(&self.bare, &["rev-list", "--count", BRANCH])?;
        out.trim().parse().context("parse commit count")
    }

    /// Push a commit from outside the service's working copy, replacing
    /// `gitosis.conf` with `contents`.
    pub fn push_external_change(&self, contents: &str, message: &str) -> Result<()> {
        let other = self.temp.path().join(format!("external-{}", self.remote_commit_count()?));
        Git::clone_repo(path_str(&self.bare)?, &other)?;
        configure_identity(&other)?;
        fs::write(other.join(CONF_FILE_NAME), contents).context("write external conf")?;
        run_git(&other, &["commit", "--quiet", "-am", message])?;
        run_git(&other, &["push", "--quiet", "origin", &format!("HEAD:refs/heads/{BRANCH}")])?;
        Ok(())
    }
}

/// Failure injected by [`ScriptedPush`] in place of a real push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFault {
    /// Behave as if the remote had diverged.
    Rejected,
    /// Behave as if the network or credentials failed.
    Network,
}

/// Working copy whose next pushes fail as scripted; later pushes go through.
pub struct ScriptedPush<V> {
    inner: V,
    faults: VecDeque<PushFault>,
}

impl<V: VersionControl> ScriptedPush<V> {
    pub fn new(inner: V, faults: Vec<PushFault>) -> Self {
        Self {
            inner,
            faults: faults.into(),
        }
    }
}

impl<V: VersionControl> VersionControl for ScriptedPush<V> {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn sync(&mut self) -> Result<CommitId, SyncError> {
        self.inner.sync()
    }

    fn stage_and_commit(&mut self, message: &str) -> Result<CommitId, SyncError> {
        self.inner.stage_and_commit(message)
    }

    fn push(&mut self) -> Result<(), SyncError> {
        match self.faults.pop_front() {
            Some(PushFault::Rejected) => Err(SyncError::PushRejected {
                reason: "[rejected] (fetch first)".to_string(),
            }),
            Some(PushFault::Network) => Err(SyncError::VersionControl(anyhow!(
                "could not read from remote repository"
            ))),
            None => self.inner.push(),
        }
    }

    fn restore(&mut self) -> Result<CommitId, SyncError> {
        self.inner.restore()
    }

    fn reset_to_remote(&mut self) -> Result<CommitId, SyncError> {
        self.inner.reset_to_remote()
    }

    fn head(&self) -> Result<CommitId, SyncError> {
        self.inner.head()
    }

    fn last_message(&self) -> Result<String, SyncError> {
        self.inner.last_message()
    }
}

fn configure_identity(root: &Path) -> Result<()> {
    let id = TestAuthority::identity();
    run_git(root, &["config", "user.name", &id.name])?;
    run_git(root, &["config", "user.email", &id.email])?;
    Ok(())
}

fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("run git {:?}", args))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {:?} failed: {}", args, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("non-utf8 path {}", path.display()))
}

fn toml_string(path: &Path) -> Result<String> {
    Ok(toml::Value::String(path_str(path)?.to_string()).to_string())
}
