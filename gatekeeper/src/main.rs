//! Command-line front end for the gitosis access-control service.
//!
//! Every mutating command commits to the local working copy and pushes to the
//! authority repository before returning.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

use gatekeeper::exit_codes;
use gatekeeper::io::settings::{TomlSettings, WorkingCopySettings, conf_path};
use gatekeeper::io::working_copy::GitWorkingCopy;
use gatekeeper::{AccessControlService, AccessError};

#[derive(Parser)]
#[command(
    name = "gatekeeper",
    version,
    about = "Manage gitosis groups and members in the authority repository"
)]
struct Cli {
    /// Settings file (TOML) providing `git:gitosis-repo` and friends.
    #[arg(long, global = true, default_value = "gatekeeper.toml")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clone the authority repository into `git:gitosis-repo`.
    Clone {
        /// Authority URL; defaults to `git:authority-url`.
        url: Option<String>,
    },
    /// Create an empty group.
    AddGroup { group: String },
    /// Delete a group and its member list.
    RemoveGroup { group: String },
    /// Append a member to a group.
    AddMember { group: String, member: String },
    /// Remove a member from a group.
    RemoveMember { group: String, member: String },
    /// Print group names, one per line.
    List,
    /// Print a group's members in insertion order.
    Members { group: String },
    /// Print the path of gitosis.conf.
    ConfPath,
    /// Discard local-only commits and edits, resetting to the remote tip.
    Resync,
}

fn main() {
    gatekeeper::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        let code = err
            .downcast_ref::<AccessError>()
            .map(exit_codes::for_error)
            .unwrap_or(exit_codes::INVALID);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = TomlSettings::load(&cli.settings)?;
    match cli.command {
        Command::Clone { url } => cmd_clone(&settings, url),
        Command::ConfPath => {
            println!("{}", conf_path(&settings)?.display());
            Ok(())
        }
        Command::AddGroup { group } => {
            let commit = open(&settings)?.add_group(&group)?;
            println!("{commit}");
            Ok(())
        }
        Command::RemoveGroup { group } => {
            let commit = open(&settings)?.remove_group(&group)?;
            println!("{commit}");
            Ok(())
        }
        Command::AddMember { group, member } => {
            let commit = open(&settings)?.add_member(&group, &member)?;
            println!("{commit}");
            Ok(())
        }
        Command::RemoveMember { group, member } => {
            let commit = open(&settings)?.remove_member(&group, &member)?;
            println!("{commit}");
            Ok(())
        }
        Command::List => {
            for group in open(&settings)?.groups()? {
                println!("{group}");
            }
            Ok(())
        }
        Command::Members { group } => {
            for member in open(&settings)?.members(&group)? {
                println!("{member}");
            }
            Ok(())
        }
        Command::Resync => {
            let head = open(&settings)?.resync()?;
            println!("{head}");
            Ok(())
        }
    }
}

fn open(settings: &TomlSettings) -> Result<AccessControlService<GitWorkingCopy>> {
    Ok(AccessControlService::from_settings(settings)?)
}

fn cmd_clone(settings: &TomlSettings, url: Option<String>) -> Result<()> {
    let wc_settings = WorkingCopySettings::from_provider(settings)?;
    let url = url
        .or(wc_settings.authority_url)
        .ok_or_else(|| anyhow!("no authority url (pass one or set git:authority-url)"))?;
    if wc_settings.root.exists() {
        return Err(anyhow!(
            "working copy {} already exists",
            wc_settings.root.display()
        ));
    }
    GitWorkingCopy::clone_from(&url, &wc_settings.root, wc_settings.identity)
        .with_context(|| format!("clone {url}"))?;
    info!(root = %wc_settings.root.display(), "working copy provisioned");
    println!("{}", wc_settings.root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_add_member() {
        let cli = Cli::parse_from(["gatekeeper", "add-member", "pink-floyd", "time"]);
        assert!(matches!(
            cli.command,
            Command::AddMember { ref group, ref member } if group == "pink-floyd" && member == "time"
        ));
        assert_eq!(cli.settings, PathBuf::from("gatekeeper.toml"));
    }

    #[test]
    fn parse_global_settings_after_subcommand() {
        let cli = Cli::parse_from(["gatekeeper", "list", "--settings", "/etc/gk.toml"]);
        assert!(matches!(cli.command, Command::List));
        assert_eq!(cli.settings, PathBuf::from("/etc/gk.toml"));
    }

    #[test]
    fn parse_clone_without_url() {
        let cli = Cli::parse_from(["gatekeeper", "clone"]);
        assert!(matches!(cli.command, Command::Clone { url: None }));
    }
}
