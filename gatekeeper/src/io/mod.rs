//! Side-effecting helpers: git, the working copy, settings, the config file.

pub mod conf_file;
pub mod git;
pub mod settings;
pub mod working_copy;
