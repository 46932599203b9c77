//! Access-control backend for a gitosis authority repository.
//!
//! Groups (one per managed repository) map to the public-key holders allowed
//! to push. The mapping lives in `gitosis.conf`, committed to a local working
//! copy and pushed to the authority repository that the SSH gate consults.
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (parsing, group/member rules).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (git, settings, the config file).
//!
//! [`service`] coordinates both under a process-wide lock and is the only
//! entry point callers need.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod service;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{AccessError, ErrorKind};
pub use service::AccessControlService;
