//! Subcommand implementations for the bina CLI.
//!
//! - [`install`] - Run one installation from an install plan
//! - [`fail`] - Report a pre-flight error from the release-metadata service
//! - [`platform`] - Print the detected platform key

pub mod fail;
pub mod install;
pub mod platform;
