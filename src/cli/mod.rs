//! CLI command handlers
//!
//! This module contains all the command handlers for the metis CLI.
//! Each subcommand is implemented in its own module for better organization.

pub mod evolve;
pub mod export;
pub mod feedback;
pub mod helpers;
pub mod init;
pub mod inject;
pub mod learn;
pub mod observe;
pub mod status;
