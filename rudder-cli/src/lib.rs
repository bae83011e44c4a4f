//! Rudder CLI - command-line interface for Rudder migrations.
//!
//! Every command loads `dbconf.yml`, opens one connection for the selected
//! database and environment, and runs against a single track.

pub mod cli;
pub mod commands;
pub mod connect;
pub mod error;
pub mod logging;
pub mod output;
