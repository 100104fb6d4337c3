//! SlackOMS Paper Trading Library
//!
//! Core components for the Slack-integrated paper-trading OMS: trade
//! validation, the append-only trade ledger, position accounting, and
//! portfolio summaries.

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod secrets;
