//! Integration hub
//!
//! Relays workflow data between third-party services (issue trackers, source
//! control, chat webhooks, spreadsheets, documentation databases) and routes
//! inbound webhooks to registered handlers. The library is what the
//! `integration-hub` binary serves; it is exposed for integration testing.

pub mod config;
pub mod integrations;
pub mod logging;
