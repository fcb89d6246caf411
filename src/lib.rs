//! Slack report dispatcher.
//!
//! A report selected in Slack is generated in the background, checked for on
//! disk, and uploaded back to the requesting channel.

pub mod config;
pub mod ingress;
pub mod reports;
pub mod server;
pub mod slack;
