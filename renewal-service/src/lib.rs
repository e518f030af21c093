//! Subscription renewal engine: lunisolar cycle arithmetic, automatic
//! renewal, reminders and notification dispatch.

pub mod calendar;
pub mod config;
pub mod models;
pub mod services;
pub mod startup;
