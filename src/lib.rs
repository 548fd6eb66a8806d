//! Parca operator is an event-driven controller that installs, configures, starts and
//! removes the Parca continuous profiler on a single Juju unit. It reacts to lifecycle
//! hooks from the platform and to scrape-target changes published over the
//! `metrics-endpoint` relation, reporting progress through the unit status.

/// Event router.
pub mod charm;

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Constants and defaults.
pub mod constants;

/// Error handling.
pub mod error;

/// Platform events.
pub mod event;

/// Parca configuration rendering.
pub mod parca_config;

/// Hook tool access to the platform.
pub mod platform;

/// Reconciliation loop and dispatch lock.
pub mod reconciler;

/// External command execution.
pub mod runner;

/// Scrape-job discovery.
pub mod scrape;

/// Unit status.
pub mod status;

/// Parca service management.
pub mod workload;

#[cfg(test)]
mod test_utils;
