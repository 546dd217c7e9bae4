//! tstream - Actions
//!
//! Executes the user-ordered action lists attached to listeners, poller
//! data-opts and consumers: tagging, sub-tree inclusion/exclusion and
//! JMESPath reshaping.
//!
//! # Failure containment
//!
//! Actions never fail the caller. Each action runs against a working copy of
//! the record; an action that errors is logged and skipped, leaving the
//! record exactly as the previous action produced it.

mod chain;
mod data_filter;
mod tag;

pub use chain::ActionChain;
pub use data_filter::{include_locations, exclude_locations};
pub use tag::{infer_tenant_app, resolve_placeholders};
