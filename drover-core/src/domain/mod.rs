//! Core domain types
//!
//! This module contains the entities the worker reads from the scheduler.
//! They are owned by the scheduler; the worker treats them as read-only
//! inputs to rendering and dispatch.

pub mod deployment;
pub mod flow_run;
pub mod work_pool;
