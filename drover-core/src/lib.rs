//! Drover Core
//!
//! Core types and abstractions for the drover worker system.
//!
//! This crate contains:
//! - Domain types: entities served by the scheduler (FlowRun, WorkPool, etc.)
//! - DTOs: data transfer objects for scheduler communication
//! - Template: the placeholder renderer used to turn job templates into
//!   concrete job configurations

pub mod domain;
pub mod dto;
pub mod template;
