//! Data transfer objects
//!
//! Request and response bodies exchanged with the scheduler API.

pub mod flow_run;
pub mod worker;
