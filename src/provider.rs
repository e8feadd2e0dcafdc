//! Identity provider descriptor (data) and the token gateway (behavior).
//!
//! `descriptor` derives the token and admin endpoints from a base URL and realm. `gateway`
//! relays password grants, provisions users, and keeps local user records in step with both.

pub mod descriptor;
pub mod gateway;

pub use descriptor::*;
pub use gateway::*;
