//! Bearer credential handling: shape checks, unverified claims, caller identity, and redacted
//! secrets.

pub mod bearer;
pub mod claims;
pub mod identity;
pub mod secret;

pub use bearer::*;
pub use claims::*;
pub use identity::*;
pub use secret::*;
