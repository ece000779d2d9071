//! Sprint Core - Entity Types
//!
//! Pure data structures shared by every other crate: identifiers, entity
//! records, the payment transition table, decimal team-id arithmetic and the
//! error hierarchy. This crate performs no I/O.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod payment;
pub mod team_id;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use payment::*;
pub use team_id::{cmp_decimal, increment_decimal, is_decimal, max_team_id, FIRST_TEAM_ID};
