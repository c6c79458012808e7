//! Price floor enforcement.
//!
//! [`gate`] decides once per request whether floors apply at all;
//! [`enforce`] then filters each seat against the impression floors and
//! annotates survivors with floor provenance.

pub mod enforce;
pub mod gate;

pub use enforce::{annotate_floor_provenance, enforce_floors, FloorEnforcement};
pub use gate::{request_has_floors, should_enforce, FloorDecision};
