//! Physical characterization of pairwise contacts for agent-based epidemic models
//!
//! Every contact between two agents is represented by two one-sided
//! [`Interaction`](interaction::Interaction) records that reference each other.
//! This crate draws a duration and a distance for each contact, keeps both
//! records of the pair consistent, and turns those physical quantities into
//! the dimensionless factors consumed by transmission and tracing logic.
//!
//! The pieces fit together around a [`Context`](context::Context):
//! * [`global_properties`] holds the [`ExposureParameters`](exposure::ExposureParameters)
//!   configuration, usually loaded from a JSON file.
//! * [`random`] provides named, independently seeded random streams and the
//!   [`RandomSource`](random::RandomSource) capability the samplers draw from.
//! * [`interaction`] stores paired interaction records for a rolling window of days.
//! * [`exposure`] samples and scores exposures.
//! * [`report`] writes interaction exposures to CSV.
//! * [`runner`] wires the above to a command line.
//!
//! Deciding *who* contacts whom and what happens after an infectious contact are
//! left to the caller.
pub mod context;
pub use context::{Context, DataPlugin};

pub mod error;
pub use error::ExposureError;

pub mod exposure;
pub mod global_properties;
pub mod hashing;
pub mod interaction;
pub mod log;
pub mod numeric;
pub mod plan;
pub mod random;
pub mod report;
pub mod runner;

pub mod prelude;

pub use hashing::{HashMap, HashSet};

// Re-exported for use in macros.
pub use csv;
pub use ctor;
pub use paste;
pub use rand;
