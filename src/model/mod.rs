//! The rating history engine.
//!
//! Games form an implicit dependency chain per participant: a membership's
//! prior is the posterior of that participant's nearest earlier membership.
//! Mutations flag the games whose chain changed, [`RatingEngine::recalculate`]
//! walks the dirty frontier forward one hop at a time, and
//! [`RatingEngine::replay`] recomputes a whole board from scratch.

pub mod constants;
pub mod engine;
pub mod history;
pub mod propagation;
pub mod rating_model;
pub mod ratings;
pub mod recalculate;
pub mod replay;
pub mod scheduler;
pub mod structures;
pub mod validation;

pub use engine::RatingEngine;
pub use rating_model::{PlackettLuceModel, RatingModel};
