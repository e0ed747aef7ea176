//! Failures which can be raised while building or driving the vector field
//!
//! Only configuration-class problems are errors, the absence of data (no
//! targets, an unpopulated cache, a position without guidance) is reported
//! through sentinel values instead
//!

use bevy::prelude::*;
use thiserror::Error;

/// Errors produced when building, initialising or configuring the vector field
#[derive(Debug, Error)]
pub enum FlowFieldError {
	/// Surface geometry supplied to the navigability builder has no triangles
	#[error("surface geometry contains zero triangles")]
	EmptyGeometry,
	/// The world-space bounds have no area or are not finite
	#[error("degenerate world bounds, min {min:?} max {max:?}")]
	DegenerateBounds {
		/// Minimum corner of the bounds
		min: Vec2,
		/// Maximum corner of the bounds
		max: Vec2,
	},
	/// A configuration value is outside of its permitted range
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
	/// A resolution level was requested which does not exist
	#[error("resolution level {level} requested but only {count} levels exist")]
	LevelOutOfRange {
		/// The requested level
		level: usize,
		/// Number of levels available
		count: usize,
	},
	/// Batched query buffers disagree in length
	#[error("batch length mismatch, {positions} positions but {results} result slots")]
	BatchLengthMismatch {
		/// Number of positions supplied
		positions: usize,
		/// Number of result slots supplied
		results: usize,
	},
	/// A component was driven before its initialisation completed
	#[error("{0} used before initialisation")]
	NotInitialised(&'static str),
	/// Reading an input file failed
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// An input file was readable but its contents could not be interpreted
	#[error("failed to deserialise input: {0}")]
	Deserialise(String),
}
