//! Useful structures and tools used by the fields
//!

use bevy::prelude::*;

/// A propagated vector whose magnitude exceeds this is treated as a pinned
/// target cell and is never overwritten by relaxation
pub const PINNED_MAGNITUDE_THRESHOLD: f32 = 0.999;
/// Relaxed cells never exceed this magnitude so they cannot masquerade as
/// pinned target cells
pub const MAX_PROPAGATED_MAGNITUDE: f32 = 0.99;
/// Squared lengths below this are considered to be the zero vector
pub const ZERO_EPSILON: f32 = 1e-12;

/// Convenience way of accessing the 8 neighbours of a pixel in a
/// [crate::prelude::NavigabilityLevel] or a cell of a
/// [crate::prelude::VectorFieldLevel].
///
/// Rows increase with world `y` so [Ordinal::North] is a step of `+1` row
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Reflect)]
pub enum Ordinal {
	North,
	NorthEast,
	East,
	SouthEast,
	South,
	SouthWest,
	West,
	NorthWest,
}

impl Ordinal {
	/// Every direction walked clockwise starting from [Ordinal::North], the
	/// ring order used when counting connected neighbour runs
	pub const RING: [Ordinal; 8] = [
		Ordinal::North,
		Ordinal::NorthEast,
		Ordinal::East,
		Ordinal::SouthEast,
		Ordinal::South,
		Ordinal::SouthWest,
		Ordinal::West,
		Ordinal::NorthWest,
	];
	/// `(column, row)` offset of a neighbour in this direction
	pub fn offset(&self) -> (i32, i32) {
		match self {
			Ordinal::North => (0, 1),
			Ordinal::NorthEast => (1, 1),
			Ordinal::East => (1, 0),
			Ordinal::SouthEast => (1, -1),
			Ordinal::South => (0, -1),
			Ordinal::SouthWest => (-1, -1),
			Ordinal::West => (-1, 0),
			Ordinal::NorthWest => (-1, 1),
		}
	}
	/// Is this one of the four axis aligned directions
	pub fn is_orthogonal(&self) -> bool {
		matches!(
			self,
			Ordinal::North | Ordinal::East | Ordinal::South | Ordinal::West
		)
	}
	/// Based on a cells `(column, row)` position find all neighbours that sit
	/// inside a grid of `width x height`, including diagonals
	pub fn get_all_cell_neighbours(
		cell_id: (usize, usize),
		width: usize,
		height: usize,
	) -> Vec<(usize, usize)> {
		let mut neighbours = Vec::with_capacity(8);
		for ordinal in Ordinal::RING.iter() {
			if let Some(n) = ordinal.step(cell_id, width, height) {
				neighbours.push(n);
			}
		}
		neighbours
	}
	/// Step once from `cell_id` in this direction, [None] if the step leaves
	/// a grid of `width x height`
	pub fn step(
		&self,
		cell_id: (usize, usize),
		width: usize,
		height: usize,
	) -> Option<(usize, usize)> {
		let (dc, dr) = self.offset();
		let column = cell_id.0 as i64 + dc as i64;
		let row = cell_id.1 as i64 + dr as i64;
		if column < 0 || row < 0 || column >= width as i64 || row >= height as i64 {
			None
		} else {
			Some((column as usize, row as usize))
		}
	}
}

/// Normalise `v`, returning [Vec2::ZERO] for vectors too short to carry a
/// direction
pub fn normalise_or_zero(v: Vec2) -> Vec2 {
	if v.length_squared() <= ZERO_EPSILON {
		Vec2::ZERO
	} else {
		v.normalize()
	}
}

/// The four cells surrounding a fractional position in a `width x height`
/// grid along with their bilinear weights. Samples are taken at cell centres
/// and positions beyond the outer centres are clamped onto the edge
pub fn bilinear_corners(
	continuous: Vec2,
	width: usize,
	height: usize,
) -> [((usize, usize), f32); 4] {
	let max_x = width.saturating_sub(1) as f32;
	let max_y = height.saturating_sub(1) as f32;
	let x = if continuous.x.is_finite() {
		(continuous.x - 0.5).clamp(0.0, max_x)
	} else {
		0.0
	};
	let y = if continuous.y.is_finite() {
		(continuous.y - 0.5).clamp(0.0, max_y)
	} else {
		0.0
	};
	let x0 = x.floor() as usize;
	let y0 = y.floor() as usize;
	let x1 = (x0 + 1).min(width.saturating_sub(1));
	let y1 = (y0 + 1).min(height.saturating_sub(1));
	let fx = x - x0 as f32;
	let fy = y - y0 as f32;
	[
		((x0, y0), (1.0 - fx) * (1.0 - fy)),
		((x1, y0), fx * (1.0 - fy)),
		((x0, y1), (1.0 - fx) * fy),
		((x1, y1), fx * fy),
	]
}
