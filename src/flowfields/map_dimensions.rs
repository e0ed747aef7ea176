//! Conversions between world-space positions and the pixels/cells of each
//! resolution level
//!
//! The world is an axis aligned rectangle `[min, max]`. Level `0` splits it
//! into `base_width x base_height` pixels, each subsequent level halves the
//! grid (rounding up) so a cell of level `L` spans `2^L` base pixels along
//! each axis. Columns grow with world `x` and rows grow with world `y`
//!
//! ```text
//!  max y ____________________
//!       |__|__|__|__|__|__|__|   row h-1
//!       |__|__|__|__|__|__|__|
//!       |__|__|__|__|__|__|__|   row 0
//!  min y
//!      min x             max x
//! ```
//!

use crate::prelude::*;
use bevy::prelude::*;

/// The world-space extent of the navigable surface and the pixel grid
/// layered over it
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct MapDimensions {
	/// Minimum corner of the world
	min: Vec2,
	/// Maximum corner of the world
	max: Vec2,
	/// `(width, height)` of level `0` in pixels
	base: (usize, usize),
	/// Number of resolution levels
	level_count: usize,
}

impl MapDimensions {
	/// Create a new instance of [MapDimensions], errors if the bounds have no
	/// area or the grid has no pixels
	pub fn new(
		min: Vec2,
		max: Vec2,
		base_width: usize,
		base_height: usize,
		level_count: usize,
	) -> Result<Self, FlowFieldError> {
		if !min.is_finite() || !max.is_finite() || max.x <= min.x || max.y <= min.y {
			return Err(FlowFieldError::DegenerateBounds { min, max });
		}
		if base_width == 0 || base_height == 0 || level_count == 0 {
			return Err(FlowFieldError::InvalidConfig(format!(
				"grid of {}x{} with {} levels cannot be built",
				base_width, base_height, level_count
			)));
		}
		Ok(MapDimensions {
			min,
			max,
			base: (base_width, base_height),
			level_count,
		})
	}
	/// Get the `(min, max)` world-space corners
	pub fn get_bounds(&self) -> (Vec2, Vec2) {
		(self.min, self.max)
	}
	/// Get the world-space `(width, height)` of the bounds
	pub fn get_extent(&self) -> Vec2 {
		self.max - self.min
	}
	/// Get the pixel `(width, height)` of level `0`
	pub fn get_base_dimensions(&self) -> (usize, usize) {
		self.base
	}
	/// Number of resolution levels
	pub fn get_level_count(&self) -> usize {
		self.level_count
	}
	/// Index of the coarsest level
	pub fn get_max_level(&self) -> usize {
		self.level_count - 1
	}
	/// Pixel `(width, height)` of a level, each level halves the previous
	/// rounding up and never drops below `1`
	pub fn get_level_dimensions(&self, level: usize) -> (usize, usize) {
		let (mut w, mut h) = self.base;
		for _ in 0..level {
			w = w.div_ceil(2).max(1);
			h = h.div_ceil(2).max(1);
		}
		(w, h)
	}
	/// World-space size of a single cell of a level
	pub fn get_cell_size(&self, level: usize) -> Vec2 {
		let base_cell = Vec2::new(
			(self.max.x - self.min.x) / self.base.0 as f32,
			(self.max.y - self.min.y) / self.base.1 as f32,
		);
		base_cell * (1u32 << level.min(31)) as f32
	}
	/// Position expressed in fractional cells of a level, cell `(c, r)`
	/// occupies `[c, c + 1) x [r, r + 1)`
	pub fn world_to_continuous(&self, position: Vec2, level: usize) -> Vec2 {
		(position - self.min) / self.get_cell_size(level)
	}
	/// Find the cell of a level containing a world position, [None] when the
	/// position lies outside of the grid
	pub fn world_to_cell(&self, position: Vec2, level: usize) -> Option<FieldCell> {
		let continuous = self.world_to_continuous(position, level);
		if !continuous.is_finite() || continuous.x < 0.0 || continuous.y < 0.0 {
			return None;
		}
		let (w, h) = self.get_level_dimensions(level);
		let column = continuous.x.floor() as usize;
		let row = continuous.y.floor() as usize;
		if column >= w || row >= h {
			// positions sitting exactly on the max edge belong to the last cell
			if position.x <= self.max.x && position.y <= self.max.y {
				return Some(FieldCell::new(column.min(w - 1), row.min(h - 1)));
			}
			return None;
		}
		Some(FieldCell::new(column, row))
	}
	/// Find the cell of a level nearest to a world position, positions
	/// outside of the grid are clamped onto its edge
	pub fn world_to_cell_clamped(&self, position: Vec2, level: usize) -> FieldCell {
		let continuous = self.world_to_continuous(position, level);
		let (w, h) = self.get_level_dimensions(level);
		let column = if continuous.x.is_finite() {
			(continuous.x.floor().max(0.0) as usize).min(w - 1)
		} else {
			0
		};
		let row = if continuous.y.is_finite() {
			(continuous.y.floor().max(0.0) as usize).min(h - 1)
		} else {
			0
		};
		FieldCell::new(column, row)
	}
	/// World-space centre of a cell of a level
	pub fn get_cell_centre(&self, cell: FieldCell, level: usize) -> Vec2 {
		let size = self.get_cell_size(level);
		self.min
			+ Vec2::new(
				(cell.get_column() as f32 + 0.5) * size.x,
				(cell.get_row() as f32 + 0.5) * size.y,
			)
	}
	/// Does the world position fall inside of the bounds
	pub fn contains(&self, position: Vec2) -> bool {
		position.x >= self.min.x
			&& position.y >= self.min.y
			&& position.x <= self.max.x
			&& position.y <= self.max.y
	}
}
