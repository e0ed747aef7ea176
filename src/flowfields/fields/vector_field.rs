//! A [VectorFieldLevel] holds one 2D vector per cell of a resolution level.
//!
//! Vectors point away from the nearest reachable target, their magnitude
//! encodes the strength of the guidance (`1` at a pinned target cell,
//! decaying as signal travels outward). Blocked cells and cells the signal
//! has not yet reached hold the zero vector. Actors steer along the
//! negation of the stored direction
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Direction field of a single resolution level
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct VectorFieldLevel {
	/// Index of the level inside of the hierarchy
	level: usize,
	/// Number of columns
	width: usize,
	/// Number of rows
	height: usize,
	/// Row-major vectors
	vectors: Vec<Vec2>,
}

impl Field<Vec2> for VectorFieldLevel {
	/// Get the `(width, height)` of the level
	fn get_dimensions(&self) -> (usize, usize) {
		(self.width, self.height)
	}
	/// Retrieve a field cell value
	fn get_field_cell_value(&self, field_cell: FieldCell) -> Vec2 {
		if !self.contains(field_cell) {
			panic!("Cannot get a VectorFieldLevel value, index out of bounds. Asked for column {}, row {}, level width is {}, level height is {}", field_cell.get_column(), field_cell.get_row(), self.width, self.height)
		}
		self.vectors[field_cell.get_index(self.width)]
	}
	/// Set a field cell to a value
	fn set_field_cell_value(&mut self, value: Vec2, field_cell: FieldCell) {
		if !self.contains(field_cell) {
			panic!("Cannot set a VectorFieldLevel value, index out of bounds. Asked for column {}, row {}, level width is {}, level height is {}", field_cell.get_column(), field_cell.get_row(), self.width, self.height)
		}
		self.vectors[field_cell.get_index(self.width)] = value;
	}
}

impl VectorFieldLevel {
	/// Create a zeroed level of `width x height` cells
	pub fn new(level: usize, width: usize, height: usize) -> Self {
		VectorFieldLevel {
			level,
			width,
			height,
			vectors: vec![Vec2::ZERO; width * height],
		}
	}
	/// Index of the level inside of the hierarchy
	pub fn get_level(&self) -> usize {
		self.level
	}
	/// Get the row-major vectors
	pub fn get_vectors(&self) -> &[Vec2] {
		&self.vectors
	}
	/// Get the row-major vectors mutably
	pub fn get_vectors_mut(&mut self) -> &mut [Vec2] {
		&mut self.vectors
	}
	/// Bounds-tolerant lookup, anything outside of the level is zero
	pub fn get_or_zero(&self, column: i64, row: i64) -> Vec2 {
		if column < 0 || row < 0 || column >= self.width as i64 || row >= self.height as i64 {
			return Vec2::ZERO;
		}
		self.vectors[row as usize * self.width + column as usize]
	}
	/// Is the cell a pinned target cell, one whose magnitude sits at `1`
	pub fn is_pinned(&self, field_cell: FieldCell) -> bool {
		self.get_field_cell_value(field_cell).length() > PINNED_MAGNITUDE_THRESHOLD
	}
	/// Reset every vector to zero
	pub fn clear(&mut self) {
		self.vectors.fill(Vec2::ZERO);
	}
	/// Overwrite every vector with those of another level of equal size
	pub fn copy_from(&mut self, other: &VectorFieldLevel) {
		if self.vectors.len() == other.vectors.len() {
			self.vectors.copy_from_slice(&other.vectors);
		} else {
			warn!(
				"Refusing to copy a {}x{} vector level into a {}x{} level",
				other.width, other.height, self.width, self.height
			);
		}
	}
	/// Bilinearly interpolate the raw (un-normalised) vectors at a position
	/// given in fractional cells of this level
	pub fn sample_bilinear(&self, continuous: Vec2) -> Vec2 {
		bilinear_corners(continuous, self.width, self.height)
			.iter()
			.map(|((c, r), w)| self.vectors[r * self.width + c] * *w)
			.sum()
	}
	/// Number of cells holding a non-zero vector
	pub fn count_non_zero(&self) -> usize {
		self.vectors
			.iter()
			.filter(|v| v.length_squared() > ZERO_EPSILON)
			.count()
	}
	/// Number of cells of a region holding a non-zero vector
	pub fn count_non_zero_in(&self, region: CellRegion) -> usize {
		let (min, max) = (region.get_min(), region.get_max());
		let (max_column, max_row) = (max.0.min(self.width), max.1.min(self.height));
		let mut count = 0;
		for row in min.1..max_row {
			for column in min.0..max_column {
				if self.vectors[row * self.width + column].length_squared() > ZERO_EPSILON {
					count += 1;
				}
			}
		}
		count
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn new_is_zeroed() {
		let field = VectorFieldLevel::new(2, 3, 4);
		assert_eq!((3, 4), field.get_dimensions());
		assert_eq!(0, field.count_non_zero());
		assert_eq!(2, field.get_level());
	}
	#[test]
	fn pinned_detection() {
		let mut field = VectorFieldLevel::new(0, 3, 3);
		field.set_field_cell_value(Vec2::X, FieldCell::new(1, 1));
		field.set_field_cell_value(Vec2::X * 0.9, FieldCell::new(2, 1));
		assert!(field.is_pinned(FieldCell::new(1, 1)));
		assert!(!field.is_pinned(FieldCell::new(2, 1)));
	}
	#[test]
	fn outside_reads_zero() {
		let mut field = VectorFieldLevel::new(0, 3, 3);
		field.set_field_cell_value(Vec2::Y, FieldCell::new(0, 0));
		assert_eq!(Vec2::Y, field.get_or_zero(0, 0));
		assert_eq!(Vec2::ZERO, field.get_or_zero(-1, 0));
		assert_eq!(Vec2::ZERO, field.get_or_zero(0, 3));
	}
	#[test]
	fn clear_resets() {
		let mut field = VectorFieldLevel::new(0, 3, 3);
		field.set_field_cell_value(Vec2::Y, FieldCell::new(2, 2));
		field.clear();
		assert_eq!(0, field.count_non_zero());
	}
	#[test]
	fn count_within_region() {
		let mut field = VectorFieldLevel::new(0, 4, 4);
		field.set_field_cell_value(Vec2::Y, FieldCell::new(0, 0));
		field.set_field_cell_value(Vec2::X, FieldCell::new(3, 3));
		assert_eq!(1, field.count_non_zero_in(CellRegion::new((0, 0), (2, 2))));
		// clamped to the field
		assert_eq!(2, field.count_non_zero_in(CellRegion::new((0, 0), (9, 9))));
	}
}
