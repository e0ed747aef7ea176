//! The [BiasField] is a scalar importance grid at half the base resolution.
//! Each value sits in `[0, max_bias_strength]` and describes how much detail
//! the area deserves, high near junctions and active targets and fading to
//! zero in open space. Overlapping influences take the max rather than the
//! sum so crowded targets cannot stack beyond the ceiling
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Importance grid sampled when choosing a resolution level
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BiasField {
	/// World-space minimum corner
	origin: Vec2,
	/// World-space size of one cell
	cell_size: Vec2,
	/// Number of columns
	width: usize,
	/// Number of rows
	height: usize,
	/// Row-major bias values
	values: Vec<f32>,
}

impl Field<f32> for BiasField {
	/// Get the `(width, height)` of the field
	fn get_dimensions(&self) -> (usize, usize) {
		(self.width, self.height)
	}
	/// Retrieve a field cell value
	fn get_field_cell_value(&self, field_cell: FieldCell) -> f32 {
		if !self.contains(field_cell) {
			panic!("Cannot get a BiasField value, index out of bounds. Asked for column {}, row {}, field width is {}, field height is {}", field_cell.get_column(), field_cell.get_row(), self.width, self.height)
		}
		self.values[field_cell.get_index(self.width)]
	}
	/// Set a field cell to a value
	fn set_field_cell_value(&mut self, value: f32, field_cell: FieldCell) {
		if !self.contains(field_cell) {
			panic!("Cannot set a BiasField value, index out of bounds. Asked for column {}, row {}, field width is {}, field height is {}", field_cell.get_column(), field_cell.get_row(), self.width, self.height)
		}
		self.values[field_cell.get_index(self.width)] = value;
	}
}

impl BiasField {
	/// Create a zeroed field covering the world at half the base resolution
	pub fn new(map_dimensions: &MapDimensions) -> Self {
		let (min, _) = map_dimensions.get_bounds();
		let (base_w, base_h) = map_dimensions.get_base_dimensions();
		let width = base_w.div_ceil(2).max(1);
		let height = base_h.div_ceil(2).max(1);
		let cell_size = map_dimensions.get_cell_size(0) * 2.0;
		BiasField {
			origin: min,
			cell_size,
			width,
			height,
			values: vec![0.0; width * height],
		}
	}
	/// World-space size of one cell
	pub fn get_cell_size(&self) -> Vec2 {
		self.cell_size
	}
	/// Row-major bias values
	pub fn get_values(&self) -> &[f32] {
		&self.values
	}
	/// World-space centre of a cell
	pub fn get_cell_centre(&self, field_cell: FieldCell) -> Vec2 {
		self.origin
			+ Vec2::new(
				(field_cell.get_column() as f32 + 0.5) * self.cell_size.x,
				(field_cell.get_row() as f32 + 0.5) * self.cell_size.y,
			)
	}
	/// Inclusive range of cells whose centres may lie within `radius` of
	/// `position`, clamped to the field
	pub fn get_cell_range(&self, position: Vec2, radius: f32) -> ((usize, usize), (usize, usize)) {
		let lo = ((position - Vec2::splat(radius) - self.origin) / self.cell_size).floor();
		let hi = ((position + Vec2::splat(radius) - self.origin) / self.cell_size).ceil();
		let clamp = |v: f32, len: usize| -> usize {
			if v.is_finite() {
				(v.max(0.0) as usize).min(len - 1)
			} else {
				0
			}
		};
		(
			(clamp(lo.x, self.width), clamp(lo.y, self.height)),
			(clamp(hi.x, self.width), clamp(hi.y, self.height)),
		)
	}
	/// Raise a cell to `value` if it is larger than the current value
	pub fn raise(&mut self, field_cell: FieldCell, value: f32) {
		let index = field_cell.get_index(self.width);
		if value > self.values[index] {
			self.values[index] = value;
		}
	}
	/// Reset every value to zero
	pub fn clear(&mut self) {
		self.values.fill(0.0);
	}
	/// Bilinear point-query at a world position, positions outside of the
	/// world read the nearest edge
	pub fn sample(&self, position: Vec2) -> f32 {
		let continuous = (position - self.origin) / self.cell_size;
		bilinear_corners(continuous, self.width, self.height)
			.iter()
			.map(|((c, r), w)| self.values[r * self.width + c] * w)
			.sum()
	}
	/// Largest value held by the field
	pub fn get_max_value(&self) -> f32 {
		self.values.iter().copied().fold(0.0, f32::max)
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	fn dims() -> MapDimensions {
		MapDimensions::new(Vec2::ZERO, Vec2::new(20.0, 10.0), 20, 10, 2).unwrap()
	}
	#[test]
	fn half_resolution() {
		let field = BiasField::new(&dims());
		assert_eq!((10, 5), field.get_dimensions());
		assert_eq!(Vec2::splat(2.0), field.get_cell_size());
	}
	#[test]
	fn raise_takes_max() {
		let mut field = BiasField::new(&dims());
		let cell = FieldCell::new(3, 3);
		field.raise(cell, 2.0);
		field.raise(cell, 1.0);
		assert_eq!(2.0, field.get_field_cell_value(cell));
	}
	#[test]
	fn sample_at_centre_is_exact() {
		let mut field = BiasField::new(&dims());
		let cell = FieldCell::new(4, 2);
		field.set_field_cell_value(3.0, cell);
		let centre = field.get_cell_centre(cell);
		assert!((field.sample(centre) - 3.0).abs() < 1e-5);
		// half way to the next centre
		let between = centre + Vec2::new(1.0, 0.0);
		assert!((field.sample(between) - 1.5).abs() < 1e-5);
	}
	#[test]
	fn cell_range_is_clamped() {
		let field = BiasField::new(&dims());
		let ((x0, y0), (x1, y1)) = field.get_cell_range(Vec2::new(1.0, 1.0), 100.0);
		assert_eq!((0, 0, 9, 4), (x0, y0, x1, y1));
	}
}
