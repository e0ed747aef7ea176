//! The kinds of fields used by the algorithm
//!

pub mod bias_field;
pub mod navigability_field;
pub mod vector_field;

use bevy::prelude::*;

/// Defines required access to field arrays
pub trait Field<T> {
	/// Get the `(width, height)` of the field
	fn get_dimensions(&self) -> (usize, usize);
	/// Retrieve a field cell value
	fn get_field_cell_value(&self, field_cell: FieldCell) -> T;
	/// Set a field cell to a value
	fn set_field_cell_value(&mut self, value: T, field_cell: FieldCell);
	/// Does the cell sit inside of the field
	fn contains(&self, field_cell: FieldCell) -> bool {
		let (w, h) = self.get_dimensions();
		field_cell.get_column() < w && field_cell.get_row() < h
	}
}

/// ID of a cell within a field
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct FieldCell((usize, usize));

impl FieldCell {
	/// Create a new instance of [FieldCell]
	pub fn new(column: usize, row: usize) -> Self {
		FieldCell((column, row))
	}
	/// Get the cell `(column, row)` tuple
	pub fn get_column_row(&self) -> (usize, usize) {
		self.0
	}
	/// Get the cell column
	pub fn get_column(&self) -> usize {
		self.0 .0
	}
	/// Get the cell row
	pub fn get_row(&self) -> usize {
		self.0 .1
	}
	/// Index of the cell inside of a row-major array of `width` columns
	pub fn get_index(&self, width: usize) -> usize {
		self.get_row() * width + self.get_column()
	}
	/// Cell at a row-major `index` of an array with `width` columns
	pub fn from_index(index: usize, width: usize) -> Self {
		FieldCell::new(index % width, index / width)
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn row_major_index() {
		let cell = FieldCell::new(3, 2);
		assert_eq!(23, cell.get_index(10));
		assert_eq!(cell, FieldCell::from_index(23, 10));
	}
}
