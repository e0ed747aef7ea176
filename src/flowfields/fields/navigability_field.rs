//! A [NavigabilityLevel] is a bit-packed grid where a set bit marks a pixel
//! an actor may stand on. Every level of a
//! [crate::prelude::NavigabilityHierarchy] is one of these, level `0` at full
//! resolution and each coarser level built by combining `2x2` blocks of the
//! one below with a logical OR.
//!
//! An OR keeps narrow corridors open at coarse resolutions, the coarse grid
//! may claim a block is navigable when only one of its four children is:
//!
//! ```text
//!  level 0         level 1
//!  _______         ___
//! |#|#|#|.|       |#|.|
//! |#|#|.|#|  -->  |.|#|
//! |.|#|#|#|
//! |#|.|#|#|
//! ```
//! where `.` is navigable and `#` is blocked
//!

use crate::prelude::*;
use fixedbitset::FixedBitSet;

/// Binary grid of navigable pixels for a single resolution level
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigabilityLevel {
	/// Index of the level inside of the hierarchy
	level: usize,
	/// Number of columns
	width: usize,
	/// Number of rows
	height: usize,
	/// Row-major bits, set when navigable
	bits: FixedBitSet,
}

impl Field<bool> for NavigabilityLevel {
	/// Get the `(width, height)` of the level
	fn get_dimensions(&self) -> (usize, usize) {
		(self.width, self.height)
	}
	/// Retrieve whether a pixel is navigable
	fn get_field_cell_value(&self, field_cell: FieldCell) -> bool {
		if !self.contains(field_cell) {
			panic!("Cannot get a NavigabilityLevel value, index out of bounds. Asked for column {}, row {}, level width is {}, level height is {}", field_cell.get_column(), field_cell.get_row(), self.width, self.height)
		}
		self.bits.contains(field_cell.get_index(self.width))
	}
	/// Mark a pixel as navigable or blocked
	fn set_field_cell_value(&mut self, value: bool, field_cell: FieldCell) {
		if !self.contains(field_cell) {
			panic!("Cannot set a NavigabilityLevel value, index out of bounds. Asked for column {}, row {}, level width is {}, level height is {}", field_cell.get_column(), field_cell.get_row(), self.width, self.height)
		}
		self.bits.set(field_cell.get_index(self.width), value);
	}
}

impl NavigabilityLevel {
	/// Create a level of `width x height` pixels where every pixel is blocked
	pub fn new(level: usize, width: usize, height: usize) -> Self {
		NavigabilityLevel {
			level,
			width,
			height,
			bits: FixedBitSet::with_capacity(width * height),
		}
	}
	/// Create a level where every pixel is navigable
	pub fn new_navigable(level: usize, width: usize, height: usize) -> Self {
		let mut nav = NavigabilityLevel::new(level, width, height);
		nav.bits.insert_range(..);
		nav
	}
	/// Index of the level inside of the hierarchy
	pub fn get_level(&self) -> usize {
		self.level
	}
	/// Get a reference to the underlying bits
	pub fn get_bits(&self) -> &FixedBitSet {
		&self.bits
	}
	/// Bounds-tolerant lookup, any coordinate outside of the level is
	/// considered blocked
	pub fn is_navigable(&self, column: i64, row: i64) -> bool {
		if column < 0 || row < 0 || column >= self.width as i64 || row >= self.height as i64 {
			return false;
		}
		self.bits
			.contains(row as usize * self.width + column as usize)
	}
	/// Number of navigable pixels
	pub fn count_navigable(&self) -> usize {
		self.bits.count_ones(..)
	}
	/// Produce the next coarser level, a pixel of the result is navigable if
	/// any pixel of the `2x2` block beneath it is navigable. Odd dimensions
	/// round up and the missing pixels of a partial block count as blocked
	pub fn downsample(&self) -> NavigabilityLevel {
		let width = self.width.div_ceil(2).max(1);
		let height = self.height.div_ceil(2).max(1);
		let mut coarse = NavigabilityLevel::new(self.level + 1, width, height);
		for index in self.bits.ones() {
			let column = (index % self.width) / 2;
			let row = (index / self.width) / 2;
			coarse.bits.insert(row * width + column);
		}
		coarse
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn blocked_by_default() {
		let nav = NavigabilityLevel::new(0, 4, 3);
		assert_eq!(0, nav.count_navigable());
		assert!(!nav.get_field_cell_value(FieldCell::new(3, 2)));
	}
	#[test]
	fn set_and_get() {
		let mut nav = NavigabilityLevel::new(0, 4, 3);
		nav.set_field_cell_value(true, FieldCell::new(1, 2));
		assert!(nav.get_field_cell_value(FieldCell::new(1, 2)));
		assert!(nav.is_navigable(1, 2));
		assert!(!nav.is_navigable(-1, 2));
		assert!(!nav.is_navigable(1, 3));
	}
	#[test]
	#[should_panic]
	fn get_out_of_bounds() {
		let nav = NavigabilityLevel::new(0, 4, 3);
		nav.get_field_cell_value(FieldCell::new(4, 0));
	}
	#[test]
	fn downsample_single_pixel_is_conservative() {
		let mut nav = NavigabilityLevel::new(0, 4, 4);
		nav.set_field_cell_value(true, FieldCell::new(3, 0));
		let coarse = nav.downsample();
		assert_eq!((2, 2), coarse.get_dimensions());
		assert_eq!(1, coarse.get_level());
		assert!(coarse.get_field_cell_value(FieldCell::new(1, 0)));
		assert_eq!(1, coarse.count_navigable());
	}
	#[test]
	fn downsample_odd_dimensions() {
		let nav = NavigabilityLevel::new_navigable(0, 5, 3);
		let coarse = nav.downsample();
		assert_eq!((3, 2), coarse.get_dimensions());
		assert_eq!(6, coarse.count_navigable());
	}
}
