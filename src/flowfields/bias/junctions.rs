//! Junction detection over the base navigability level.
//!
//! Every interior navigable pixel is scored from its `3x3` neighbourhood by
//! two heuristics and the larger score is kept:
//!
//! * Connectivity - the number of separate runs of navigable pixels around
//! the ring of 8 neighbours. A pixel touching several disconnected groups
//! joins them together
//! * Pattern - the shape formed by the orthogonal neighbours, a 4-way
//! crossing scores highest, then a 3-way tee, then a corner
//!
//! ```text
//!  crossing     tee       corner
//!   # . #      # . #      # # #
//!   . x .      . x .      # x .
//!   # . #      # # #      # . #
//! ```
//!
//! Only local maxima above the threshold survive and the highest scores are
//! kept up to the junction limit
//!

use std::collections::BTreeMap;

use crate::prelude::*;
use bevy::prelude::*;

/// A point of the surface where several routes meet
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct JunctionPoint {
	/// World-space centre of the junction pixel
	position: Vec2,
	/// Base level pixel of the junction
	cell: FieldCell,
	/// Importance score in `[0, 1]`
	score: f32,
}

impl JunctionPoint {
	/// Create a new instance of [JunctionPoint]
	pub fn new(position: Vec2, cell: FieldCell, score: f32) -> Self {
		JunctionPoint {
			position,
			cell,
			score,
		}
	}
	/// World-space position
	pub fn get_position(&self) -> Vec2 {
		self.position
	}
	/// Base level pixel
	pub fn get_cell(&self) -> FieldCell {
		self.cell
	}
	/// Importance score
	pub fn get_score(&self) -> f32 {
		self.score
	}
}

/// Scan the base level for junctions, keeping at most `max_junctions` local
/// maxima whose score exceeds `threshold`
pub fn detect_junctions(
	nav: &NavigabilityLevel,
	map_dimensions: &MapDimensions,
	threshold: f32,
	max_junctions: usize,
) -> Vec<JunctionPoint> {
	let (width, height) = nav.get_dimensions();
	if width < 3 || height < 3 {
		return vec![];
	}
	// sparse, open ground and corridor interiors score zero
	let mut scores: BTreeMap<usize, f32> = BTreeMap::new();
	for index in nav.get_bits().ones() {
		let column = index % width;
		let row = index / width;
		if column == 0 || row == 0 || column == width - 1 || row == height - 1 {
			continue;
		}
		let score = score_pixel(nav, column as i64, row as i64);
		if score > 0.0 {
			scores.insert(index, score);
		}
	}
	let mut junctions: Vec<(usize, f32)> = scores
		.iter()
		.filter(|(_, score)| **score > threshold)
		.filter(|(index, score)| is_local_maximum(&scores, **index, **score, width, height))
		.map(|(i, s)| (*i, *s))
		.collect();
	// highest score first, raster order breaks ties
	junctions.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
	junctions.truncate(max_junctions);
	debug!(
		"Detected {} junctions from {} scored pixels",
		junctions.len(),
		scores.len()
	);
	junctions
		.into_iter()
		.map(|(index, score)| {
			let cell = FieldCell::from_index(index, width);
			JunctionPoint::new(map_dimensions.get_cell_centre(cell, 0), cell, score)
		})
		.collect()
}

/// Combined junction score of a navigable interior pixel
fn score_pixel(nav: &NavigabilityLevel, column: i64, row: i64) -> f32 {
	let mut ring = [false; 8];
	for (i, ordinal) in Ordinal::RING.iter().enumerate() {
		let (dc, dr) = ordinal.offset();
		ring[i] = nav.is_navigable(column + dc as i64, row + dr as i64);
	}
	connectivity_score(&ring).max(pattern_score(&ring))
}

/// Score from the number of separate navigable runs around the ring
fn connectivity_score(ring: &[bool; 8]) -> f32 {
	let mut components = 0;
	for i in 0..8 {
		let previous = ring[(i + 7) % 8];
		if ring[i] && !previous {
			components += 1;
		}
	}
	match components {
		0 | 1 => 0.0,
		2 => 0.25,
		3 => 0.75,
		_ => 1.0,
	}
}

/// Score from the arrangement of orthogonal arms and blocked diagonals. The
/// ring is ordered N, NE, E, SE, S, SW, W, NW
fn pattern_score(ring: &[bool; 8]) -> f32 {
	let arms = [ring[0], ring[2], ring[4], ring[6]];
	let arm_count = arms.iter().filter(|a| **a).count();
	let blocked_diagonals = [ring[1], ring[3], ring[5], ring[7]]
		.iter()
		.filter(|d| !**d)
		.count();
	match arm_count {
		4 if blocked_diagonals >= 3 => 1.0,
		3 if blocked_diagonals >= 2 => 0.8,
		2 => {
			// perpendicular arms with the diagonal between them blocked
			for i in 0..4 {
				if arms[i] && arms[(i + 1) % 4] && !ring[i * 2 + 1] {
					return 0.3;
				}
			}
			0.0
		}
		_ => 0.0,
	}
}

/// A pixel survives if no neighbour scores higher and no earlier neighbour
/// (in raster order) scores the same
fn is_local_maximum(
	scores: &BTreeMap<usize, f32>,
	index: usize,
	score: f32,
	width: usize,
	height: usize,
) -> bool {
	let cell = (index % width, index / width);
	for (c, r) in Ordinal::get_all_cell_neighbours(cell, width, height) {
		let n_index = r * width + c;
		if let Some(n_score) = scores.get(&n_index) {
			if *n_score > score || (*n_score == score && n_index < index) {
				return false;
			}
		}
	}
	true
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// Build a level from rows written top (max row) to bottom
	fn level_from_rows(rows: &[&str]) -> (NavigabilityLevel, MapDimensions) {
		let height = rows.len();
		let width = rows[0].len();
		let mut nav = NavigabilityLevel::new(0, width, height);
		for (line, text) in rows.iter().enumerate() {
			for (column, ch) in text.chars().enumerate() {
				if ch == '.' {
					nav.set_field_cell_value(true, FieldCell::new(column, height - 1 - line));
				}
			}
		}
		let dims = MapDimensions::new(
			Vec2::ZERO,
			Vec2::new(width as f32, height as f32),
			width,
			height,
			1,
		)
		.unwrap();
		(nav, dims)
	}
	#[test]
	fn crossing_is_detected() {
		#[rustfmt::skip]
		let rows = [
			"###.###",
			"###.###",
			"###.###",
			".......",
			"###.###",
			"###.###",
			"###.###",
		];
		let (nav, dims) = level_from_rows(&rows);
		let junctions = detect_junctions(&nav, &dims, 0.5, 50);
		assert_eq!(1, junctions.len());
		assert_eq!(FieldCell::new(3, 3), junctions[0].get_cell());
		assert_eq!(1.0, junctions[0].get_score());
		assert_eq!(Vec2::new(3.5, 3.5), junctions[0].get_position());
	}
	#[test]
	fn tee_is_detected() {
		#[rustfmt::skip]
		let rows = [
			"#######",
			"#######",
			"#######",
			".......",
			"###.###",
			"###.###",
			"###.###",
		];
		let (nav, dims) = level_from_rows(&rows);
		let junctions = detect_junctions(&nav, &dims, 0.5, 50);
		assert_eq!(1, junctions.len());
		assert_eq!(FieldCell::new(3, 3), junctions[0].get_cell());
		assert!(junctions[0].get_score() >= 0.75);
	}
	#[test]
	fn open_ground_has_no_junctions() {
		let nav = NavigabilityLevel::new_navigable(0, 16, 16);
		let dims = MapDimensions::new(Vec2::ZERO, Vec2::splat(16.0), 16, 16, 1).unwrap();
		assert!(detect_junctions(&nav, &dims, 0.5, 50).is_empty());
	}
	#[test]
	fn straight_corridor_is_below_threshold() {
		#[rustfmt::skip]
		let rows = [
			"#####",
			".....",
			"#####",
		];
		let (nav, dims) = level_from_rows(&rows);
		assert!(detect_junctions(&nav, &dims, 0.5, 50).is_empty());
		// lowering the threshold admits the corridor, but only the first of
		// the equally scored pixels survives
		let low = detect_junctions(&nav, &dims, 0.1, 50);
		assert_eq!(1, low.len());
		assert_eq!(FieldCell::new(1, 1), low[0].get_cell());
	}
	#[test]
	fn cap_keeps_highest() {
		#[rustfmt::skip]
		let rows = [
			"###.#####.###",
			"###.#####.###",
			".............",
			"###.#########",
			"###.#########",
		];
		let (nav, dims) = level_from_rows(&rows);
		let junctions = detect_junctions(&nav, &dims, 0.5, 1);
		assert_eq!(1, junctions.len());
		assert_eq!(FieldCell::new(3, 2), junctions[0].get_cell());
		assert_eq!(1.0, junctions[0].get_score());
	}
}
