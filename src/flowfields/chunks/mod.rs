//! The base navigability level is tiled into square chunks, the unit of
//! work of the [ChunkScheduler]. Each chunk covers `chunk_size x chunk_size`
//! base pixels, chunks along the far edges may be smaller when the base
//! dimensions are not an exact multiple
//!
//! ```text
//!  row 1  |(0,1)|(1,1)|(2,1)|
//!  row 0  |(0,0)|(1,0)|(2,0)|
//! ```
//!

pub mod agents;
pub mod scheduler;

use crate::prelude::*;
use bevy::prelude::*;

/// Unique ID of a chunk, its `(column, row)` in the tiling
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct ChunkID((usize, usize));

impl ChunkID {
	/// Create a new instance of [ChunkID]
	pub fn new(column: usize, row: usize) -> Self {
		ChunkID((column, row))
	}
	/// Get the chunk `(column, row)` tuple
	pub fn get(&self) -> (usize, usize) {
		self.0
	}
	/// Get the chunk column
	pub fn get_column(&self) -> usize {
		self.0 .0
	}
	/// Get the chunk row
	pub fn get_row(&self) -> usize {
		self.0 .1
	}
}

/// A rectangle of base level pixels processed as one unit
#[derive(Clone, Copy, Debug, Reflect)]
pub struct Chunk {
	/// Position in the tiling
	id: ChunkID,
	/// Base level pixels covered
	region: CellRegion,
	/// World-space centre
	world_centre: Vec2,
}

// identity is the pixel region, the derived world centre is ignored
impl PartialEq for Chunk {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.region == other.region
	}
}
impl Eq for Chunk {}

impl Chunk {
	/// Position in the tiling
	pub fn get_id(&self) -> ChunkID {
		self.id
	}
	/// Base level pixels covered
	pub fn get_region(&self) -> CellRegion {
		self.region
	}
	/// World-space centre
	pub fn get_world_centre(&self) -> Vec2 {
		self.world_centre
	}
}

/// Every chunk of the base level
#[derive(Clone, Debug)]
pub struct ChunkGrid {
	/// Edge length of a chunk in pixels after clamping
	chunk_size: usize,
	/// Number of chunk columns
	columns: usize,
	/// Number of chunk rows
	rows: usize,
	/// Row-major chunks
	chunks: Vec<Chunk>,
	/// Conversions between world positions and pixels
	dimensions: MapDimensions,
}

impl ChunkGrid {
	/// Tile the base level of `dimensions` into chunks of `chunk_size`
	/// pixels, the size is clamped to at least [MIN_CHUNK_SIZE]
	pub fn new(dimensions: &MapDimensions, chunk_size: u32) -> Self {
		let chunk_size = chunk_size.max(MIN_CHUNK_SIZE) as usize;
		let (width, height) = dimensions.get_base_dimensions();
		let columns = width.div_ceil(chunk_size).max(1);
		let rows = height.div_ceil(chunk_size).max(1);
		let base_cell = dimensions.get_cell_size(0);
		let (min, _) = dimensions.get_bounds();
		let mut chunks = Vec::with_capacity(columns * rows);
		for row in 0..rows {
			for column in 0..columns {
				let lo = (column * chunk_size, row * chunk_size);
				let hi = (
					((column + 1) * chunk_size).min(width),
					((row + 1) * chunk_size).min(height),
				);
				let world_centre = min
					+ Vec2::new(
						(lo.0 + hi.0) as f32 * 0.5 * base_cell.x,
						(lo.1 + hi.1) as f32 * 0.5 * base_cell.y,
					);
				chunks.push(Chunk {
					id: ChunkID::new(column, row),
					region: CellRegion::new(lo, hi),
					world_centre,
				});
			}
		}
		debug!(
			"Tiled {}x{} pixels into {}x{} chunks of {} pixels",
			width, height, columns, rows, chunk_size
		);
		ChunkGrid {
			chunk_size,
			columns,
			rows,
			chunks,
			dimensions: *dimensions,
		}
	}
	/// Edge length of a chunk in pixels
	pub fn get_chunk_size(&self) -> usize {
		self.chunk_size
	}
	/// `(columns, rows)` of chunks
	pub fn get_grid_dimensions(&self) -> (usize, usize) {
		(self.columns, self.rows)
	}
	/// Every chunk, row-major
	pub fn get_chunks(&self) -> &[Chunk] {
		&self.chunks
	}
	/// Number of chunks
	pub fn len(&self) -> usize {
		self.chunks.len()
	}
	/// Is the tiling empty
	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}
	/// Get a chunk by its index
	pub fn get_chunk(&self, index: usize) -> Option<&Chunk> {
		self.chunks.get(index)
	}
	/// World-space length of the diagonal of a full chunk
	pub fn get_chunk_extent(&self) -> f32 {
		(self.dimensions.get_cell_size(0) * self.chunk_size as f32).length()
	}
	/// Index of the chunk containing a world position, positions outside of
	/// the world are clamped onto the nearest edge chunk
	pub fn get_chunk_index(&self, position: Vec2) -> usize {
		let cell = self.dimensions.world_to_cell_clamped(position, 0);
		let column = (cell.get_column() / self.chunk_size).min(self.columns - 1);
		let row = (cell.get_row() / self.chunk_size).min(self.rows - 1);
		row * self.columns + column
	}
	/// Indices of the up to eight chunks touching the chunk at `index`,
	/// row-major
	pub fn get_neighbours(&self, index: usize) -> Vec<usize> {
		if index >= self.chunks.len() {
			return vec![];
		}
		let (column, row) = (index % self.columns, index / self.columns);
		let mut neighbours = Vec::with_capacity(8);
		for r in row.saturating_sub(1)..=(row + 1).min(self.rows - 1) {
			for c in column.saturating_sub(1)..=(column + 1).min(self.columns - 1) {
				if (c, r) != (column, row) {
					neighbours.push(r * self.columns + c);
				}
			}
		}
		neighbours
	}
	/// Indices of every chunk whose pixels lie within `radius` of a world
	/// position
	pub fn get_chunks_within(&self, position: Vec2, radius: f32) -> Vec<usize> {
		let radius = radius.max(0.0);
		let lo = self
			.dimensions
			.world_to_cell_clamped(position - Vec2::splat(radius), 0);
		let hi = self
			.dimensions
			.world_to_cell_clamped(position + Vec2::splat(radius), 0);
		let base_cell = self.dimensions.get_cell_size(0);
		let (world_min, _) = self.dimensions.get_bounds();
		let mut indices = Vec::new();
		for row in (lo.get_row() / self.chunk_size)..=(hi.get_row() / self.chunk_size).min(self.rows - 1) {
			for column in
				(lo.get_column() / self.chunk_size)..=(hi.get_column() / self.chunk_size).min(self.columns - 1)
			{
				let index = row * self.columns + column;
				let region = self.chunks[index].get_region();
				// distance from the position to the chunk rectangle
				let rect_min = world_min
					+ Vec2::new(region.get_min().0 as f32, region.get_min().1 as f32) * base_cell;
				let rect_max = world_min
					+ Vec2::new(region.get_max().0 as f32, region.get_max().1 as f32) * base_cell;
				let closest = position.clamp(rect_min, rect_max);
				if closest.distance(position) <= radius {
					indices.push(index);
				}
			}
		}
		indices
	}
}
