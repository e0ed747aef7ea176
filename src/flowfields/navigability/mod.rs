//! The navigability hierarchy is a mipmap-style stack of binary grids
//! describing where actors may stand.
//!
//! Level `0` is rasterised from the walkable surface geometry at full
//! resolution, every subsequent level is produced by a conservative `2x2`
//! downsample of the level below (see [NavigabilityLevel::downsample]). A
//! coarse level may over-estimate navigable area but it never loses a
//! connection present at full resolution.
//!
//! The hierarchy is built once at startup, or whenever the surface changes,
//! and is read-only thereafter
//!

pub mod surface;

use crate::prelude::*;
use bevy::prelude::*;

/// World units added to each side of the geometry extent by [NavigabilityHierarchy::build]
pub const DEFAULT_BOUNDS_PADDING: f32 = 1.0;

/// Every resolution level of the navigable surface
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct NavigabilityHierarchy {
	/// World bounds and grid sizes
	dimensions: MapDimensions,
	/// Level `0` first
	levels: Vec<NavigabilityLevel>,
}

impl NavigabilityHierarchy {
	/// Rasterise `geometry` at `base_width x base_height` and downsample it
	/// into `level_count` levels. Errors if the geometry has no triangles or
	/// its bounds have no area
	pub fn build(
		geometry: &SurfaceGeometry,
		base_width: usize,
		base_height: usize,
		level_count: usize,
	) -> Result<Self, FlowFieldError> {
		NavigabilityHierarchy::build_with_padding(
			geometry,
			base_width,
			base_height,
			level_count,
			DEFAULT_BOUNDS_PADDING,
		)
	}
	/// As [NavigabilityHierarchy::build] with a custom padding of the
	/// derived world bounds
	pub fn build_with_padding(
		geometry: &SurfaceGeometry,
		base_width: usize,
		base_height: usize,
		level_count: usize,
		padding: f32,
	) -> Result<Self, FlowFieldError> {
		let (min, max) = geometry.compute_bounds(padding)?;
		let dimensions = MapDimensions::new(min, max, base_width, base_height, level_count)?;
		let base = geometry.rasterise(&dimensions);
		debug!(
			"Rasterised {} triangles into a {}x{} base level, {} navigable pixels",
			geometry.triangle_count(),
			base_width,
			base_height,
			base.count_navigable()
		);
		Ok(NavigabilityHierarchy::from_parts(dimensions, base))
	}
	/// Build the hierarchy from a pre-made level `0` grid spanning the world
	/// bounds `[min, max]`
	pub fn from_base_level(
		base: NavigabilityLevel,
		min: Vec2,
		max: Vec2,
		level_count: usize,
	) -> Result<Self, FlowFieldError> {
		let (w, h) = base.get_dimensions();
		let dimensions = MapDimensions::new(min, max, w, h, level_count)?;
		Ok(NavigabilityHierarchy::from_parts(dimensions, base))
	}
	/// Repeatedly downsample `base` until every level exists
	fn from_parts(dimensions: MapDimensions, base: NavigabilityLevel) -> Self {
		let mut levels = Vec::with_capacity(dimensions.get_level_count());
		levels.push(base);
		while levels.len() < dimensions.get_level_count() {
			let next = match levels.last() {
				Some(previous) => previous.downsample(),
				None => break,
			};
			levels.push(next);
		}
		debug!(
			"Built navigability hierarchy of {} levels, coarsest {:?}",
			levels.len(),
			dimensions.get_level_dimensions(dimensions.get_max_level())
		);
		NavigabilityHierarchy { dimensions, levels }
	}
	/// Get a level of the hierarchy
	pub fn get_level(&self, level: usize) -> Result<&NavigabilityLevel, FlowFieldError> {
		self.levels
			.get(level)
			.ok_or(FlowFieldError::LevelOutOfRange {
				level,
				count: self.levels.len(),
			})
	}
	/// Get every level, level `0` first
	pub fn get_levels(&self) -> &[NavigabilityLevel] {
		&self.levels
	}
	/// Get the `(min, max)` world-space bounds
	pub fn get_bounds(&self) -> (Vec2, Vec2) {
		self.dimensions.get_bounds()
	}
	/// Get the pixel `(width, height)` of level `0`
	pub fn get_base_dimensions(&self) -> (usize, usize) {
		self.dimensions.get_base_dimensions()
	}
	/// Get the [MapDimensions] used to convert positions into pixels
	pub fn get_map_dimensions(&self) -> &MapDimensions {
		&self.dimensions
	}
	/// Number of levels
	pub fn get_level_count(&self) -> usize {
		self.levels.len()
	}
	/// Is the base level pixel under a world position navigable, positions
	/// outside of the world are not
	pub fn is_navigable(&self, position: Vec2) -> bool {
		match self.dimensions.world_to_cell(position, 0) {
			Some(cell) => self.levels[0].get_field_cell_value(cell),
			None => false,
		}
	}
	/// Is the cell of a level under a world position navigable
	pub fn is_navigable_at_level(&self, position: Vec2, level: usize) -> bool {
		let Some(nav) = self.levels.get(level) else {
			return false;
		};
		match self.dimensions.world_to_cell(position, level) {
			Some(cell) => nav.get_field_cell_value(cell),
			None => false,
		}
	}
	/// Total number of bits held across every level
	pub fn get_total_pixels(&self) -> usize {
		self.levels
			.iter()
			.map(|l| {
				let (w, h) = l.get_dimensions();
				w * h
			})
			.sum()
	}
	/// From a CSV file of `0`/`1` values generate the hierarchy, a `1` marks
	/// a navigable pixel. The first record is the top row of the world
	/// (maximum `y`)
	#[cfg(feature = "csv")]
	pub fn from_csv(
		path: &str,
		min: Vec2,
		max: Vec2,
		level_count: usize,
	) -> Result<Self, FlowFieldError> {
		let data = std::fs::File::open(path)?;
		let mut rdr = csv::ReaderBuilder::new()
			.has_headers(false)
			.from_reader(data);
		let mut rows: Vec<Vec<bool>> = Vec::new();
		for record in rdr.records() {
			let record = record.map_err(|e| FlowFieldError::Deserialise(e.to_string()))?;
			let mut row = Vec::with_capacity(record.len());
			for value in record.iter() {
				let parsed: u8 = value.trim().parse().map_err(|_| {
					FlowFieldError::Deserialise(format!("CSV expects 0 or 1, found {}", value))
				})?;
				row.push(parsed > 0);
			}
			rows.push(row);
		}
		let height = rows.len();
		let width = rows.first().map(|r| r.len()).unwrap_or(0);
		if width == 0 || rows.iter().any(|r| r.len() != width) {
			return Err(FlowFieldError::Deserialise(
				"CSV grid must be rectangular and non-empty".to_string(),
			));
		}
		let mut base = NavigabilityLevel::new(0, width, height);
		for (line_number, row) in rows.iter().enumerate() {
			for (column, navigable) in row.iter().enumerate() {
				if *navigable {
					base.set_field_cell_value(true, FieldCell::new(column, height - 1 - line_number));
				}
			}
		}
		NavigabilityHierarchy::from_base_level(base, min, max, level_count)
	}
	/// Create the hierarchy from a greyscale image, a pixel whose average
	/// channel brightness is at least `threshold` is navigable. The top of
	/// the image is the top of the world (maximum `y`)
	#[cfg(feature = "heightmap")]
	pub fn from_heightmap(
		path: &str,
		min: Vec2,
		max: Vec2,
		level_count: usize,
		threshold: u8,
	) -> Result<Self, FlowFieldError> {
		use photon_rs::native::open_image;
		let img = open_image(path)
			.map_err(|e| FlowFieldError::Deserialise(format!("{:?}", e)))?;
		let width = img.get_width() as usize;
		let height = img.get_height() as usize;
		let raw_pixels = img.get_raw_pixels();
		// raw pixels are arranged from the top left of the image and come in
		// sets of either 3 or 4 (if alpha channel is included)
		let chunk_size = if width * height * 4 == raw_pixels.len() {
			4
		} else {
			3
		};
		if width == 0 || height == 0 || raw_pixels.len() != width * height * chunk_size {
			return Err(FlowFieldError::Deserialise(format!(
				"heightmap of {}x{} has {} channel bytes",
				width,
				height,
				raw_pixels.len()
			)));
		}
		let mut base = NavigabilityLevel::new(0, width, height);
		for (i, px) in raw_pixels.chunks(chunk_size).enumerate() {
			// careful of u8 overflow
			let colour_avg = (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0;
			if colour_avg >= threshold as f32 {
				let column = i % width;
				let line_number = i / width;
				base.set_field_cell_value(true, FieldCell::new(column, height - 1 - line_number));
			}
		}
		NavigabilityHierarchy::from_base_level(base, min, max, level_count)
	}
}
