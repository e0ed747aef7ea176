//! Field propagation, a light-propagation style relaxation of the
//! [VectorFieldLevel]s.
//!
//! Targets seed the field by pinning the navigable cells around them to unit
//! vectors pointing away from the target. Each relaxation stage then sweeps
//! a region of cells in place, every non-pinned navigable cell taking a
//! magnitude weighted average of the neighbours whose direction points
//! toward it and scaling the result by the falloff rate. Signal therefore
//! spreads outward from targets, fades with distance and bends around
//! blocked cells because those never hold or pass on a direction.
//!
//! A sweep visits cells in one of four raster orders, successive stages
//! cycle through them so that signal is carried across a region in every
//! direction:
//!
//! ```text
//!  order 0      order 1      order 2      order 3
//!  ----->       <-----       <-----       ----->
//!  ----->  ^    <-----  v    <-----  ^    ----->  v
//!  ----->  |    <-----  |    <-----  |    ----->  |
//! ```
//!
//! Stored vectors point away from the targets, consumers negate them to
//! steer toward a target
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Rectangle of cells, `min` inclusive and `max` exclusive
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct CellRegion {
	/// `(column, row)` of the first cell
	min: (usize, usize),
	/// `(column, row)` one past the last cell
	max: (usize, usize),
}

impl CellRegion {
	/// Create a new instance of [CellRegion]
	pub fn new(min: (usize, usize), max: (usize, usize)) -> Self {
		CellRegion { min, max }
	}
	/// Region covering a whole grid of `width x height`
	pub fn whole(width: usize, height: usize) -> Self {
		CellRegion::new((0, 0), (width, height))
	}
	/// First cell
	pub fn get_min(&self) -> (usize, usize) {
		self.min
	}
	/// One past the last cell
	pub fn get_max(&self) -> (usize, usize) {
		self.max
	}
	/// Number of cells covered
	pub fn area(&self) -> usize {
		self.max.0.saturating_sub(self.min.0) * self.max.1.saturating_sub(self.min.1)
	}
	/// Does the region cover the cell
	pub fn contains(&self, cell: FieldCell) -> bool {
		cell.get_column() >= self.min.0
			&& cell.get_column() < self.max.0
			&& cell.get_row() >= self.min.1
			&& cell.get_row() < self.max.1
	}
	/// Convert a region of base level pixels into the cells of `level`
	/// covering it, clamped to a grid of `width x height`
	pub fn at_level(&self, level: usize, width: usize, height: usize) -> CellRegion {
		let scale = 1usize << level.min(31);
		CellRegion::new(
			((self.min.0 / scale).min(width), (self.min.1 / scale).min(height)),
			(
				self.max.0.div_ceil(scale).min(width),
				self.max.1.div_ceil(scale).min(height),
			),
		)
	}
	/// Grow the region by `margin` cells on each side, clamped to a grid of
	/// `width x height`
	pub fn expand(&self, margin: usize, width: usize, height: usize) -> CellRegion {
		CellRegion::new(
			(
				self.min.0.saturating_sub(margin),
				self.min.1.saturating_sub(margin),
			),
			(
				(self.max.0 + margin).min(width),
				(self.max.1 + margin).min(height),
			),
		)
	}
}

/// Seeds and relaxes the vector field levels. The engine holds no field
/// data itself, the levels are owned by [FieldStorage] and lent to the
/// engine whenever it writes
#[derive(Clone, Debug)]
pub struct PropagationEngine {
	/// Relaxation options
	config: PropagationConfig,
	/// Target positions currently seeded
	seeds: Vec<Vec2>,
	/// Radius the seeds were pinned with
	seed_radius: f32,
}

impl PropagationEngine {
	/// Create a new instance of [PropagationEngine]
	pub fn new(config: PropagationConfig) -> Self {
		let seed_radius = config.target_radius;
		PropagationEngine {
			config,
			seeds: Vec::new(),
			seed_radius,
		}
	}
	/// Get the options
	pub fn get_config(&self) -> &PropagationConfig {
		&self.config
	}
	/// Replace the options, seeds already pinned are untouched
	pub fn set_config(&mut self, config: PropagationConfig) {
		self.config = config;
	}
	/// Target positions currently seeded
	pub fn get_seeds(&self) -> &[Vec2] {
		&self.seeds
	}
	/// Reset every cell of a level to zero
	pub fn clear(
		&self,
		levels: &mut [VectorFieldLevel],
		level: usize,
	) -> Result<(), FlowFieldError> {
		let count = levels.len();
		let field = levels
			.get_mut(level)
			.ok_or(FlowFieldError::LevelOutOfRange { level, count })?;
		field.clear();
		Ok(())
	}
	/// Reset every level to zero
	pub fn clear_all(&self, levels: &mut [VectorFieldLevel]) {
		for field in levels.iter_mut() {
			field.clear();
		}
	}
	/// Record the target positions and pin the navigable cells within
	/// `radius` of each, on every level, to a unit vector pointing away from
	/// the target. The cell containing the target is always pinned when it
	/// is navigable. Returns the number of cells pinned on level `0`
	pub fn set_targets(
		&mut self,
		levels: &mut [VectorFieldLevel],
		hierarchy: &NavigabilityHierarchy,
		positions: &[Vec2],
		radius: f32,
	) -> usize {
		self.seeds = positions.to_vec();
		self.seed_radius = radius.max(0.0);
		self.reseed(levels, hierarchy)
	}
	/// Pin the recorded seeds again, used after levels have been cleared or
	/// reallocated. Returns the number of cells pinned on level `0`
	pub fn reseed(
		&self,
		levels: &mut [VectorFieldLevel],
		hierarchy: &NavigabilityHierarchy,
	) -> usize {
		let dims = hierarchy.get_map_dimensions();
		let mut base_pinned = 0;
		for (level, (field, nav)) in levels
			.iter_mut()
			.zip(hierarchy.get_levels().iter())
			.enumerate()
		{
			let pinned = seed_level(field, nav, dims, level, &self.seeds, self.seed_radius);
			if level == 0 {
				base_pinned = pinned;
			}
		}
		debug!(
			"Seeded {} targets, {} cells pinned at full resolution",
			self.seeds.len(),
			base_pinned
		);
		base_pinned
	}
	/// Run `stages` relaxation sweeps over a whole level
	pub fn propagate(
		&self,
		field: &mut VectorFieldLevel,
		nav: &NavigabilityLevel,
		falloff_rate: f32,
		stages: usize,
	) {
		let (w, h) = field.get_dimensions();
		self.propagate_region(field, nav, CellRegion::whole(w, h), falloff_rate, stages);
	}
	/// Run `stages` relaxation sweeps over the cells of a region, neighbours
	/// outside of the region are read but never written
	pub fn propagate_region(
		&self,
		field: &mut VectorFieldLevel,
		nav: &NavigabilityLevel,
		region: CellRegion,
		falloff_rate: f32,
		stages: usize,
	) {
		if field.get_dimensions() != nav.get_dimensions() {
			error!(
				"Vector level {:?} and navigability level {:?} disagree in size, skipping propagation",
				field.get_dimensions(),
				nav.get_dimensions()
			);
			return;
		}
		let falloff = falloff_rate.clamp(0.0, MAX_PROPAGATED_MAGNITUDE);
		for stage in 0..stages {
			sweep(field, nav, region, stage % 4, falloff);
		}
	}
	/// Blend a whole fine level toward the coarser level above it
	#[allow(clippy::too_many_arguments)]
	pub fn blend_levels(
		&self,
		fine: &mut VectorFieldLevel,
		coarse: &VectorFieldLevel,
		nav: &NavigabilityLevel,
		dims: &MapDimensions,
		bias: Option<&BiasField>,
		max_bias: f32,
		blend_factor: f32,
	) {
		let (w, h) = fine.get_dimensions();
		self.blend_region(
			fine,
			coarse,
			nav,
			dims,
			bias,
			max_bias,
			blend_factor,
			CellRegion::whole(w, h),
		);
	}
	/// Linearly interpolate each navigable, non-pinned fine cell of a region
	/// toward the bilinearly resampled coarse level. The interpolation
	/// weight is `blend_factor * (1 - bias / max_bias)` so low-bias areas
	/// lean on the coarse data. Fine cells the relaxation has not reached
	/// yet take the coarse vector outright
	#[allow(clippy::too_many_arguments)]
	pub fn blend_region(
		&self,
		fine: &mut VectorFieldLevel,
		coarse: &VectorFieldLevel,
		nav: &NavigabilityLevel,
		dims: &MapDimensions,
		bias: Option<&BiasField>,
		max_bias: f32,
		blend_factor: f32,
		region: CellRegion,
	) {
		let level = fine.get_level();
		let coarse_level = coarse.get_level();
		let (width, _) = fine.get_dimensions();
		let (min, max) = (region.get_min(), region.get_max());
		for row in min.1..max.1 {
			for column in min.0..max.0 {
				if !nav.is_navigable(column as i64, row as i64) {
					continue;
				}
				let index = row * width + column;
				let current = fine.get_vectors()[index];
				if current.length() > PINNED_MAGNITUDE_THRESHOLD {
					continue;
				}
				let centre = dims.get_cell_centre(FieldCell::new(column, row), level);
				let coarse_vector =
					coarse.sample_bilinear(dims.world_to_continuous(centre, coarse_level));
				if coarse_vector.length_squared() <= ZERO_EPSILON {
					continue;
				}
				let blended = if current.length_squared() <= ZERO_EPSILON {
					coarse_vector
				} else {
					let normalised_bias = match bias {
						Some(field) if max_bias > 0.0 => {
							(field.sample(centre) / max_bias).clamp(0.0, 1.0)
						}
						_ => 0.5,
					};
					let t = (blend_factor * (1.0 - normalised_bias)).clamp(0.0, 1.0);
					current.lerp(coarse_vector, t)
				};
				fine.get_vectors_mut()[index] = blended.clamp_length_max(MAX_PROPAGATED_MAGNITUDE);
			}
		}
	}
	/// Process a region of base level pixels coarse-to-fine, relaxing the
	/// coarsest level first and refining down to `finest_level`, blending
	/// each finer level toward the one above it. Returns the number of cells,
	/// summed over the processed levels, that held no signal before and do
	/// now. Navigable cells never lose their signal so a non-zero count means
	/// the front is still advancing through the region
	#[allow(clippy::too_many_arguments)]
	pub fn process_region(
		&self,
		levels: &mut [VectorFieldLevel],
		hierarchy: &NavigabilityHierarchy,
		bias: Option<&BiasField>,
		max_bias: f32,
		base_region: CellRegion,
		finest_level: usize,
	) -> Result<usize, FlowFieldError> {
		let count = levels.len().min(hierarchy.get_level_count());
		if count == 0 || finest_level >= count {
			return Err(FlowFieldError::LevelOutOfRange {
				level: finest_level,
				count,
			});
		}
		let dims = hierarchy.get_map_dimensions();
		let margin = self.config.region_margin as usize;
		let mut reached = 0;
		for level in (finest_level..count).rev() {
			let nav = &hierarchy.get_levels()[level];
			let (w, h) = nav.get_dimensions();
			let region = base_region.at_level(level, w, h).expand(margin, w, h);
			let before = levels[level].count_non_zero_in(region);
			self.propagate_region(
				&mut levels[level],
				nav,
				region,
				self.config.falloff_rate,
				self.config.stages_per_level,
			);
			if level + 1 < count {
				let (lower, upper) = levels.split_at_mut(level + 1);
				self.blend_region(
					&mut lower[level],
					&upper[0],
					nav,
					dims,
					bias,
					max_bias,
					self.config.blend_factor,
					region,
				);
			}
			reached += levels[level]
				.count_non_zero_in(region)
				.saturating_sub(before);
		}
		Ok(reached)
	}
}

/// Pin the navigable cells of one level within `radius` of each target,
/// returns the number of cells pinned
fn seed_level(
	field: &mut VectorFieldLevel,
	nav: &NavigabilityLevel,
	dims: &MapDimensions,
	level: usize,
	targets: &[Vec2],
	radius: f32,
) -> usize {
	let mut pinned = 0;
	for target in targets.iter() {
		let nearest = dims.world_to_cell_clamped(*target, level);
		let lo = dims.world_to_cell_clamped(*target - Vec2::splat(radius), level);
		let hi = dims.world_to_cell_clamped(*target + Vec2::splat(radius), level);
		let mut seeded = false;
		for row in lo.get_row()..=hi.get_row() {
			for column in lo.get_column()..=hi.get_column() {
				let cell = FieldCell::new(column, row);
				if !nav.get_field_cell_value(cell) {
					continue;
				}
				let centre = dims.get_cell_centre(cell, level);
				if cell == nearest || centre.distance(*target) <= radius {
					let mut direction = normalise_or_zero(centre - *target);
					if direction == Vec2::ZERO {
						direction = Vec2::Y;
					}
					field.set_field_cell_value(direction, cell);
					pinned += 1;
					seeded = true;
				}
			}
		}
		if !seeded {
			if level == 0 {
				warn!("Target {:?} has no navigable cell within its radius", target);
			} else {
				trace!(
					"Target {:?} has no navigable cell on level {}",
					target,
					level
				);
			}
		}
	}
	pinned
}

/// One in-place pass over a region in the given raster order
fn sweep(
	field: &mut VectorFieldLevel,
	nav: &NavigabilityLevel,
	region: CellRegion,
	order: usize,
	falloff: f32,
) {
	let (width, height) = field.get_dimensions();
	let (min, max) = (region.get_min(), region.get_max());
	let max = (max.0.min(width), max.1.min(height));
	if min.0 >= max.0 || min.1 >= max.1 {
		return;
	}
	let (columns_descending, rows_descending) = match order {
		0 => (false, false),
		1 => (true, true),
		2 => (true, false),
		_ => (false, true),
	};
	// unit step from each neighbour toward the receiving cell
	let mut steps = [Vec2::ZERO; 8];
	for (i, ordinal) in Ordinal::RING.iter().enumerate() {
		let (dc, dr) = ordinal.offset();
		steps[i] = Vec2::new(-dc as f32, -dr as f32).normalize();
	}
	let vectors = field.get_vectors_mut();
	let row_count = max.1 - min.1;
	let column_count = max.0 - min.0;
	for ri in 0..row_count {
		let row = if rows_descending {
			max.1 - 1 - ri
		} else {
			min.1 + ri
		};
		for ci in 0..column_count {
			let column = if columns_descending {
				max.0 - 1 - ci
			} else {
				min.0 + ci
			};
			relax_cell(vectors, nav, width, column, row, &steps, falloff);
		}
	}
}

/// Recompute a single cell from its neighbours
fn relax_cell(
	vectors: &mut [Vec2],
	nav: &NavigabilityLevel,
	width: usize,
	column: usize,
	row: usize,
	steps: &[Vec2; 8],
	falloff: f32,
) {
	let index = row * width + column;
	let (c, r) = (column as i64, row as i64);
	if !nav.is_navigable(c, r) {
		vectors[index] = Vec2::ZERO;
		return;
	}
	if vectors[index].length() > PINNED_MAGNITUDE_THRESHOLD {
		return;
	}
	let mut weight_sum = 0.0;
	let mut magnitude_sum = 0.0;
	let mut direction_sum = Vec2::ZERO;
	for (i, ordinal) in Ordinal::RING.iter().enumerate() {
		let (dc, dr) = ordinal.offset();
		let (nc, nr) = (c + dc as i64, r + dr as i64);
		if !nav.is_navigable(nc, nr) {
			continue;
		}
		// no squeezing diagonally between two blocked cells
		if !ordinal.is_orthogonal()
			&& !nav.is_navigable(c + dc as i64, r)
			&& !nav.is_navigable(c, r + dr as i64)
		{
			continue;
		}
		let neighbour = vectors[nr as usize * width + nc as usize];
		let magnitude = neighbour.length();
		if magnitude * magnitude <= ZERO_EPSILON {
			continue;
		}
		let step = steps[i];
		let (weight, contribution) = if magnitude > PINNED_MAGNITUDE_THRESHOLD {
			// pinned cells radiate in every direction
			(magnitude, step)
		} else {
			let direction = neighbour / magnitude;
			let alignment = direction.dot(step);
			if alignment <= 0.0 {
				continue;
			}
			(
				magnitude * alignment,
				normalise_or_zero(direction + step),
			)
		};
		weight_sum += weight;
		magnitude_sum += weight * magnitude;
		direction_sum += contribution * weight;
	}
	if weight_sum <= ZERO_EPSILON {
		return;
	}
	let direction = normalise_or_zero(direction_sum);
	if direction == Vec2::ZERO {
		return;
	}
	let magnitude = (falloff * magnitude_sum / weight_sum).min(MAX_PROPAGATED_MAGNITUDE);
	vectors[index] = direction * magnitude;
}
