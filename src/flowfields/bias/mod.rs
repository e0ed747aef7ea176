//! The resolution bias estimator decides how much detail each part of the
//! world deserves.
//!
//! Junctions detected on the base level and the currently active targets
//! each radiate an influence which decays with distance according to a
//! [FalloffCurve]. The [BiasField] stores, per cell, the largest influence
//! reaching it. Changing the targets or junctions marks the field dirty and
//! it is lazily rebuilt the next time it is sampled
//!

pub mod junctions;

use crate::prelude::*;
use bevy::prelude::*;

/// Map a bias value and an importance onto a resolution level, the product
/// of the normalised bias and the importance is split into `max_level + 1`
/// equal bands, the top band selecting full resolution and the bottom band
/// the coarsest level
pub fn select_resolution_level(
	bias: f32,
	max_bias: f32,
	importance: f32,
	max_level: usize,
) -> usize {
	if max_bias <= 0.0 || !bias.is_finite() || !importance.is_finite() {
		return max_level;
	}
	let detail = ((bias / max_bias) * importance).clamp(0.0, 1.0);
	let level = ((1.0 - detail) * (max_level + 1) as f32).floor() as usize;
	level.min(max_level)
}

/// A position actors are drawn toward
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct ActiveTarget {
	/// Identifier handed out when the target was added
	id: u32,
	/// World-space position
	position: Vec2,
	/// Bias strength radiated by the target
	strength: f32,
	/// Inactive targets are remembered but radiate nothing and seed nothing
	active: bool,
}

impl ActiveTarget {
	/// Identifier of the target
	pub fn get_id(&self) -> u32 {
		self.id
	}
	/// World-space position
	pub fn get_position(&self) -> Vec2 {
		self.position
	}
	/// Bias strength
	pub fn get_strength(&self) -> f32 {
		self.strength
	}
	/// Is the target active
	pub fn is_active(&self) -> bool {
		self.active
	}
}

/// Owns the junctions, the target set and the lazily generated [BiasField]
#[derive(Clone, Debug)]
pub struct BiasEstimator {
	/// Detection and falloff options
	config: BiasConfig,
	/// World bounds the field covers
	dimensions: MapDimensions,
	/// Junctions of the current navigability hierarchy
	junctions: Vec<JunctionPoint>,
	/// Known targets
	targets: Vec<ActiveTarget>,
	/// Identifier given to the next target
	next_target_id: u32,
	/// Most recently generated field
	field: Option<BiasField>,
	/// The field no longer reflects the junctions or targets
	dirty: bool,
}

impl BiasEstimator {
	/// Create a new instance of [BiasEstimator] with no junctions or targets
	pub fn new(config: BiasConfig, dimensions: MapDimensions) -> Self {
		BiasEstimator {
			config,
			dimensions,
			junctions: Vec::new(),
			targets: Vec::new(),
			next_target_id: 0,
			field: None,
			dirty: true,
		}
	}
	/// Get the options
	pub fn get_config(&self) -> &BiasConfig {
		&self.config
	}
	/// Ceiling of any bias value
	pub fn get_max_bias_strength(&self) -> f32 {
		self.config.max_bias_strength
	}
	/// Scan the base level of a hierarchy for junctions, replacing any
	/// previously detected
	pub fn detect_junctions(&mut self, hierarchy: &NavigabilityHierarchy) -> &[JunctionPoint] {
		let base = &hierarchy.get_levels()[0];
		self.junctions = detect_junctions(
			base,
			hierarchy.get_map_dimensions(),
			self.config.junction_threshold,
			self.config.max_junctions,
		);
		self.dirty = true;
		&self.junctions
	}
	/// Replace the junctions directly
	pub fn set_junctions(&mut self, junctions: Vec<JunctionPoint>) {
		self.junctions = junctions;
		self.dirty = true;
	}
	/// Get the junctions
	pub fn get_junctions(&self) -> &[JunctionPoint] {
		&self.junctions
	}
	/// Replace the whole target set, every new target is active and radiates
	/// the configured target strength. Returns the identifiers of the new
	/// targets in the order given
	pub fn set_targets(&mut self, positions: &[Vec2]) -> Vec<u32> {
		self.targets.clear();
		let strength = self.config.target_strength;
		let ids = positions
			.iter()
			.map(|p| self.add_target(*p, strength))
			.collect();
		self.dirty = true;
		ids
	}
	/// Add a single active target, returning its identifier
	pub fn add_target(&mut self, position: Vec2, strength: f32) -> u32 {
		let id = self.next_target_id;
		self.next_target_id = self.next_target_id.wrapping_add(1);
		self.targets.push(ActiveTarget {
			id,
			position,
			strength: strength.clamp(0.0, self.config.max_bias_strength),
			active: true,
		});
		self.dirty = true;
		id
	}
	/// Restore a deactivated target, returns `false` if the target is unknown
	pub fn activate_target(&mut self, id: u32) -> bool {
		self.set_target_active(id, true)
	}
	/// Silence a target without forgetting it, returns `false` if the target
	/// is unknown
	pub fn deactivate_target(&mut self, id: u32) -> bool {
		self.set_target_active(id, false)
	}
	/// Toggle the activity of a target
	fn set_target_active(&mut self, id: u32, active: bool) -> bool {
		match self.targets.iter_mut().find(|t| t.id == id) {
			Some(target) => {
				if target.active != active {
					target.active = active;
					self.dirty = true;
				}
				true
			}
			None => {
				warn!("Target {} is unknown, cannot change its activity", id);
				false
			}
		}
	}
	/// Get every known target
	pub fn get_targets(&self) -> &[ActiveTarget] {
		&self.targets
	}
	/// Positions of the active targets
	pub fn get_active_target_positions(&self) -> Vec<Vec2> {
		self.targets
			.iter()
			.filter(|t| t.active)
			.map(|t| t.position)
			.collect()
	}
	/// Does the field need regenerating
	pub fn is_dirty(&self) -> bool {
		self.dirty || self.field.is_none()
	}
	/// Force regeneration on the next sample
	pub fn mark_dirty(&mut self) {
		self.dirty = true;
	}
	/// Replace the world bounds, used after the navigability changes
	pub fn set_dimensions(&mut self, dimensions: MapDimensions) {
		self.dimensions = dimensions;
		self.field = None;
		self.dirty = true;
	}
	/// Rebuild the field from the junctions and active targets. Each cell
	/// holds the maximum over every influence within the bias radius of
	/// `strength * falloff(distance / radius)`
	pub fn generate_bias_field(&mut self) -> &BiasField {
		let mut field = match self.field.take() {
			Some(mut existing) => {
				existing.clear();
				existing
			}
			None => BiasField::new(&self.dimensions),
		};
		let max = self.config.max_bias_strength;
		let influences = self
			.junctions
			.iter()
			.map(|j| (j.get_position(), j.get_score() * max))
			.chain(
				self.targets
					.iter()
					.filter(|t| t.active)
					.map(|t| (t.position, t.strength)),
			);
		let radius = self.config.bias_radius;
		let curve = self.config.falloff_curve;
		let mut influence_count = 0;
		for (position, strength) in influences {
			influence_count += 1;
			let ((x0, y0), (x1, y1)) = field.get_cell_range(position, radius);
			for row in y0..=y1 {
				for column in x0..=x1 {
					let cell = FieldCell::new(column, row);
					let distance = field.get_cell_centre(cell).distance(position);
					if distance <= radius {
						let value = (strength * curve.evaluate(distance / radius)).min(max);
						field.raise(cell, value);
					}
				}
			}
		}
		debug!(
			"Generated bias field from {} influences, peak {}",
			influence_count,
			field.get_max_value()
		);
		self.dirty = false;
		self.field.insert(field)
	}
	/// Get the most recently generated field, it may be stale
	pub fn get_bias_field(&self) -> Option<&BiasField> {
		self.field.as_ref()
	}
	/// Sample the bias at a world position, regenerating the field first if
	/// it is missing or dirty
	pub fn sample_bias(&mut self, position: Vec2) -> f32 {
		if self.is_dirty() {
			self.generate_bias_field();
		}
		self.sample_bias_cached(position)
	}
	/// Sample whatever field currently exists without regenerating. With no
	/// field at all a mid-range bias is returned
	pub fn sample_bias_cached(&self, position: Vec2) -> f32 {
		match &self.field {
			Some(field) => field.sample(position),
			None => {
				warn!("Bias sampled before any field was generated, using a mid-range default");
				self.config.max_bias_strength * 0.5
			}
		}
	}
	/// Sampled bias scaled into `[0, 1]`
	pub fn sample_normalised_bias(&mut self, position: Vec2) -> f32 {
		(self.sample_bias(position) / self.config.max_bias_strength).clamp(0.0, 1.0)
	}
}
