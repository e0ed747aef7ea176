//! Named options controlling every stage of the vector field pipeline.
//!
//! Each component receives its own section of the [FlowFieldConfig] when it
//! is constructed. All options carry defaults tuned for a `12000x6000` world
//! with up to 1000 moving actors
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Smallest permitted chunk edge in pixels
pub const MIN_CHUNK_SIZE: u32 = 16;
/// Largest number of resolution levels a hierarchy may hold
pub const MAX_LEVEL_COUNT: usize = 16;

/// Top level configuration of the vector field
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize, serde::Serialize),
	serde(default)
)]
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct FlowFieldConfig {
	/// Pixel width of the full resolution navigability level
	pub base_width: u32,
	/// Pixel height of the full resolution navigability level
	pub base_height: u32,
	/// Number of resolution levels, level `0` being full resolution and each
	/// subsequent level halving the dimensions
	pub level_count: usize,
	/// World units added to each side of the geometry extent when the bounds
	/// are derived from the geometry
	pub bounds_padding: f32,
	/// Junction detection and importance field
	pub bias: BiasConfig,
	/// Relaxation of the direction field
	pub propagation: PropagationConfig,
	/// Frame budgeted chunk processing
	pub scheduler: SchedulerConfig,
	/// Device buffers and host mirrors
	pub storage: StorageConfig,
	/// Agent facing query behaviour
	pub query: QueryConfig,
}

impl Default for FlowFieldConfig {
	fn default() -> Self {
		FlowFieldConfig {
			base_width: 12000,
			base_height: 6000,
			level_count: 5,
			bounds_padding: 1.0,
			bias: BiasConfig::default(),
			propagation: PropagationConfig::default(),
			scheduler: SchedulerConfig::default(),
			storage: StorageConfig::default(),
			query: QueryConfig::default(),
		}
	}
}

impl FlowFieldConfig {
	/// Ensure every option sits inside its permitted range
	pub fn validate(&self) -> Result<(), FlowFieldError> {
		if self.base_width == 0 || self.base_height == 0 {
			return Err(FlowFieldError::InvalidConfig(format!(
				"base resolution must be non-zero, found {}x{}",
				self.base_width, self.base_height
			)));
		}
		if self.level_count == 0 || self.level_count > MAX_LEVEL_COUNT {
			return Err(FlowFieldError::InvalidConfig(format!(
				"level_count must be within 1..={}, found {}",
				MAX_LEVEL_COUNT, self.level_count
			)));
		}
		if !self.bounds_padding.is_finite() || self.bounds_padding < 0.0 {
			return Err(FlowFieldError::InvalidConfig(
				"bounds_padding must be a finite non-negative value".to_string(),
			));
		}
		self.bias.validate()?;
		self.propagation.validate()?;
		self.scheduler.validate()?;
		self.storage.validate()?;
		self.query.validate()
	}
	/// Index of the coarsest resolution level
	pub fn max_level(&self) -> usize {
		self.level_count.saturating_sub(1)
	}
	/// From a `ron` file generate the [FlowFieldConfig]
	#[cfg(feature = "ron")]
	pub fn from_ron(path: &str) -> Result<Self, FlowFieldError> {
		let file = std::fs::File::open(path)?;
		let config: FlowFieldConfig = ron::de::from_reader(file)
			.map_err(|e| FlowFieldError::Deserialise(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}
}

/// Shape of the radial falloff applied to each bias influence. The input is
/// the distance to the influence divided by the bias radius, every curve is
/// non-increasing over `[0, 1]` and reaches zero at `1`
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
pub enum FalloffCurve {
	/// `1 - t`
	Linear,
	/// `(1 - t)^2`
	Quadratic,
	/// Hermite smoothstep of `1 - t`
	Smoothstep,
	/// Gaussian-like `exp(-4t^2)` rescaled to reach zero at the radius
	Exponential,
}

impl FalloffCurve {
	/// Evaluate the curve at a normalised distance `t`
	pub fn evaluate(&self, t: f32) -> f32 {
		let t = t.clamp(0.0, 1.0);
		match self {
			FalloffCurve::Linear => 1.0 - t,
			FalloffCurve::Quadratic => (1.0 - t) * (1.0 - t),
			FalloffCurve::Smoothstep => {
				let s = 1.0 - t;
				s * s * (3.0 - 2.0 * s)
			}
			FalloffCurve::Exponential => {
				let floor = (-4.0_f32).exp();
				(((-4.0 * t * t).exp()) - floor) / (1.0 - floor)
			}
		}
	}
}

/// Options of the [BiasEstimator]
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize, serde::Serialize),
	serde(default)
)]
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct BiasConfig {
	/// Minimum combined score for a pixel to be kept as a junction
	pub junction_threshold: f32,
	/// Upper limit on the number of junctions retained, highest scores win
	pub max_junctions: usize,
	/// World-space radius of influence of each junction and target
	pub bias_radius: f32,
	/// Ceiling of any bias value. Kept equal to the coarsest level index so
	/// that a bias value reads directly as a number of levels of refinement
	pub max_bias_strength: f32,
	/// Strength given to newly set targets
	pub target_strength: f32,
	/// Radial falloff of every influence
	pub falloff_curve: FalloffCurve,
}

impl Default for BiasConfig {
	fn default() -> Self {
		BiasConfig {
			junction_threshold: 0.5,
			max_junctions: 50,
			bias_radius: 600.0,
			max_bias_strength: 4.0,
			target_strength: 4.0,
			falloff_curve: FalloffCurve::Smoothstep,
		}
	}
}

impl BiasConfig {
	/// Range checks
	pub fn validate(&self) -> Result<(), FlowFieldError> {
		if !(0.0..=1.0).contains(&self.junction_threshold) {
			return Err(FlowFieldError::InvalidConfig(format!(
				"junction_threshold must be within [0, 1], found {}",
				self.junction_threshold
			)));
		}
		if self.bias_radius <= 0.0 || !self.bias_radius.is_finite() {
			return Err(FlowFieldError::InvalidConfig(
				"bias_radius must be positive".to_string(),
			));
		}
		if self.max_bias_strength <= 0.0 || !self.max_bias_strength.is_finite() {
			return Err(FlowFieldError::InvalidConfig(
				"max_bias_strength must be positive".to_string(),
			));
		}
		if self.target_strength < 0.0 || !self.target_strength.is_finite() {
			return Err(FlowFieldError::InvalidConfig(
				"target_strength must be non-negative".to_string(),
			));
		}
		Ok(())
	}
}

/// Options of the [PropagationEngine]
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize, serde::Serialize),
	serde(default)
)]
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct PropagationConfig {
	/// Strength retained by each cell relative to the cells feeding it, must
	/// be below `1`
	pub falloff_rate: f32,
	/// Number of relaxation sweeps run on a level each time it is processed
	pub stages_per_level: usize,
	/// World-space radius around a target within which cells are pinned
	pub target_radius: f32,
	/// How strongly low-bias areas lean on the coarser level when blending
	pub blend_factor: f32,
	/// Cells of neighbouring chunks re-relaxed alongside a chunk so that
	/// signal crosses chunk seams
	pub region_margin: u32,
}

impl Default for PropagationConfig {
	fn default() -> Self {
		PropagationConfig {
			falloff_rate: 0.98,
			stages_per_level: 8,
			target_radius: 50.0,
			blend_factor: 0.5,
			region_margin: 2,
		}
	}
}

impl PropagationConfig {
	/// Range checks
	pub fn validate(&self) -> Result<(), FlowFieldError> {
		if !(self.falloff_rate > 0.0 && self.falloff_rate < 1.0) {
			return Err(FlowFieldError::InvalidConfig(format!(
				"falloff_rate must be within (0, 1), found {}",
				self.falloff_rate
			)));
		}
		if self.stages_per_level == 0 {
			return Err(FlowFieldError::InvalidConfig(
				"stages_per_level must be at least 1".to_string(),
			));
		}
		if self.target_radius < 0.0 || !self.target_radius.is_finite() {
			return Err(FlowFieldError::InvalidConfig(
				"target_radius must be non-negative".to_string(),
			));
		}
		if !(0.0..=1.0).contains(&self.blend_factor) {
			return Err(FlowFieldError::InvalidConfig(format!(
				"blend_factor must be within [0, 1], found {}",
				self.blend_factor
			)));
		}
		Ok(())
	}
}

/// Weights of the chunk priority formula
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize, serde::Serialize),
	serde(default)
)]
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct PriorityWeights {
	/// Weight of the summed importance of agents inside a chunk
	pub agent_density: f32,
	/// Weight of the inverse distance to the closest target
	pub target_proximity: f32,
	/// Weight of the seconds since the chunk was last processed
	pub staleness: f32,
	/// Weight of the normalised bias at the chunk centre
	pub bias: f32,
}

impl Default for PriorityWeights {
	fn default() -> Self {
		PriorityWeights {
			agent_density: 1.0,
			target_proximity: 4.0,
			staleness: 0.5,
			bias: 2.0,
		}
	}
}

/// Options of the [ChunkScheduler]
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize, serde::Serialize),
	serde(default)
)]
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct SchedulerConfig {
	/// Edge length of a chunk in base-level pixels
	pub chunk_size: u32,
	/// Wall time each tick may spend processing chunks
	pub frame_budget_ms: f64,
	/// Chunk cap used before any adaptation has happened
	pub initial_chunks_per_tick: usize,
	/// Ceiling of the adaptive chunk cap
	pub max_chunks_per_tick: usize,
	/// Largest change applied to the chunk cap after a single tick
	pub cap_adjust_step: usize,
	/// Number of ticks between full priority re-sorts of the queue
	pub resort_interval_ticks: u32,
	/// World-space radius around each new target whose chunks are dirtied
	pub target_dirty_radius: f32,
	/// Staleness stops growing beyond this many seconds
	pub max_staleness_secs: f32,
	/// Number of per-chunk timings kept for the rolling average
	pub timing_window: usize,
	/// Priority formula weights
	pub weights: PriorityWeights,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		SchedulerConfig {
			chunk_size: 256,
			frame_budget_ms: 8.0,
			initial_chunks_per_tick: 4,
			max_chunks_per_tick: 32,
			cap_adjust_step: 1,
			resort_interval_ticks: 30,
			target_dirty_radius: 512.0,
			max_staleness_secs: 10.0,
			timing_window: 32,
			weights: PriorityWeights::default(),
		}
	}
}

impl SchedulerConfig {
	/// Range checks
	pub fn validate(&self) -> Result<(), FlowFieldError> {
		if self.frame_budget_ms <= 0.0 || !self.frame_budget_ms.is_finite() {
			return Err(FlowFieldError::InvalidConfig(
				"frame_budget_ms must be positive".to_string(),
			));
		}
		if self.max_chunks_per_tick == 0 || self.initial_chunks_per_tick == 0 {
			return Err(FlowFieldError::InvalidConfig(
				"chunks per tick must be at least 1".to_string(),
			));
		}
		if self.initial_chunks_per_tick > self.max_chunks_per_tick {
			return Err(FlowFieldError::InvalidConfig(format!(
				"initial_chunks_per_tick {} exceeds max_chunks_per_tick {}",
				self.initial_chunks_per_tick, self.max_chunks_per_tick
			)));
		}
		if self.cap_adjust_step == 0 {
			return Err(FlowFieldError::InvalidConfig(
				"cap_adjust_step must be at least 1".to_string(),
			));
		}
		if self.resort_interval_ticks == 0 || self.timing_window == 0 {
			return Err(FlowFieldError::InvalidConfig(
				"resort_interval_ticks and timing_window must be at least 1".to_string(),
			));
		}
		if self.max_staleness_secs <= 0.0 {
			return Err(FlowFieldError::InvalidConfig(
				"max_staleness_secs must be positive".to_string(),
			));
		}
		Ok(())
	}
}

/// Options of the [FieldStorage]
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize, serde::Serialize),
	serde(default)
)]
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct StorageConfig {
	/// Mirror every level into the host cache, otherwise only level `0`
	pub cache_all_levels: bool,
	/// Seconds between periodic refreshes of a dirty host cache
	pub cache_update_interval_secs: f32,
}

impl Default for StorageConfig {
	fn default() -> Self {
		StorageConfig {
			cache_all_levels: true,
			cache_update_interval_secs: 0.5,
		}
	}
}

impl StorageConfig {
	/// Range checks
	pub fn validate(&self) -> Result<(), FlowFieldError> {
		if self.cache_update_interval_secs < 0.0 || !self.cache_update_interval_secs.is_finite() {
			return Err(FlowFieldError::InvalidConfig(
				"cache_update_interval_secs must be non-negative".to_string(),
			));
		}
		Ok(())
	}
}

/// Options of the [FlowFieldQuery]
#[cfg_attr(
	feature = "serde",
	derive(serde::Deserialize, serde::Serialize),
	serde(default)
)]
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct QueryConfig {
	/// Enable the short-lived result cache keyed by quantised position
	pub result_cache_enabled: bool,
	/// World-space size of a quantisation step for the result cache
	pub result_cache_quantisation: f32,
	/// Seconds between clears of the result cache
	pub result_cache_clear_interval_secs: f32,
	/// Upper limit of steps taken when walking the field for a distance
	pub max_walk_iterations: usize,
}

impl Default for QueryConfig {
	fn default() -> Self {
		QueryConfig {
			result_cache_enabled: true,
			result_cache_quantisation: 8.0,
			result_cache_clear_interval_secs: 0.1,
			max_walk_iterations: 2048,
		}
	}
}

impl QueryConfig {
	/// Range checks
	pub fn validate(&self) -> Result<(), FlowFieldError> {
		if self.result_cache_quantisation <= 0.0 || !self.result_cache_quantisation.is_finite() {
			return Err(FlowFieldError::InvalidConfig(
				"result_cache_quantisation must be positive".to_string(),
			));
		}
		if self.max_walk_iterations == 0 {
			return Err(FlowFieldError::InvalidConfig(
				"max_walk_iterations must be at least 1".to_string(),
			));
		}
		Ok(())
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn default_is_valid() {
		let config = FlowFieldConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(4, config.max_level());
	}
	#[test]
	fn reject_falloff_of_one() {
		let mut config = FlowFieldConfig::default();
		config.propagation.falloff_rate = 1.0;
		assert!(matches!(
			config.validate(),
			Err(FlowFieldError::InvalidConfig(_))
		));
	}
	#[test]
	fn reject_zero_levels() {
		let config = FlowFieldConfig {
			level_count: 0,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}
	#[test]
	fn reject_inverted_chunk_caps() {
		let mut config = FlowFieldConfig::default();
		config.scheduler.initial_chunks_per_tick = 64;
		config.scheduler.max_chunks_per_tick = 8;
		assert!(config.validate().is_err());
	}
	#[test]
	fn falloff_curves_are_non_increasing() {
		let curves = [
			FalloffCurve::Linear,
			FalloffCurve::Quadratic,
			FalloffCurve::Smoothstep,
			FalloffCurve::Exponential,
		];
		for curve in curves.iter() {
			assert!((curve.evaluate(0.0) - 1.0).abs() < 1e-5);
			assert!(curve.evaluate(1.0).abs() < 1e-5);
			let mut previous = curve.evaluate(0.0);
			for step in 1..=100 {
				let value = curve.evaluate(step as f32 / 100.0);
				assert!(value <= previous + 1e-6, "{:?} rose at step {}", curve, step);
				previous = value;
			}
		}
	}
}
