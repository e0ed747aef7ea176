//! The hot path agents call every frame.
//!
//! A query samples the bias at the agent's position, combines it with the
//! agent's importance to choose a resolution level and then samples the
//! host mirror of that level. Where the chosen level holds no guidance yet
//! the next coarser level is tried, so agents far from freshly processed
//! chunks still move in roughly the right direction.
//!
//! Stored vectors point away from targets, the query negates them so the
//! returned direction leads toward a target
//!

use std::collections::{BTreeMap, BTreeSet};
use std::f32::consts::TAU;

use crate::prelude::*;
use bevy::prelude::*;

/// Result of a single direction query
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect)]
pub struct FlowSample {
	/// Unit direction toward a target, or zero when there is no guidance
	pub direction: Vec2,
	/// Resolution level the direction was read from
	pub level: usize,
}

/// Short lived memory of query results keyed by quantised position and
/// importance, cleared wholesale on a fixed interval
#[derive(Clone, Debug)]
pub struct QueryCache {
	/// Is the cache consulted at all
	enabled: bool,
	/// Edge length in world units of the squares positions are snapped to
	quantisation: f32,
	/// Seconds between clears
	clear_interval: f32,
	/// Seconds since the last clear
	since_clear: f32,
	/// Remembered results
	entries: BTreeMap<(i32, i32, u32), FlowSample>,
	/// Lookups answered from the cache
	hits: u64,
	/// Lookups that had to sample the field
	misses: u64,
}

impl Default for QueryCache {
	fn default() -> Self {
		QueryCache::new(&QueryConfig::default())
	}
}

impl QueryCache {
	/// Create an empty cache
	pub fn new(config: &QueryConfig) -> Self {
		QueryCache {
			enabled: config.result_cache_enabled,
			quantisation: config.result_cache_quantisation.max(f32::EPSILON),
			clear_interval: config.result_cache_clear_interval_secs,
			since_clear: 0.0,
			entries: BTreeMap::new(),
			hits: 0,
			misses: 0,
		}
	}
	/// Key of a position and importance
	fn key(&self, position: Vec2, importance: f32) -> (i32, i32, u32) {
		let snapped = (position / self.quantisation).floor();
		(snapped.x as i32, snapped.y as i32, importance.to_bits())
	}
	/// Advance the clear timer
	pub fn update(&mut self, delta_secs: f32) {
		self.since_clear += delta_secs;
		if self.since_clear >= self.clear_interval {
			self.since_clear = 0.0;
			self.entries.clear();
		}
	}
	/// Forget every result
	pub fn clear(&mut self) {
		self.entries.clear();
	}
	/// Number of remembered results
	pub fn len(&self) -> usize {
		self.entries.len()
	}
	/// Is nothing remembered
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
	/// `(hits, misses)` since creation
	pub fn get_statistics(&self) -> (u64, u64) {
		(self.hits, self.misses)
	}
}

/// Read-only view over the engine answering agent queries. The only state
/// it mutates is the [QueryCache]
pub struct FlowFieldQuery<'a> {
	/// Query options
	config: &'a QueryConfig,
	/// Navigability of every level
	hierarchy: &'a NavigabilityHierarchy,
	/// Vector fields and their mirrors
	storage: &'a FieldStorage,
	/// Bias field and active targets
	bias: &'a BiasEstimator,
	/// Result cache
	cache: &'a mut QueryCache,
}

impl<'a> FlowFieldQuery<'a> {
	/// Create a view over the collaborators a query reads from
	pub fn new(
		config: &'a QueryConfig,
		hierarchy: &'a NavigabilityHierarchy,
		storage: &'a FieldStorage,
		bias: &'a BiasEstimator,
		cache: &'a mut QueryCache,
	) -> Self {
		FlowFieldQuery {
			config,
			hierarchy,
			storage,
			bias,
			cache,
		}
	}
	/// Direction toward a target at a world position for an agent of
	/// typical importance
	pub fn get_flow_direction(&mut self, position: Vec2) -> Vec2 {
		self.get_flow_direction_with_level(position, 1.0).direction
	}
	/// Direction toward a target at a world position along with the level it
	/// was read from
	pub fn get_flow_direction_with_level(&mut self, position: Vec2, importance: f32) -> FlowSample {
		let max_level = self.storage.get_level_count().saturating_sub(1);
		let max_bias = self.bias.get_max_bias_strength();
		self.sample_cached(position, importance, max_level, max_bias)
	}
	/// Direction for many agents at once, `results[i]` receives the
	/// direction for `positions[i]`. Importances default to `1.0` when not
	/// supplied or when shorter than `positions`
	pub fn get_flow_direction_batch(
		&mut self,
		positions: &[Vec2],
		results: &mut [Vec2],
		importances: Option<&[f32]>,
	) -> Result<(), FlowFieldError> {
		if positions.len() != results.len() {
			return Err(FlowFieldError::BatchLengthMismatch {
				positions: positions.len(),
				results: results.len(),
			});
		}
		if let Some(importances) = importances {
			if importances.len() < positions.len() {
				warn!(
					"{} importances supplied for {} positions, the rest default to 1.0",
					importances.len(),
					positions.len()
				);
			}
		}
		let max_level = self.storage.get_level_count().saturating_sub(1);
		let max_bias = self.bias.get_max_bias_strength();
		for (i, (position, result)) in positions.iter().zip(results.iter_mut()).enumerate() {
			let importance = importances
				.and_then(|imp| imp.get(i))
				.copied()
				.unwrap_or(1.0);
			*result = self
				.sample_cached(*position, importance, max_level, max_bias)
				.direction;
		}
		Ok(())
	}
	/// Look the query up in the cache, sampling the field on a miss
	fn sample_cached(
		&mut self,
		position: Vec2,
		importance: f32,
		max_level: usize,
		max_bias: f32,
	) -> FlowSample {
		if !self.cache.enabled {
			return self.sample(position, importance, max_level, max_bias);
		}
		let key = self.cache.key(position, importance);
		if let Some(hit) = self.cache.entries.get(&key) {
			self.cache.hits += 1;
			return *hit;
		}
		self.cache.misses += 1;
		let sample = self.sample(position, importance, max_level, max_bias);
		self.cache.entries.insert(key, sample);
		sample
	}
	/// Choose a level from the bias and importance and sample it, falling
	/// back to coarser levels while the sample is zero
	fn sample(&self, position: Vec2, importance: f32, max_level: usize, max_bias: f32) -> FlowSample {
		let bias = self.bias.sample_bias_cached(position);
		let chosen = select_resolution_level(bias, max_bias, importance, max_level);
		for level in chosen..=max_level {
			let direction = self.storage.sample(position, level);
			if direction != Vec2::ZERO {
				return FlowSample {
					direction: -direction,
					level,
				};
			}
		}
		FlowSample {
			direction: Vec2::ZERO,
			level: chosen,
		}
	}
	/// Is the base level pixel under a world position navigable, positions
	/// outside of the world are not
	pub fn is_position_navigable(&self, position: Vec2) -> bool {
		self.hierarchy.is_navigable(position)
	}
	/// Search rings of growing radius around a position for a navigable
	/// point. The position itself is returned when it is navigable or when
	/// nothing navigable lies within `max_search_distance`
	pub fn get_nearest_navigable_position(&self, position: Vec2, max_search_distance: f32) -> Vec2 {
		if self.is_position_navigable(position) {
			return position;
		}
		let cell = self.hierarchy.get_map_dimensions().get_cell_size(0);
		let step = cell.x.min(cell.y);
		if step <= 0.0 || !max_search_distance.is_finite() {
			return position;
		}
		let rings = (max_search_distance.max(0.0) / step).ceil() as usize;
		for ring in 1..=rings {
			let radius = (ring as f32 * step).min(max_search_distance);
			let samples = ((TAU * radius / step).ceil() as usize).max(8);
			for i in 0..samples {
				let candidate = position + Vec2::from_angle(i as f32 / samples as f32 * TAU) * radius;
				if self.is_position_navigable(candidate) {
					return candidate;
				}
			}
		}
		position
	}
	/// Walk the full resolution field from a position one cell at a time,
	/// summing the path length until a target is reached, the field runs
	/// out, the walk revisits a cell, `max_distance` is covered or the
	/// iteration cap is hit. [None] when there is no target or no guidance
	/// at the starting position
	pub fn get_approximate_distance_to_target(&self, position: Vec2, max_distance: f32) -> Option<f32> {
		let targets = self.bias.get_active_target_positions();
		if targets.is_empty() {
			return None;
		}
		let dims = self.hierarchy.get_map_dimensions();
		let cell = dims.get_cell_size(0);
		let step = cell.x.min(cell.y);
		let mut current = position;
		let mut travelled = 0.0;
		let mut visited = BTreeSet::new();
		for iteration in 0..self.config.max_walk_iterations {
			let nearest = targets
				.iter()
				.map(|t| t.distance(current))
				.fold(f32::INFINITY, f32::min);
			if nearest <= step {
				return Some((travelled + nearest).min(max_distance));
			}
			if travelled >= max_distance {
				return Some(max_distance);
			}
			if !visited.insert(dims.world_to_cell_clamped(current, 0)) {
				trace!("Distance walk looped after {} steps", iteration);
				return Some(travelled);
			}
			let direction = -self.storage.sample(current, 0);
			if direction == Vec2::ZERO {
				return if iteration == 0 { None } else { Some(travelled) };
			}
			current += direction * step;
			travelled += step;
		}
		Some(travelled.min(max_distance))
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	fn hierarchy(base: NavigabilityLevel) -> NavigabilityHierarchy {
		NavigabilityHierarchy::from_base_level(base, Vec2::ZERO, Vec2::splat(16.0), 3).unwrap()
	}
	fn estimator(hierarchy: &NavigabilityHierarchy, targets: &[Vec2]) -> BiasEstimator {
		let config = BiasConfig {
			bias_radius: 4.0,
			..Default::default()
		};
		let mut bias = BiasEstimator::new(config, *hierarchy.get_map_dimensions());
		bias.set_targets(targets);
		bias.generate_bias_field();
		bias
	}
	fn fill(storage: &mut FieldStorage, level: usize, value: Vec2) {
		storage.get_levels_mut()[level].get_vectors_mut().fill(value);
		storage.update_cache_immediate(level).unwrap();
	}
	#[test]
	fn zero_field_gives_zero_direction() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		let bias = estimator(&hierarchy, &[]);
		let mut cache = QueryCache::default();
		let config = QueryConfig::default();
		let mut query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		assert_eq!(Vec2::ZERO, query.get_flow_direction(Vec2::new(3.0, 7.0)));
		assert_eq!(None, query.get_approximate_distance_to_target(Vec2::ONE, 10.0));
	}
	#[test]
	fn bias_selects_level_and_direction_is_negated() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		fill(&mut storage, 0, Vec2::new(0.5, 0.0));
		fill(&mut storage, 2, Vec2::new(0.0, 0.5));
		let target = Vec2::new(4.0, 4.0);
		let bias = estimator(&hierarchy, &[target]);
		let mut cache = QueryCache::default();
		let config = QueryConfig::default();
		let mut query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		// the bias peaks short of its maximum between cell centres, a keen
		// agent still reaches full resolution
		let near = query.get_flow_direction_with_level(target, 4.0);
		assert_eq!(0, near.level);
		assert_eq!(Vec2::NEG_X, near.direction);
		let far = query.get_flow_direction_with_level(Vec2::new(14.0, 14.0), 1.0);
		assert_eq!(2, far.level);
		assert_eq!(Vec2::NEG_Y, far.direction);
		// an unimportant agent reads the coarse level even at the target
		let idle = query.get_flow_direction_with_level(target, 0.0);
		assert_eq!(2, idle.level);
	}
	#[test]
	fn empty_level_falls_back_coarser() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		fill(&mut storage, 1, Vec2::new(0.0, -0.5));
		let target = Vec2::new(8.0, 8.0);
		let bias = estimator(&hierarchy, &[target]);
		let mut cache = QueryCache::default();
		let config = QueryConfig::default();
		let mut query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		let sample = query.get_flow_direction_with_level(target, 1.0);
		assert_eq!(1, sample.level);
		assert_eq!(Vec2::Y, sample.direction);
	}
	#[test]
	fn batch_matches_single() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		fill(&mut storage, 0, Vec2::new(0.5, 0.0));
		fill(&mut storage, 2, Vec2::new(0.0, 0.5));
		let bias = estimator(&hierarchy, &[Vec2::new(4.0, 4.0)]);
		let mut cache = QueryCache::default();
		let config = QueryConfig {
			result_cache_enabled: false,
			..Default::default()
		};
		let mut query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		let positions = [Vec2::new(4.0, 4.0), Vec2::new(14.0, 14.0), Vec2::new(5.0, 4.0)];
		let importances = [1.0, 1.0, 0.5];
		let mut results = [Vec2::ZERO; 3];
		query
			.get_flow_direction_batch(&positions, &mut results, Some(&importances))
			.unwrap();
		for i in 0..3 {
			let single = query.get_flow_direction_with_level(positions[i], importances[i]);
			assert_eq!(single.direction, results[i]);
		}
		let mut short = [Vec2::ZERO; 2];
		assert!(query.get_flow_direction_batch(&positions, &mut short, None).is_err());
	}
	#[test]
	fn cache_absorbs_repeat_queries() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		let bias = estimator(&hierarchy, &[]);
		let config = QueryConfig::default();
		let mut cache = QueryCache::new(&config);
		{
			let mut query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
			query.get_flow_direction(Vec2::new(1.0, 1.0));
			query.get_flow_direction(Vec2::new(1.5, 1.5));
		}
		assert_eq!((1, 1), cache.get_statistics());
		assert_eq!(1, cache.len());
		cache.update(config.result_cache_clear_interval_secs);
		assert!(cache.is_empty());
	}
	#[test]
	fn navigability_and_nearest_navigable() {
		let mut base = NavigabilityLevel::new(0, 16, 16);
		for row in 0..16 {
			for column in 8..16 {
				base.set_field_cell_value(true, FieldCell::new(column, row));
			}
		}
		let hierarchy = hierarchy(base);
		let storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		let bias = estimator(&hierarchy, &[]);
		let mut cache = QueryCache::default();
		let config = QueryConfig::default();
		let query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		assert!(!query.is_position_navigable(Vec2::new(4.5, 8.5)));
		assert!(query.is_position_navigable(Vec2::new(12.5, 8.5)));
		let start = Vec2::new(6.5, 8.5);
		let found = query.get_nearest_navigable_position(start, 5.0);
		assert!(query.is_position_navigable(found));
		assert!(found.distance(start) <= 5.0 + 1e-4);
		// nothing within reach
		let stuck = Vec2::new(1.5, 8.5);
		assert_eq!(stuck, query.get_nearest_navigable_position(stuck, 3.0));
		let open = Vec2::new(10.0, 3.0);
		assert_eq!(open, query.get_nearest_navigable_position(open, 3.0));
	}
	#[test]
	fn distance_walk() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		// target to the east, stored vectors point away from it
		fill(&mut storage, 0, Vec2::new(-0.5, 0.0));
		let bias = estimator(&hierarchy, &[Vec2::new(14.5, 8.0)]);
		let mut cache = QueryCache::default();
		let config = QueryConfig::default();
		let query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		assert_eq!(Some(12.0), query.get_approximate_distance_to_target(Vec2::new(2.5, 8.0), 100.0));
		assert_eq!(Some(5.0), query.get_approximate_distance_to_target(Vec2::new(2.5, 8.0), 5.0));
	}
	#[test]
	fn distance_walk_stops_on_a_loop() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		// the west half steers east and the east half steers west, so the
		// walk bounces between columns 7 and 8
		for (i, vector) in storage.get_levels_mut()[0].get_vectors_mut().iter_mut().enumerate() {
			*vector = if i % 16 < 8 {
				Vec2::new(-0.5, 0.0)
			} else {
				Vec2::new(0.5, 0.0)
			};
		}
		storage.update_cache_immediate(0).unwrap();
		let bias = estimator(&hierarchy, &[Vec2::new(8.0, 15.5)]);
		let mut cache = QueryCache::default();
		let config = QueryConfig::default();
		let query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		// 2.5 to 8.5 and back to 7.5 before the revisit is noticed
		assert_eq!(Some(7.0), query.get_approximate_distance_to_target(Vec2::new(2.5, 8.5), 100.0));
	}
	#[test]
	fn distance_walk_stops_where_guidance_ends() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		// only the first six columns hold any guidance
		for (i, vector) in storage.get_levels_mut()[0].get_vectors_mut().iter_mut().enumerate() {
			if i % 16 < 6 {
				*vector = Vec2::new(-0.5, 0.0);
			}
		}
		storage.update_cache_immediate(0).unwrap();
		let bias = estimator(&hierarchy, &[Vec2::new(14.5, 8.5)]);
		let mut cache = QueryCache::default();
		let config = QueryConfig::default();
		let query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		assert_eq!(Some(5.0), query.get_approximate_distance_to_target(Vec2::new(1.5, 8.5), 100.0));
		// no guidance at the start at all
		assert_eq!(None, query.get_approximate_distance_to_target(Vec2::new(10.5, 8.5), 100.0));
	}
	#[test]
	fn distance_walk_gives_up_after_iteration_cap() {
		let hierarchy = hierarchy(NavigabilityLevel::new_navigable(0, 16, 16));
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
		fill(&mut storage, 0, Vec2::new(-0.5, 0.0));
		let bias = estimator(&hierarchy, &[Vec2::new(14.5, 8.0)]);
		let mut cache = QueryCache::default();
		let config = QueryConfig {
			max_walk_iterations: 3,
			..Default::default()
		};
		let query = FlowFieldQuery::new(&config, &hierarchy, &storage, &bias, &mut cache);
		assert_eq!(Some(3.0), query.get_approximate_distance_to_target(Vec2::new(2.5, 8.0), 100.0));
		assert_eq!(Some(2.0), query.get_approximate_distance_to_target(Vec2::new(2.5, 8.0), 2.0));
	}
}
