//! Field storage owns the authoritative vector field of every resolution
//! level, the "device" buffers only the propagation engine writes to, and a
//! host-side mirror of each level that queries read from.
//!
//! Mirrors are refreshed on a fixed interval rather than per query, so a
//! query may observe the field as it was up to one interval ago. Marking a
//! level dirty flags it for the next periodic refresh, an immediate copy can
//! be forced with [FieldStorage::update_cache_immediate] and a deferred one
//! scheduled with [FieldStorage::update_cache_async].
//!
//! When `cache_all_levels` is disabled only level `0` is mirrored, the other
//! levels are sampled directly from the device buffers
//!

use std::collections::VecDeque;

use crate::prelude::*;
use bevy::prelude::*;

/// Host-side mirror of a single level
#[derive(Clone, Debug)]
pub struct HostCache {
	/// Copy of the device level as of the last refresh
	field: VectorFieldLevel,
	/// The device level has changed since the last refresh
	dirty: bool,
	/// Seconds since the periodic timer last fired
	since_refresh: f32,
	/// Number of refreshes performed
	refresh_count: u64,
}

impl HostCache {
	/// Mirror a device level
	fn new(device: &VectorFieldLevel) -> Self {
		HostCache {
			field: device.clone(),
			dirty: false,
			since_refresh: 0.0,
			refresh_count: 0,
		}
	}
	/// Copy the device level into the mirror
	fn refresh(&mut self, device: &VectorFieldLevel) {
		self.field.copy_from(device);
		self.dirty = false;
		self.refresh_count += 1;
	}
	/// The mirrored level
	pub fn get_field(&self) -> &VectorFieldLevel {
		&self.field
	}
	/// Is a refresh pending
	pub fn is_dirty(&self) -> bool {
		self.dirty
	}
	/// Number of refreshes performed
	pub fn get_refresh_count(&self) -> u64 {
		self.refresh_count
	}
}

/// Device buffers and host mirrors for every resolution level
#[derive(Clone, Debug)]
pub struct FieldStorage {
	/// Caching options
	config: StorageConfig,
	/// Conversions between world positions and cells
	dimensions: MapDimensions,
	/// Authoritative field of each level
	device: Vec<VectorFieldLevel>,
	/// Mirror of each level, [None] for levels that opted out of caching
	caches: Vec<Option<HostCache>>,
	/// Levels awaiting an asynchronous refresh
	pending: VecDeque<usize>,
}

impl FieldStorage {
	/// Allocate zeroed device buffers and mirrors matching a hierarchy
	pub fn new(config: StorageConfig, hierarchy: &NavigabilityHierarchy) -> Self {
		let mut storage = FieldStorage {
			config,
			dimensions: *hierarchy.get_map_dimensions(),
			device: Vec::new(),
			caches: Vec::new(),
			pending: VecDeque::new(),
		};
		storage.reallocate(hierarchy);
		storage
	}
	/// Discard every buffer and allocate afresh for a hierarchy
	pub fn reallocate(&mut self, hierarchy: &NavigabilityHierarchy) {
		self.dimensions = *hierarchy.get_map_dimensions();
		self.device = hierarchy
			.get_levels()
			.iter()
			.map(|nav| {
				let (w, h) = nav.get_dimensions();
				VectorFieldLevel::new(nav.get_level(), w, h)
			})
			.collect();
		let cache_all = self.config.cache_all_levels;
		self.caches = self
			.device
			.iter()
			.enumerate()
			.map(|(level, device)| {
				if cache_all || level == 0 {
					Some(HostCache::new(device))
				} else {
					None
				}
			})
			.collect();
		self.pending.clear();
		debug!(
			"Allocated {} device levels, {} host mirrors",
			self.device.len(),
			self.caches.iter().filter(|c| c.is_some()).count()
		);
	}
	/// Get the options
	pub fn get_config(&self) -> &StorageConfig {
		&self.config
	}
	/// Change the periodic refresh interval
	pub fn set_cache_update_interval(&mut self, seconds: f32) {
		self.config.cache_update_interval_secs = seconds.max(0.0);
	}
	/// Number of levels
	pub fn get_level_count(&self) -> usize {
		self.device.len()
	}
	/// Conversions between world positions and cells
	pub fn get_map_dimensions(&self) -> &MapDimensions {
		&self.dimensions
	}
	/// Get every device level
	pub fn get_levels(&self) -> &[VectorFieldLevel] {
		&self.device
	}
	/// Get every device level mutably, only the propagation engine should
	/// write through this
	pub fn get_levels_mut(&mut self) -> &mut [VectorFieldLevel] {
		&mut self.device
	}
	/// Get a device level
	pub fn get_level(&self, level: usize) -> Result<&VectorFieldLevel, FlowFieldError> {
		self.device.get(level).ok_or(FlowFieldError::LevelOutOfRange {
			level,
			count: self.device.len(),
		})
	}
	/// Get the mirror of a level, [None] if the level is not cached
	pub fn get_cache(&self, level: usize) -> Option<&HostCache> {
		self.caches.get(level).and_then(|c| c.as_ref())
	}
	/// Copy a device level into its mirror right away
	pub fn update_cache_immediate(&mut self, level: usize) -> Result<(), FlowFieldError> {
		let count = self.device.len();
		let device = self
			.device
			.get(level)
			.ok_or(FlowFieldError::LevelOutOfRange { level, count })?;
		if let Some(Some(cache)) = self.caches.get_mut(level) {
			cache.refresh(device);
		}
		Ok(())
	}
	/// Schedule a copy of a device level into its mirror, it completes during
	/// the next [FieldStorage::update]
	pub fn update_cache_async(&mut self, level: usize) -> Result<(), FlowFieldError> {
		if level >= self.device.len() {
			return Err(FlowFieldError::LevelOutOfRange {
				level,
				count: self.device.len(),
			});
		}
		if !self.pending.contains(&level) {
			self.pending.push_back(level);
		}
		Ok(())
	}
	/// Number of asynchronous refreshes not yet completed
	pub fn get_pending_count(&self) -> usize {
		self.pending.len()
	}
	/// Flag a level for the next periodic refresh
	pub fn mark_dirty(&mut self, level: usize) {
		if let Some(Some(cache)) = self.caches.get_mut(level) {
			cache.dirty = true;
		}
	}
	/// Flag every level for the next periodic refresh
	pub fn mark_all_dirty(&mut self) {
		for cache in self.caches.iter_mut().flatten() {
			cache.dirty = true;
		}
	}
	/// Advance the refresh timers by `delta_secs`. Pending asynchronous
	/// refreshes complete first, then every level whose timer has reached
	/// the interval is refreshed if it is dirty
	pub fn update(&mut self, delta_secs: f32) {
		while let Some(level) = self.pending.pop_front() {
			if let (Some(device), Some(Some(cache))) =
				(self.device.get(level), self.caches.get_mut(level))
			{
				cache.refresh(device);
			}
		}
		let interval = self.config.cache_update_interval_secs;
		for (device, cache) in self.device.iter().zip(self.caches.iter_mut()) {
			let Some(cache) = cache else {
				continue;
			};
			cache.since_refresh += delta_secs;
			if cache.since_refresh >= interval {
				cache.since_refresh = 0.0;
				if cache.dirty {
					cache.refresh(device);
				}
			}
		}
	}
	/// Bilinearly interpolated raw vector at a world position, read from
	/// the mirror when one exists and from the device level otherwise.
	/// Levels beyond the coarsest are clamped to it
	pub fn sample_raw(&self, position: Vec2, level: usize) -> Vec2 {
		if self.device.is_empty() {
			return Vec2::ZERO;
		}
		let level = level.min(self.device.len() - 1);
		let continuous = self.dimensions.world_to_continuous(position, level);
		match self.get_cache(level) {
			Some(cache) => cache.field.sample_bilinear(continuous),
			None => {
				trace!("Level {} has no host mirror, reading the device level", level);
				self.device[level].sample_bilinear(continuous)
			}
		}
	}
	/// Normalised direction stored at a world position, or zero where the
	/// field holds no guidance
	pub fn sample(&self, position: Vec2, level: usize) -> Vec2 {
		normalise_or_zero(self.sample_raw(position, level))
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	fn hierarchy() -> NavigabilityHierarchy {
		let base = NavigabilityLevel::new_navigable(0, 16, 16);
		NavigabilityHierarchy::from_base_level(base, Vec2::ZERO, Vec2::splat(16.0), 3).unwrap()
	}
	#[test]
	fn cache_only_base_level() {
		let config = StorageConfig {
			cache_all_levels: false,
			..Default::default()
		};
		let storage = FieldStorage::new(config, &hierarchy());
		assert!(storage.get_cache(0).is_some());
		assert!(storage.get_cache(1).is_none());
		assert_eq!(3, storage.get_levels().len());
	}
	#[test]
	fn uncached_level_reads_device() {
		let config = StorageConfig {
			cache_all_levels: false,
			..Default::default()
		};
		let mut storage = FieldStorage::new(config, &hierarchy());
		storage.get_levels_mut()[2].get_vectors_mut().fill(Vec2::new(0.0, 0.25));
		assert_eq!(Vec2::Y, storage.sample(Vec2::new(8.0, 8.0), 2));
	}
	#[test]
	fn staleness_bound() {
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy());
		let interval = storage.get_config().cache_update_interval_secs;
		storage.get_levels_mut()[0].get_vectors_mut().fill(Vec2::new(0.5, 0.0));
		storage.mark_all_dirty();
		let p = Vec2::new(8.0, 8.0);
		// stale straight after marking
		assert_eq!(Vec2::ZERO, storage.sample(p, 0));
		storage.update(interval * 0.5);
		assert_eq!(Vec2::ZERO, storage.sample(p, 0));
		storage.update(interval * 0.5);
		assert_eq!(Vec2::X, storage.sample(p, 0));
	}
	#[test]
	fn immediate_update() {
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy());
		storage.get_levels_mut()[1].get_vectors_mut().fill(Vec2::new(-0.25, 0.0));
		storage.update_cache_immediate(1).unwrap();
		assert_eq!(Vec2::NEG_X, storage.sample(Vec2::new(3.0, 3.0), 1));
		assert!(storage.update_cache_immediate(3).is_err());
	}
	#[test]
	fn async_update_completes_next_update() {
		let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy());
		storage.get_levels_mut()[0].get_vectors_mut().fill(Vec2::new(0.0, -0.5));
		storage.update_cache_async(0).unwrap();
		storage.update_cache_async(0).unwrap();
		assert_eq!(1, storage.get_pending_count());
		assert_eq!(Vec2::ZERO, storage.sample(Vec2::ONE, 0));
		storage.update(0.0);
		assert_eq!(Vec2::NEG_Y, storage.sample(Vec2::ONE, 0));
		assert_eq!(0, storage.get_pending_count());
	}
	#[test]
	fn zero_corners_sample_zero() {
		let storage = FieldStorage::new(StorageConfig::default(), &hierarchy());
		assert_eq!(Vec2::ZERO, storage.sample(Vec2::new(4.0, 4.0), 0));
	}
}
