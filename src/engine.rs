//! The [VectorFieldEngine] wires the navigability hierarchy, bias estimator,
//! propagation engine, field storage, chunk scheduler and query cache into a
//! single owner driven once per frame.
//!
//! Construction is split into explicit stages by the [StagedInitialiser] so
//! a host can spread the start-up cost over several frames:
//!
//! ```text
//! NotStarted -> BuildHierarchy -> DetectJunctions -> GenerateBias
//!            -> AllocateStorage -> InitialiseScheduler -> Ready
//! ```
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Stage a [StagedInitialiser] performs on its next step
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Reflect)]
pub enum InitialisationStage {
	/// Nothing has happened yet, the next step validates the configuration
	#[default]
	NotStarted,
	/// Rasterise the geometry and downsample it
	BuildHierarchy,
	/// Scan the base level for junctions
	DetectJunctions,
	/// Generate the initial bias field
	GenerateBias,
	/// Allocate the vector field levels and their mirrors
	AllocateStorage,
	/// Tile the base level into chunks
	InitialiseScheduler,
	/// The engine is assembled
	Ready,
}

impl InitialisationStage {
	/// Number of steps between [InitialisationStage::NotStarted] and
	/// [InitialisationStage::Ready]
	pub const STEP_COUNT: usize = 6;
	/// Steps already taken
	pub fn completed_steps(&self) -> usize {
		match self {
			InitialisationStage::NotStarted => 0,
			InitialisationStage::BuildHierarchy => 1,
			InitialisationStage::DetectJunctions => 2,
			InitialisationStage::GenerateBias => 3,
			InitialisationStage::AllocateStorage => 4,
			InitialisationStage::InitialiseScheduler => 5,
			InitialisationStage::Ready => 6,
		}
	}
}

/// Builds a [VectorFieldEngine] one stage per call to
/// [StagedInitialiser::step]. A failing stage leaves the initialiser where
/// it was and no engine is ever produced from a partial build
#[derive(Resource)]
pub struct StagedInitialiser {
	/// Options of the engine being built
	config: FlowFieldConfig,
	/// Geometry to rasterise, consumed by the hierarchy stage
	geometry: Option<SurfaceGeometry>,
	/// Hierarchy, supplied up front or built from the geometry
	hierarchy: Option<NavigabilityHierarchy>,
	/// Bias estimator once junctions are detected
	bias: Option<BiasEstimator>,
	/// Storage once allocated
	storage: Option<FieldStorage>,
	/// Scheduler once tiled
	scheduler: Option<ChunkScheduler>,
	/// The finished engine
	engine: Option<VectorFieldEngine>,
	/// Next stage to perform
	stage: InitialisationStage,
}

impl StagedInitialiser {
	/// Prepare to build an engine from surface geometry
	pub fn new(config: FlowFieldConfig, geometry: SurfaceGeometry) -> Self {
		StagedInitialiser {
			config,
			geometry: Some(geometry),
			hierarchy: None,
			bias: None,
			storage: None,
			scheduler: None,
			engine: None,
			stage: InitialisationStage::NotStarted,
		}
	}
	/// Prepare to build an engine around an existing hierarchy, the hierarchy
	/// stage then has nothing left to do
	pub fn from_hierarchy(config: FlowFieldConfig, hierarchy: NavigabilityHierarchy) -> Self {
		StagedInitialiser {
			config,
			geometry: None,
			hierarchy: Some(hierarchy),
			bias: None,
			storage: None,
			scheduler: None,
			engine: None,
			stage: InitialisationStage::NotStarted,
		}
	}
	/// Next stage to perform
	pub fn get_stage(&self) -> InitialisationStage {
		self.stage
	}
	/// Fraction of the stages completed
	pub fn progress(&self) -> f32 {
		self.stage.completed_steps() as f32 / InitialisationStage::STEP_COUNT as f32
	}
	/// Is the engine assembled
	pub fn is_ready(&self) -> bool {
		self.stage == InitialisationStage::Ready
	}
	/// Perform the next stage, returning the stage that follows it
	pub fn step(&mut self) -> Result<InitialisationStage, FlowFieldError> {
		let next = match self.stage {
			InitialisationStage::NotStarted => {
				self.config.validate()?;
				InitialisationStage::BuildHierarchy
			}
			InitialisationStage::BuildHierarchy => {
				if self.hierarchy.is_none() {
					let geometry = self
						.geometry
						.as_ref()
						.ok_or(FlowFieldError::NotInitialised("surface geometry"))?;
					let hierarchy = NavigabilityHierarchy::build_with_padding(
						geometry,
						self.config.base_width as usize,
						self.config.base_height as usize,
						self.config.level_count,
						self.config.bounds_padding,
					)?;
					self.hierarchy = Some(hierarchy);
					self.geometry = None;
				}
				InitialisationStage::DetectJunctions
			}
			InitialisationStage::DetectJunctions => {
				let hierarchy = self.get_built_hierarchy()?;
				let mut bias =
					BiasEstimator::new(self.config.bias.clone(), *hierarchy.get_map_dimensions());
				let found = bias.detect_junctions(hierarchy).len();
				debug!("Detected {} junctions", found);
				self.bias = Some(bias);
				InitialisationStage::GenerateBias
			}
			InitialisationStage::GenerateBias => {
				let bias = self
					.bias
					.as_mut()
					.ok_or(FlowFieldError::NotInitialised("bias estimator"))?;
				bias.generate_bias_field();
				InitialisationStage::AllocateStorage
			}
			InitialisationStage::AllocateStorage => {
				let storage = FieldStorage::new(self.config.storage.clone(), self.get_built_hierarchy()?);
				self.storage = Some(storage);
				InitialisationStage::InitialiseScheduler
			}
			InitialisationStage::InitialiseScheduler => {
				let dimensions = *self.get_built_hierarchy()?.get_map_dimensions();
				let mut scheduler = ChunkScheduler::new(self.config.scheduler.clone());
				scheduler.initialize(&dimensions);
				self.scheduler = Some(scheduler);
				self.assemble()?;
				InitialisationStage::Ready
			}
			InitialisationStage::Ready => InitialisationStage::Ready,
		};
		if next != self.stage {
			debug!("Initialisation {:?} -> {:?}", self.stage, next);
		}
		self.stage = next;
		Ok(next)
	}
	/// Perform every remaining stage
	pub fn run_to_completion(mut self) -> Result<VectorFieldEngine, FlowFieldError> {
		while !self.is_ready() {
			self.step()?;
		}
		self.take_engine()
			.ok_or(FlowFieldError::NotInitialised("vector field engine"))
	}
	/// Hand over the finished engine, [None] before
	/// [InitialisationStage::Ready] or once taken
	pub fn take_engine(&mut self) -> Option<VectorFieldEngine> {
		if self.is_ready() {
			self.engine.take()
		} else {
			None
		}
	}
	/// The hierarchy once the hierarchy stage has run
	fn get_built_hierarchy(&self) -> Result<&NavigabilityHierarchy, FlowFieldError> {
		self.hierarchy
			.as_ref()
			.ok_or(FlowFieldError::NotInitialised("navigability hierarchy"))
	}
	/// Move every built part into a [VectorFieldEngine]
	fn assemble(&mut self) -> Result<(), FlowFieldError> {
		let (Some(hierarchy), Some(bias), Some(storage), Some(scheduler)) = (
			self.hierarchy.take(),
			self.bias.take(),
			self.storage.take(),
			self.scheduler.take(),
		) else {
			return Err(FlowFieldError::NotInitialised("engine components"));
		};
		self.engine = Some(VectorFieldEngine {
			propagation: PropagationEngine::new(self.config.propagation.clone()),
			query_cache: QueryCache::new(&self.config.query),
			config: self.config.clone(),
			hierarchy,
			bias,
			storage,
			scheduler,
			clock: InstantClock::default(),
		});
		Ok(())
	}
}

/// Options changeable while the engine runs, [None] leaves a value as it is
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuntimeTuning {
	/// Wall time each tick may spend processing chunks
	pub frame_budget_ms: Option<f64>,
	/// Priority formula weights
	pub weights: Option<PriorityWeights>,
	/// Propagation falloff rate
	pub falloff_rate: Option<f32>,
	/// Relaxation sweeps per level
	pub stages_per_level: Option<usize>,
	/// Seconds between host mirror refreshes
	pub cache_update_interval_secs: Option<f32>,
}

/// Owner of every part of the multi-resolution vector field
#[derive(Resource)]
pub struct VectorFieldEngine {
	/// Options in force
	config: FlowFieldConfig,
	/// Navigability of every level
	hierarchy: NavigabilityHierarchy,
	/// Junctions, targets and the bias field
	bias: BiasEstimator,
	/// Seeds and relaxes the field
	propagation: PropagationEngine,
	/// Vector field levels and their mirrors
	storage: FieldStorage,
	/// Paces recomputation across frames
	scheduler: ChunkScheduler,
	/// Short lived query results
	query_cache: QueryCache,
	/// Wall clock the scheduler budgets against
	clock: InstantClock,
}

impl VectorFieldEngine {
	/// Build an engine from surface geometry in a single call
	pub fn new(config: FlowFieldConfig, geometry: SurfaceGeometry) -> Result<Self, FlowFieldError> {
		StagedInitialiser::new(config, geometry).run_to_completion()
	}
	/// Build an engine around an existing hierarchy in a single call
	pub fn from_hierarchy(
		config: FlowFieldConfig,
		hierarchy: NavigabilityHierarchy,
	) -> Result<Self, FlowFieldError> {
		StagedInitialiser::from_hierarchy(config, hierarchy).run_to_completion()
	}
	/// Get the options in force
	pub fn get_config(&self) -> &FlowFieldConfig {
		&self.config
	}
	/// Get the navigability hierarchy
	pub fn get_hierarchy(&self) -> &NavigabilityHierarchy {
		&self.hierarchy
	}
	/// Get the bias estimator
	pub fn get_bias_estimator(&self) -> &BiasEstimator {
		&self.bias
	}
	/// Get the propagation engine
	pub fn get_propagation(&self) -> &PropagationEngine {
		&self.propagation
	}
	/// Get the field storage
	pub fn get_storage(&self) -> &FieldStorage {
		&self.storage
	}
	/// Get the chunk scheduler
	pub fn get_scheduler(&self) -> &ChunkScheduler {
		&self.scheduler
	}
	/// Replace every target. Each level is cleared and re-seeded, the bias
	/// field regenerated and every chunk marked dirty, chunks near a target
	/// are processed first. Returns the identifiers of the new targets
	pub fn set_targets(&mut self, positions: &[Vec2]) -> Vec<u32> {
		let ids = self.bias.set_targets(positions);
		self.apply_targets();
		ids
	}
	/// Restore a deactivated target, returns `false` if it is unknown
	pub fn activate_target(&mut self, id: u32) -> bool {
		let known = self.bias.activate_target(id);
		if known {
			self.apply_targets();
		}
		known
	}
	/// Withdraw a target's seed and bias without forgetting it, returns
	/// `false` if it is unknown
	pub fn deactivate_target(&mut self, id: u32) -> bool {
		let known = self.bias.deactivate_target(id);
		if known {
			self.apply_targets();
		}
		known
	}
	/// Push the active targets into the field, bias and scheduler
	fn apply_targets(&mut self) {
		let active = self.bias.get_active_target_positions();
		let levels = self.storage.get_levels_mut();
		self.propagation.clear_all(levels);
		let pinned = self.propagation.set_targets(
			levels,
			&self.hierarchy,
			&active,
			self.config.propagation.target_radius,
		);
		if !active.is_empty() && pinned == 0 {
			warn!("No navigable cell lies near any of the {} targets", active.len());
		}
		// coarse guidance everywhere before any chunk is refined
		if let (Some(field), Some(nav)) = (levels.last_mut(), self.hierarchy.get_levels().last()) {
			let config = self.propagation.get_config();
			// four sweeps carry signal into every quadrant of open ground
			self.propagation
				.propagate(field, nav, config.falloff_rate, config.stages_per_level.max(4));
		}
		self.bias.generate_bias_field();
		self.storage.mark_all_dirty();
		self.scheduler.set_targets(&active);
		self.scheduler.mark_all_dirty();
		self.query_cache.clear();
	}
	/// Dirty the chunks within `radius` of a world position, used when a
	/// dynamic obstacle disturbs an area
	pub fn mark_dirty(&mut self, position: Vec2, radius: f32) {
		self.scheduler.mark_dirty(position, radius);
	}
	/// Register an agent with the density bookkeeping
	pub fn register_agent(&mut self, id: AgentId, agent: &impl NavigationAgent) {
		self.scheduler.register_agent(id, agent);
	}
	/// Report a new position or importance of an agent
	pub fn update_agent(&mut self, id: AgentId, agent: &impl NavigationAgent) {
		self.scheduler.update_agent(id, agent);
	}
	/// Forget an agent, returns `false` if it was not registered
	pub fn unregister_agent(&mut self, id: AgentId) -> bool {
		self.scheduler.unregister_agent(id)
	}
	/// Process dirty chunks for at most `frame_budget_ms` of wall time
	pub fn tick(&mut self, frame_budget_ms: f64) -> TickReport {
		let clock = self.clock;
		self.tick_with_clock(frame_budget_ms, &clock)
	}
	/// Process dirty chunks budgeting against a custom clock
	pub fn tick_with_clock(&mut self, frame_budget_ms: f64, clock: &impl FrameClock) -> TickReport {
		let mut processor = RegionProcessor {
			hierarchy: &self.hierarchy,
			bias: &mut self.bias,
			propagation: &self.propagation,
			storage: &mut self.storage,
		};
		let report = self.scheduler.tick(frame_budget_ms, &mut processor, clock);
		trace!(
			"Tick processed {} chunks in {:.3}ms, {} remaining",
			report.processed,
			report.elapsed_ms,
			report.remaining
		);
		report
	}
	/// Advance the host mirror refresh and query cache timers
	pub fn update_caches(&mut self, delta_secs: f32) {
		self.storage.update(delta_secs);
		self.query_cache.update(delta_secs);
	}
	/// Run one frame, a tick within the configured budget followed by the
	/// cache timers
	pub fn frame(&mut self, delta_secs: f32) -> TickReport {
		let report = self.tick(self.config.scheduler.frame_budget_ms);
		self.update_caches(delta_secs);
		report
	}
	/// Answer agent queries against the current field
	pub fn query(&mut self) -> FlowFieldQuery<'_> {
		if self.bias.is_dirty() {
			self.bias.generate_bias_field();
		}
		FlowFieldQuery::new(
			&self.config.query,
			&self.hierarchy,
			&self.storage,
			&self.bias,
			&mut self.query_cache,
		)
	}
	/// Fraction of chunks that are up to date
	pub fn progress(&self) -> f32 {
		self.scheduler.progress()
	}
	/// Are chunks waiting to be processed
	pub fn is_busy(&self) -> bool {
		self.scheduler.is_busy()
	}
	/// Replace the navigable surface. The hierarchy is rebuilt, junctions
	/// re-detected, storage reallocated and the chunks re-tiled, targets and
	/// agents carry over
	pub fn rebuild_navigability(&mut self, geometry: &SurfaceGeometry) -> Result<(), FlowFieldError> {
		let hierarchy = NavigabilityHierarchy::build_with_padding(
			geometry,
			self.config.base_width as usize,
			self.config.base_height as usize,
			self.config.level_count,
			self.config.bounds_padding,
		)?;
		self.replace_hierarchy(hierarchy);
		Ok(())
	}
	/// Swap in a new hierarchy and rebuild everything derived from it
	pub fn replace_hierarchy(&mut self, hierarchy: NavigabilityHierarchy) {
		let dimensions = *hierarchy.get_map_dimensions();
		self.hierarchy = hierarchy;
		self.bias.set_dimensions(dimensions);
		self.bias.detect_junctions(&self.hierarchy);
		self.storage.reallocate(&self.hierarchy);
		self.scheduler.initialize(&dimensions);
		self.apply_targets();
		info!(
			"Navigability rebuilt, {} levels over {:?}",
			self.hierarchy.get_level_count(),
			dimensions.get_bounds()
		);
	}
	/// Update tunable options in place, nothing changes if any value is
	/// out of range
	pub fn apply_tuning(&mut self, tuning: RuntimeTuning) -> Result<(), FlowFieldError> {
		let mut config = self.config.clone();
		if let Some(budget) = tuning.frame_budget_ms {
			config.scheduler.frame_budget_ms = budget;
		}
		if let Some(weights) = tuning.weights {
			config.scheduler.weights = weights;
		}
		if let Some(falloff) = tuning.falloff_rate {
			config.propagation.falloff_rate = falloff;
		}
		if let Some(stages) = tuning.stages_per_level {
			config.propagation.stages_per_level = stages;
		}
		if let Some(interval) = tuning.cache_update_interval_secs {
			if interval < 0.0 || !interval.is_finite() {
				return Err(FlowFieldError::InvalidConfig(
					"cache_update_interval_secs must be non-negative".to_string(),
				));
			}
			config.storage.cache_update_interval_secs = interval;
		}
		config.validate()?;
		self.scheduler.set_frame_budget_ms(config.scheduler.frame_budget_ms);
		self.scheduler.set_weights(config.scheduler.weights);
		self.propagation.set_config(config.propagation.clone());
		self.storage
			.set_cache_update_interval(config.storage.cache_update_interval_secs);
		self.config = config;
		debug!("Applied runtime tuning {:?}", tuning);
		Ok(())
	}
}

/// Recomputes a chunk by processing its region coarse-to-fine down to the
/// level its bias calls for
struct RegionProcessor<'a> {
	/// Navigability of every level
	hierarchy: &'a NavigabilityHierarchy,
	/// Bias field, regenerated lazily when dirty
	bias: &'a mut BiasEstimator,
	/// Relaxation options and kernels
	propagation: &'a PropagationEngine,
	/// Levels being written
	storage: &'a mut FieldStorage,
}

impl ChunkProcessor for RegionProcessor<'_> {
	fn process_chunk(&mut self, chunk: &Chunk) -> Result<ChunkOutcome, FlowFieldError> {
		let max_level = self.storage.get_level_count().saturating_sub(1);
		let max_bias = self.bias.get_max_bias_strength();
		let bias = self.bias.sample_bias(chunk.get_world_centre());
		let finest = select_resolution_level(bias, max_bias, 1.0, max_level);
		let reached = self.propagation.process_region(
			self.storage.get_levels_mut(),
			self.hierarchy,
			self.bias.get_bias_field(),
			max_bias,
			chunk.get_region(),
			finest,
		)?;
		for level in finest..=max_level {
			self.storage.mark_dirty(level);
		}
		if reached > 0 {
			Ok(ChunkOutcome::Spread)
		} else {
			Ok(ChunkOutcome::Settled)
		}
	}
	fn sample_normalised_bias(&mut self, position: Vec2) -> f32 {
		self.bias.sample_normalised_bias(position)
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	fn config() -> FlowFieldConfig {
		FlowFieldConfig {
			base_width: 64,
			base_height: 64,
			level_count: 3,
			bounds_padding: 0.0,
			propagation: PropagationConfig {
				target_radius: 2.0,
				stages_per_level: 6,
				..Default::default()
			},
			scheduler: SchedulerConfig {
				chunk_size: 16,
				..Default::default()
			},
			..Default::default()
		}
	}
	fn geometry() -> SurfaceGeometry {
		SurfaceGeometry::rectangle(Vec2::ZERO, Vec2::splat(64.0))
	}
	fn run_until_idle(engine: &mut VectorFieldEngine) {
		for _ in 0..1000 {
			engine.tick(f64::MAX);
			if !engine.is_busy() {
				break;
			}
		}
		engine.update_caches(engine.get_config().storage.cache_update_interval_secs);
	}
	#[test]
	fn staged_initialisation() {
		let mut init = StagedInitialiser::new(config(), geometry());
		assert_eq!(InitialisationStage::NotStarted, init.get_stage());
		assert!(init.take_engine().is_none());
		let mut steps = 0;
		while !init.is_ready() {
			init.step().unwrap();
			steps += 1;
		}
		assert_eq!(InitialisationStage::STEP_COUNT, steps);
		assert_eq!(1.0, init.progress());
		assert!(init.take_engine().is_some());
		assert!(init.take_engine().is_none());
	}
	#[test]
	fn empty_geometry_fails_hierarchy_stage() {
		let mut init = StagedInitialiser::new(config(), SurfaceGeometry::default());
		init.step().unwrap();
		assert!(matches!(init.step(), Err(FlowFieldError::EmptyGeometry)));
		assert_eq!(InitialisationStage::BuildHierarchy, init.get_stage());
		assert!(init.take_engine().is_none());
	}
	#[test]
	fn invalid_config_fails_first_stage() {
		let mut bad = config();
		bad.propagation.falloff_rate = 1.5;
		assert!(VectorFieldEngine::new(bad, geometry()).is_err());
	}
	#[test]
	fn no_targets_no_direction() {
		let mut engine = VectorFieldEngine::new(config(), geometry()).unwrap();
		run_until_idle(&mut engine);
		let mut query = engine.query();
		assert_eq!(Vec2::ZERO, query.get_flow_direction(Vec2::new(10.0, 50.0)));
	}
	#[test]
	fn agents_steer_toward_target() {
		let mut engine = VectorFieldEngine::new(config(), geometry()).unwrap();
		let ids = engine.set_targets(&[Vec2::new(32.0, 32.0)]);
		assert_eq!(1, ids.len());
		assert!(engine.is_busy());
		run_until_idle(&mut engine);
		assert_eq!(1.0, engine.progress());
		let actor = Vec2::new(8.0, 8.0);
		let expected = (Vec2::new(32.0, 32.0) - actor).normalize();
		let direction = engine.query().get_flow_direction(actor);
		assert!(direction.dot(expected) > 0.7);
	}
	#[test]
	fn deactivated_target_withdraws_guidance() {
		let mut engine = VectorFieldEngine::new(config(), geometry()).unwrap();
		let ids = engine.set_targets(&[Vec2::new(32.0, 32.0)]);
		run_until_idle(&mut engine);
		assert!(engine.deactivate_target(ids[0]));
		assert!(!engine.deactivate_target(99));
		run_until_idle(&mut engine);
		assert_eq!(Vec2::ZERO, engine.query().get_flow_direction(Vec2::new(8.0, 8.0)));
		assert!(engine.activate_target(ids[0]));
		run_until_idle(&mut engine);
		assert_ne!(Vec2::ZERO, engine.query().get_flow_direction(Vec2::new(8.0, 8.0)));
	}
	#[test]
	fn crowd_ahead_of_the_front_is_reached() {
		// 16 corridors of a serpentine, wall `i` sits in column `4i + 3` and
		// is open at the top when `i` is even, at the bottom when odd
		let mut base = NavigabilityLevel::new_navigable(0, 64, 16);
		for i in 0..15 {
			let column = 4 * i + 3;
			let gap = if i % 2 == 0 { 12..16 } else { 0..4 };
			for row in 0..16 {
				if !gap.contains(&row) {
					base.set_field_cell_value(false, FieldCell::new(column, row));
				}
			}
		}
		let hierarchy =
			NavigabilityHierarchy::from_base_level(base, Vec2::ZERO, Vec2::new(64.0, 16.0), 1)
				.unwrap();
		let config = FlowFieldConfig {
			base_width: 64,
			base_height: 16,
			level_count: 1,
			bounds_padding: 0.0,
			propagation: PropagationConfig {
				target_radius: 1.5,
				stages_per_level: 6,
				..Default::default()
			},
			scheduler: SchedulerConfig {
				chunk_size: 16,
				initial_chunks_per_tick: 1,
				..Default::default()
			},
			..Default::default()
		};
		let mut engine = VectorFieldEngine::from_hierarchy(config, hierarchy).unwrap();
		struct Crowd;
		impl NavigationAgent for Crowd {
			fn position(&self) -> Vec2 {
				Vec2::new(62.5, 2.5)
			}
		}
		// the dense far chunk is processed long before any signal arrives
		for n in 0..10 {
			engine.register_agent(AgentId::new(n), &Crowd);
		}
		engine.set_targets(&[Vec2::new(1.5, 1.5)]);
		for _ in 0..5000 {
			engine.tick(f64::MAX);
			if !engine.is_busy() {
				break;
			}
		}
		assert!(!engine.is_busy());
		engine.update_caches(engine.get_config().storage.cache_update_interval_secs);
		let direction = engine.query().get_flow_direction(Vec2::new(62.5, 2.5));
		assert_ne!(Vec2::ZERO, direction);
		// the last corridor drains through the gap at its top
		assert!(direction.y > 0.0, "got {}", direction);
	}
	#[test]
	fn mark_dirty_reawakens_scheduler() {
		let mut engine = VectorFieldEngine::new(config(), geometry()).unwrap();
		run_until_idle(&mut engine);
		assert!(!engine.is_busy());
		engine.mark_dirty(Vec2::new(40.0, 40.0), 4.0);
		assert!(engine.is_busy());
	}
	#[test]
	fn rebuild_keeps_targets() {
		let mut engine = VectorFieldEngine::new(config(), geometry()).unwrap();
		engine.set_targets(&[Vec2::new(32.0, 32.0)]);
		run_until_idle(&mut engine);
		let smaller = SurfaceGeometry::rectangle(Vec2::ZERO, Vec2::splat(48.0));
		engine.rebuild_navigability(&smaller).unwrap();
		assert_eq!(1, engine.get_propagation().get_seeds().len());
		assert!(engine.is_busy());
		assert!(engine
			.rebuild_navigability(&SurfaceGeometry::default())
			.is_err());
	}
	#[test]
	fn tuning_is_validated() {
		let mut engine = VectorFieldEngine::new(config(), geometry()).unwrap();
		let tuning = RuntimeTuning {
			frame_budget_ms: Some(4.0),
			stages_per_level: Some(3),
			..Default::default()
		};
		engine.apply_tuning(tuning).unwrap();
		assert_eq!(4.0, engine.get_scheduler().get_config().frame_budget_ms);
		assert_eq!(3, engine.get_propagation().get_config().stages_per_level);
		let bad = RuntimeTuning {
			falloff_rate: Some(2.0),
			..Default::default()
		};
		assert!(engine.apply_tuning(bad).is_err());
		assert_eq!(0.98, engine.get_propagation().get_config().falloff_rate);
	}
	#[test]
	fn agents_feed_density() {
		struct Walker;
		impl NavigationAgent for Walker {
			fn position(&self) -> Vec2 {
				Vec2::new(4.0, 4.0)
			}
		}
		let mut engine = VectorFieldEngine::new(config(), geometry()).unwrap();
		let id = AgentId::new(3);
		engine.register_agent(id, &Walker);
		assert_eq!(1.0, engine.get_scheduler().get_agents().get_density(0));
		assert!(engine.unregister_agent(id));
		assert_eq!(0.0, engine.get_scheduler().get_agents().get_density(0));
	}
}
