//! Building the [VectorFieldEngine] over several frames and driving it once
//! it exists
//!

use crate::prelude::*;
use bevy::prelude::*;

use super::{FieldProgress, FlowFieldSettings, SurfaceGeometrySource};

/// Sent once when the engine has been built and inserted as a resource
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct EventFieldReady;

/// Start a [StagedInitialiser] when a [SurfaceGeometrySource] appears and no
/// engine exists yet
#[cfg(not(tarpaulin_include))]
pub fn begin_initialisation(
	mut commands: Commands,
	settings: Res<FlowFieldSettings>,
	source: Option<Res<SurfaceGeometrySource>>,
	engine: Option<Res<VectorFieldEngine>>,
) {
	let Some(source) = source else {
		return;
	};
	if engine.is_some() || !source.is_changed() {
		return;
	}
	let config = settings.get().clone();
	let initialiser = match source.as_ref() {
		SurfaceGeometrySource::Geometry(geometry) => StagedInitialiser::new(config, geometry.clone()),
		SurfaceGeometrySource::Hierarchy(hierarchy) => {
			StagedInitialiser::from_hierarchy(config, hierarchy.clone())
		}
	};
	info!("Starting vector field initialisation");
	commands.insert_resource(initialiser);
}

/// Perform one initialisation stage per frame, inserting the engine once
/// every stage has completed. A failing stage abandons the build
#[cfg(not(tarpaulin_include))]
pub fn step_initialisation(
	mut commands: Commands,
	initialiser: Option<ResMut<StagedInitialiser>>,
	mut progress: ResMut<FieldProgress>,
	mut event_ready: EventWriter<EventFieldReady>,
) {
	let Some(mut initialiser) = initialiser else {
		return;
	};
	match initialiser.step() {
		Ok(InitialisationStage::Ready) => {
			commands.remove_resource::<StagedInitialiser>();
			match initialiser.take_engine() {
				Some(engine) => {
					info!("Vector field ready");
					commands.insert_resource(engine);
					event_ready.write(EventFieldReady);
				}
				None => error!("Initialisation finished without producing an engine"),
			}
		}
		Ok(stage) => {
			progress.fraction = initialiser.progress();
			progress.busy = true;
			trace!("Vector field initialisation at {:?}", stage);
		}
		Err(e) => {
			error!("Vector field initialisation failed: {}", e);
			commands.remove_resource::<StagedInitialiser>();
			progress.busy = false;
		}
	}
}

/// Push runtime tunable options into the engine when the settings change
#[cfg(not(tarpaulin_include))]
pub fn apply_settings(settings: Res<FlowFieldSettings>, mut engine: ResMut<VectorFieldEngine>) {
	if !settings.is_changed() || engine.is_added() {
		return;
	}
	let config = settings.get();
	let tuning = RuntimeTuning {
		frame_budget_ms: Some(config.scheduler.frame_budget_ms),
		weights: Some(config.scheduler.weights),
		falloff_rate: Some(config.propagation.falloff_rate),
		stages_per_level: Some(config.propagation.stages_per_level),
		cache_update_interval_secs: Some(config.storage.cache_update_interval_secs),
	};
	if let Err(e) = engine.apply_tuning(tuning) {
		warn!("Rejected vector field settings: {}", e);
	}
}

/// Rebuild the navigability when the [SurfaceGeometrySource] changes after
/// the engine was built
#[cfg(not(tarpaulin_include))]
pub fn rebuild_on_source_change(
	source: Option<Res<SurfaceGeometrySource>>,
	mut engine: ResMut<VectorFieldEngine>,
) {
	let Some(source) = source else {
		return;
	};
	if !source.is_changed() || engine.is_added() {
		return;
	}
	match source.as_ref() {
		SurfaceGeometrySource::Geometry(geometry) => {
			if let Err(e) = engine.rebuild_navigability(geometry) {
				error!("Navigability rebuild failed, keeping the previous surface: {}", e);
			}
		}
		SurfaceGeometrySource::Hierarchy(hierarchy) => engine.replace_hierarchy(hierarchy.clone()),
	}
}

/// Process dirty chunks within the configured frame budget
#[cfg(not(tarpaulin_include))]
pub fn tick_scheduler(mut engine: ResMut<VectorFieldEngine>) {
	let budget = engine.get_config().scheduler.frame_budget_ms;
	let report = engine.tick(budget);
	if report.elapsed_ms > budget * 2.0 {
		debug!(
			"Tick overran its {:.2}ms budget, took {:.2}ms for {} chunks",
			budget, report.elapsed_ms, report.processed
		);
	}
}

/// Advance the host mirror and query cache timers
#[cfg(not(tarpaulin_include))]
pub fn refresh_caches(mut engine: ResMut<VectorFieldEngine>, time: Res<Time>) {
	engine.update_caches(time.delta_secs());
}

/// Mirror the engine's progress into [FieldProgress]
#[cfg(not(tarpaulin_include))]
pub fn publish_progress(
	engine: Option<Res<VectorFieldEngine>>,
	mut progress: ResMut<FieldProgress>,
) {
	if let Some(engine) = engine {
		let next = FieldProgress {
			fraction: engine.progress(),
			busy: engine.is_busy(),
			ready: true,
		};
		// avoid triggering change detection every frame
		progress.set_if_neq(next);
	}
}
