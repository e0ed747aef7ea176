//! Defines the Bevy [Plugin] for the multi-resolution vector field
//!
//! The plugin reads a [SurfaceGeometrySource] resource, builds a
//! [VectorFieldEngine] one initialisation stage per frame and inserts it as
//! a resource once ready. From then on each frame ingests target, agent and
//! dirty-area updates, ticks the chunk scheduler within the frame budget and
//! refreshes the host mirrors
//!

use crate::prelude::*;
use bevy::prelude::*;

pub mod field_layer;
pub mod target_layer;

/// Ordering of the plugin's systems within a frame
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum OrderingSet {
	/// Staged construction of the engine
	Initialise,
	/// Targets, agents, dirty areas and surface changes
	Ingest,
	/// Frame budgeted chunk processing
	Calculate,
	/// Host mirror refresh and progress reporting
	Refresh,
}

/// Options of the vector field, changing them after the engine exists
/// applies the runtime tunable subset
#[derive(Resource, Clone, Debug, Default, Reflect)]
#[reflect(Resource)]
pub struct FlowFieldSettings(FlowFieldConfig);

impl FlowFieldSettings {
	/// Create a new instance of [FlowFieldSettings]
	pub fn new(config: FlowFieldConfig) -> Self {
		FlowFieldSettings(config)
	}
	/// Get the options
	pub fn get(&self) -> &FlowFieldConfig {
		&self.0
	}
	/// Get the options mutably
	pub fn get_mut(&mut self) -> &mut FlowFieldConfig {
		&mut self.0
	}
}

/// Where the navigable surface comes from. Replacing or mutating the
/// resource once the engine exists rebuilds the navigability
#[derive(Resource, Clone, Debug)]
pub enum SurfaceGeometrySource {
	/// Triangle soup rasterised at the configured base resolution
	Geometry(SurfaceGeometry),
	/// Ready made hierarchy
	Hierarchy(NavigabilityHierarchy),
}

/// Progress of the vector field for UI and telemetry
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Reflect)]
#[reflect(Resource)]
pub struct FieldProgress {
	/// Fraction of the chunks that are up to date, or of the initialisation
	/// stages completed while the engine is being built
	pub fraction: f32,
	/// Work is outstanding
	pub busy: bool,
	/// The engine exists
	pub ready: bool,
}

/// Generates and maintains a multi-resolution vector field guiding agents
/// toward dynamic targets
#[derive(Default)]
pub struct FlowFieldMipmapPlugin {
	/// Options the engine is built with
	pub config: FlowFieldConfig,
}

impl FlowFieldMipmapPlugin {
	/// Create the plugin with custom options
	pub fn new(config: FlowFieldConfig) -> Self {
		FlowFieldMipmapPlugin { config }
	}
}

impl Plugin for FlowFieldMipmapPlugin {
	#[cfg(not(tarpaulin_include))]
	fn build(&self, app: &mut App) {
		app.register_type::<Ordinal>()
			.register_type::<MapDimensions>()
			.register_type::<FieldCell>()
			.register_type::<ChunkID>()
			.register_type::<AgentId>()
			.register_type::<FlowSample>()
			.register_type::<TickReport>()
			.register_type::<FlowFieldConfig>()
			.register_type::<FlowFieldSettings>()
			.register_type::<FieldProgress>()
			.register_type::<target_layer::FlowFieldAgent>()
			.insert_resource(FlowFieldSettings::new(self.config.clone()))
			.init_resource::<FieldProgress>()
			.add_event::<target_layer::EventSetTargets>()
			.add_event::<target_layer::EventToggleTarget>()
			.add_event::<target_layer::EventMarkDirty>()
			.add_event::<field_layer::EventFieldReady>()
			.configure_sets(
				Update,
				(
					OrderingSet::Initialise,
					OrderingSet::Ingest,
					OrderingSet::Calculate,
					OrderingSet::Refresh,
				)
					.chain(),
			)
			.add_systems(
				Update,
				(
					(
						field_layer::begin_initialisation,
						field_layer::step_initialisation,
					)
						.chain()
						.in_set(OrderingSet::Initialise),
					(
						target_layer::buffer_targets,
						(
							field_layer::apply_settings,
							field_layer::rebuild_on_source_change,
							target_layer::process_set_targets,
							target_layer::process_toggle_targets,
							target_layer::process_mark_dirty,
							target_layer::sync_agents,
							target_layer::remove_agents,
						)
							.chain()
							.run_if(resource_exists::<VectorFieldEngine>),
					)
						.chain()
						.in_set(OrderingSet::Ingest),
					field_layer::tick_scheduler
						.run_if(resource_exists::<VectorFieldEngine>)
						.in_set(OrderingSet::Calculate),
					(
						field_layer::refresh_caches.run_if(resource_exists::<VectorFieldEngine>),
						field_layer::publish_progress,
					)
						.chain()
						.in_set(OrderingSet::Refresh),
				),
			);
	}
}
