//! Inbound updates from gameplay: targets, dynamic obstacles and agents
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Replace every target of the vector field
#[derive(Event, Clone, Debug)]
pub struct EventSetTargets {
	/// World positions of the new targets
	targets: Vec<Vec2>,
}

impl EventSetTargets {
	/// Create a new instance of [EventSetTargets]
	pub fn new(targets: Vec<Vec2>) -> Self {
		EventSetTargets { targets }
	}
	/// World positions of the new targets
	pub fn get_targets(&self) -> &[Vec2] {
		&self.targets
	}
}

/// Activate or deactivate a known target by its identifier
#[derive(Event, Clone, Copy, Debug)]
pub struct EventToggleTarget {
	/// Identifier handed out when the target was set
	id: u32,
	/// Should the target seed and bias the field
	active: bool,
}

impl EventToggleTarget {
	/// Create a new instance of [EventToggleTarget]
	pub fn new(id: u32, active: bool) -> Self {
		EventToggleTarget { id, active }
	}
	/// Identifier of the target
	#[cfg(not(tarpaulin_include))]
	pub fn get_id(&self) -> u32 {
		self.id
	}
	/// Requested activity
	#[cfg(not(tarpaulin_include))]
	pub fn is_active(&self) -> bool {
		self.active
	}
}

/// An area disturbed by a dynamic obstacle, its chunks are recomputed
#[derive(Event, Clone, Copy, Debug)]
pub struct EventMarkDirty {
	/// Centre of the area
	position: Vec2,
	/// World-space radius of the area
	radius: f32,
}

impl EventMarkDirty {
	/// Create a new instance of [EventMarkDirty]
	pub fn new(position: Vec2, radius: f32) -> Self {
		EventMarkDirty { position, radius }
	}
	/// Centre of the area
	#[cfg(not(tarpaulin_include))]
	pub fn get_position(&self) -> Vec2 {
		self.position
	}
	/// Radius of the area
	#[cfg(not(tarpaulin_include))]
	pub fn get_radius(&self) -> f32 {
		self.radius
	}
}

/// Marks an entity as an agent steering by the vector field. Its position
/// and importance feed the chunk priorities
#[derive(Component, Clone, Copy, Debug, PartialEq, Reflect)]
#[reflect(Component)]
pub struct FlowFieldAgent {
	/// World-space position, kept in sync by the owner of the entity
	pub position: Vec2,
	/// How much the agent cares about precise guidance
	pub importance: f32,
}

impl Default for FlowFieldAgent {
	fn default() -> Self {
		FlowFieldAgent {
			position: Vec2::ZERO,
			importance: 1.0,
		}
	}
}

impl FlowFieldAgent {
	/// Create a new instance of [FlowFieldAgent]
	pub fn new(position: Vec2, importance: f32) -> Self {
		FlowFieldAgent {
			position,
			importance,
		}
	}
}

impl NavigationAgent for FlowFieldAgent {
	fn position(&self) -> Vec2 {
		self.position
	}
	fn importance(&self) -> f32 {
		self.importance
	}
}

/// Remember the most recent [EventSetTargets] until the engine can take
/// it, events sent while the engine is still initialising would otherwise
/// expire
#[cfg(not(tarpaulin_include))]
pub fn buffer_targets(mut events: EventReader<EventSetTargets>, mut commands: Commands) {
	// only the last request of a frame matters
	if let Some(event) = events.read().last() {
		commands.insert_resource(QueuedTargets(event.get_targets().to_vec()));
	}
}

/// Target set waiting to be pushed into the engine
#[derive(Resource, Debug)]
pub struct QueuedTargets(Vec<Vec2>);

/// Push the queued target set into the engine
#[cfg(not(tarpaulin_include))]
pub fn process_set_targets(
	queued: Option<Res<QueuedTargets>>,
	mut engine: ResMut<VectorFieldEngine>,
	mut commands: Commands,
) {
	if let Some(queued) = queued {
		let ids = engine.set_targets(&queued.0);
		info!("Vector field targets set, ids {:?}", ids);
		commands.remove_resource::<QueuedTargets>();
	}
}

/// Read [EventToggleTarget] and change the activity of targets
#[cfg(not(tarpaulin_include))]
pub fn process_toggle_targets(
	mut events: EventReader<EventToggleTarget>,
	mut engine: ResMut<VectorFieldEngine>,
) {
	for event in events.read() {
		if event.is_active() {
			engine.activate_target(event.get_id());
		} else {
			engine.deactivate_target(event.get_id());
		}
	}
}

/// Read [EventMarkDirty] and dirty the chunks of each area
#[cfg(not(tarpaulin_include))]
pub fn process_mark_dirty(
	mut events: EventReader<EventMarkDirty>,
	mut engine: ResMut<VectorFieldEngine>,
) {
	for event in events.read() {
		engine.mark_dirty(event.get_position(), event.get_radius());
	}
}

/// Register new agents and report moved ones. When the engine has only just
/// been inserted every agent is registered
#[cfg(not(tarpaulin_include))]
pub fn sync_agents(
	mut engine: ResMut<VectorFieldEngine>,
	all: Query<(Entity, &FlowFieldAgent)>,
	changed: Query<(Entity, &FlowFieldAgent), Changed<FlowFieldAgent>>,
) {
	if engine.is_added() {
		for (entity, agent) in all.iter() {
			engine.register_agent(AgentId::from(entity), agent);
		}
	} else {
		for (entity, agent) in changed.iter() {
			engine.update_agent(AgentId::from(entity), agent);
		}
	}
}

/// Forget agents whose component was removed or whose entity despawned
#[cfg(not(tarpaulin_include))]
pub fn remove_agents(
	mut removed: RemovedComponents<FlowFieldAgent>,
	mut engine: ResMut<VectorFieldEngine>,
) {
	for entity in removed.read() {
		engine.unregister_agent(AgentId::from(entity));
	}
}
