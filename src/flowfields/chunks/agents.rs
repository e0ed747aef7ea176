//! Registered agents feed the agent-density term of chunk priorities. Each
//! agent is bucketed into the chunk containing it and contributes its
//! importance to that chunk's density
//!

use std::collections::BTreeMap;

use crate::prelude::*;
use bevy::prelude::*;

/// Minimal capability an agent offers the vector field
pub trait NavigationAgent {
	/// World-space position
	fn position(&self) -> Vec2;
	/// How much the agent cares about precise guidance, `1.0` is typical
	fn importance(&self) -> f32 {
		1.0
	}
}

/// Unique ID of a registered agent
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct AgentId(u64);

impl AgentId {
	/// Create a new instance of [AgentId]
	pub fn new(id: u64) -> Self {
		AgentId(id)
	}
	/// Get the raw id
	pub fn get(&self) -> u64 {
		self.0
	}
}

impl From<Entity> for AgentId {
	fn from(entity: Entity) -> Self {
		AgentId(entity.to_bits())
	}
}

/// Bookkeeping of a registered agent
#[derive(Clone, Copy, Debug, PartialEq)]
struct AgentEntry {
	/// Last reported position
	position: Vec2,
	/// Last reported importance
	importance: f32,
	/// Index of the chunk the agent is bucketed into
	chunk: usize,
}

/// Every registered agent and the summed importance per chunk
#[derive(Clone, Debug, Default)]
pub struct AgentRegistry {
	/// Registered agents
	agents: BTreeMap<AgentId, AgentEntry>,
	/// Summed importance of the agents inside each chunk
	density: Vec<f32>,
	/// Set whenever a density changes, cleared by [AgentRegistry::take_density_changed]
	density_changed: bool,
}

impl AgentRegistry {
	/// Create an empty registry sized for a tiling
	pub fn new(grid: &ChunkGrid) -> Self {
		AgentRegistry {
			agents: BTreeMap::new(),
			density: vec![0.0; grid.len()],
			density_changed: false,
		}
	}
	/// Register an agent, or update it if already known
	pub fn register(&mut self, id: AgentId, agent: &impl NavigationAgent, grid: &ChunkGrid) {
		self.register_at(id, agent.position(), agent.importance(), grid);
	}
	/// Register an agent from its raw position and importance, or update it
	/// if already known
	pub fn register_at(&mut self, id: AgentId, position: Vec2, importance: f32, grid: &ChunkGrid) {
		let importance = if importance.is_finite() {
			importance.max(0.0)
		} else {
			warn!("Agent {:?} reported a non-finite importance, using 1.0", id);
			1.0
		};
		let chunk = grid.get_chunk_index(position);
		if let Some(previous) = self.agents.insert(
			id,
			AgentEntry {
				position,
				importance,
				chunk,
			},
		) {
			if previous.chunk == chunk && previous.importance == importance {
				return;
			}
			self.remove_density(previous.chunk, previous.importance);
		}
		if let Some(d) = self.density.get_mut(chunk) {
			*d += importance;
		}
		self.density_changed = true;
	}
	/// Update the position and importance of a registered agent, unknown
	/// agents are registered
	pub fn update(&mut self, id: AgentId, agent: &impl NavigationAgent, grid: &ChunkGrid) {
		self.register(id, agent, grid);
	}
	/// Forget an agent, returns `false` if it was not registered
	pub fn unregister(&mut self, id: AgentId) -> bool {
		match self.agents.remove(&id) {
			Some(entry) => {
				self.remove_density(entry.chunk, entry.importance);
				self.density_changed = true;
				true
			}
			None => false,
		}
	}
	/// Subtract an agent's contribution from a chunk
	fn remove_density(&mut self, chunk: usize, importance: f32) {
		if let Some(d) = self.density.get_mut(chunk) {
			*d = (*d - importance).max(0.0);
		}
	}
	/// Summed importance of the agents inside a chunk
	pub fn get_density(&self, chunk: usize) -> f32 {
		self.density.get(chunk).copied().unwrap_or(0.0)
	}
	/// Number of registered agents
	pub fn len(&self) -> usize {
		self.agents.len()
	}
	/// Are there no registered agents
	pub fn is_empty(&self) -> bool {
		self.agents.is_empty()
	}
	/// Last reported position of an agent
	pub fn get_position(&self, id: AgentId) -> Option<Vec2> {
		self.agents.get(&id).map(|e| e.position)
	}
	/// Report and reset whether any density changed
	pub fn take_density_changed(&mut self) -> bool {
		std::mem::take(&mut self.density_changed)
	}
	/// Re-bucket every agent into a new tiling
	pub fn rebucket(&mut self, grid: &ChunkGrid) {
		self.density = vec![0.0; grid.len()];
		for entry in self.agents.values_mut() {
			entry.chunk = grid.get_chunk_index(entry.position);
			if let Some(d) = self.density.get_mut(entry.chunk) {
				*d += entry.importance;
			}
		}
		self.density_changed = true;
	}
}
