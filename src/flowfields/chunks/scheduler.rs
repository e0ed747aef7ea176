//! The chunk scheduler paces the expensive recomputation of the vector
//! field across frames.
//!
//! Chunks are marked dirty when targets change, when an area is disturbed
//! by a dynamic obstacle, or when the scheduler is initialised. Each tick
//! queues the dirty chunks with a freshly computed priority and then
//! processes the highest priority chunks until the queue empties, the
//! per-tick chunk cap is reached or the frame budget is spent. A chunk is
//! never interrupted part way through so a tick may overrun its budget by at
//! most one chunk.
//!
//! Priority is a weighted sum of the importance of agents inside the chunk,
//! the proximity of the nearest target, the time since the chunk was last
//! processed and the bias at its centre. The whole queue is only re-sorted
//! every few ticks (or when agent density changes), newly dirtied chunks
//! join with a fresh priority and may jump ahead.
//!
//! A chunk only relaxes its own pixels plus a small margin, so signal
//! enters it only through neighbours that already hold some. When
//! processing a chunk reaches cells that held no signal before, it and its
//! neighbouring chunks are dirtied again and the front keeps advancing
//! outward regardless of the order the priorities imposed. A chunk
//! processed ahead of the front is revisited once the front arrives.
//!
//! The cap on chunks per tick adapts from a rolling average of the time a
//! chunk takes: it drops by a bounded step whenever a tick overruns and
//! grows by the same step only when the budget comfortably fits one more
//! step's worth of chunks
//!

use std::collections::{BinaryHeap, VecDeque};
use std::time::{Duration, Instant};

use crate::prelude::*;
use bevy::prelude::*;

/// Fraction of the budget a tick must stay under before the cap may grow
pub const CAP_HEADROOM: f64 = 0.75;

/// Lifecycle of the scheduler
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Reflect)]
pub enum SchedulerState {
	/// No tiling exists yet
	#[default]
	Uninitialized,
	/// Tiled, no tick has run yet
	Ready,
	/// The queue is empty and nothing is dirty
	Idle,
	/// Chunks are waiting to be processed
	Processing,
}

/// What processing a chunk did to the field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
	/// Nothing new was reached, the neighbours are unaffected
	Settled,
	/// Cells without signal gained some, the chunk and its neighbours need
	/// another pass to carry it further
	Spread,
}

/// Work performed on a chunk when it reaches the front of the queue
pub trait ChunkProcessor {
	/// Recompute the field of a chunk
	fn process_chunk(&mut self, chunk: &Chunk) -> Result<ChunkOutcome, FlowFieldError>;
	/// Bias at a world position scaled into `[0, 1]`, feeds the bias term of
	/// the priority formula
	fn sample_normalised_bias(&mut self, _position: Vec2) -> f32 {
		0.0
	}
}

/// Source of monotonic time for budgeting a tick
pub trait FrameClock {
	/// Time elapsed since some fixed origin
	fn now(&self) -> Duration;
}

/// [FrameClock] reading the wall clock
#[derive(Clone, Copy, Debug)]
pub struct InstantClock {
	/// Origin of the clock
	origin: Instant,
}

impl Default for InstantClock {
	fn default() -> Self {
		InstantClock {
			origin: Instant::now(),
		}
	}
}

impl FrameClock for InstantClock {
	fn now(&self) -> Duration {
		self.origin.elapsed()
	}
}

/// Entry of the priority queue
#[derive(Clone, Copy, Debug)]
pub struct PriorityQueueEntry {
	/// Higher is processed first
	priority: f32,
	/// Index of the chunk in the tiling
	chunk: usize,
	/// Entries whose generation no longer matches the chunk are stale
	generation: u64,
}

impl PriorityQueueEntry {
	/// Priority of the entry
	pub fn get_priority(&self) -> f32 {
		self.priority
	}
	/// Index of the chunk
	pub fn get_chunk(&self) -> usize {
		self.chunk
	}
}

// ties are broken by the lower chunk index so the order is deterministic
impl Ord for PriorityQueueEntry {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.priority
			.total_cmp(&other.priority)
			.then_with(|| other.chunk.cmp(&self.chunk))
			.then_with(|| self.generation.cmp(&other.generation))
	}
}

impl PartialOrd for PriorityQueueEntry {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for PriorityQueueEntry {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == std::cmp::Ordering::Equal
	}
}
impl Eq for PriorityQueueEntry {}

/// Outcome of a single tick
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect)]
pub struct TickReport {
	/// Chunks processed during the tick
	pub processed: usize,
	/// Wall time the tick took
	pub elapsed_ms: f64,
	/// Chunks still waiting afterwards
	pub remaining: usize,
	/// Chunk cap in force for the next tick
	pub cap: usize,
}

/// Scheduling state of a single chunk
#[derive(Clone, Copy, Debug, Default)]
struct ChunkState {
	/// Needs processing
	dirty: bool,
	/// Has a live entry in the queue
	queued: bool,
	/// Matches the generation of the live queue entry
	generation: u64,
	/// When the chunk was last processed
	last_update: Option<Duration>,
}

/// Frame budgeted, priority ordered processing of chunks
#[derive(Clone, Debug)]
pub struct ChunkScheduler {
	/// Options
	config: SchedulerConfig,
	/// Lifecycle
	state: SchedulerState,
	/// Tiling of the base level
	grid: Option<ChunkGrid>,
	/// Per chunk state, indexed like the tiling
	chunk_states: Vec<ChunkState>,
	/// Highest priority first
	queue: BinaryHeap<PriorityQueueEntry>,
	/// Positions of the current targets
	targets: Vec<Vec2>,
	/// Registered agents and their density
	agents: AgentRegistry,
	/// Adaptive cap on chunks per tick
	cap: usize,
	/// Rolling window of per-chunk processing times in milliseconds
	timings: VecDeque<f64>,
	/// Ticks since the queue was last re-sorted
	ticks_since_resort: u32,
}

impl ChunkScheduler {
	/// Create an uninitialised scheduler
	pub fn new(config: SchedulerConfig) -> Self {
		let cap = config
			.initial_chunks_per_tick
			.clamp(1, config.max_chunks_per_tick.max(1));
		ChunkScheduler {
			config,
			state: SchedulerState::Uninitialized,
			grid: None,
			chunk_states: Vec::new(),
			queue: BinaryHeap::new(),
			targets: Vec::new(),
			agents: AgentRegistry::default(),
			cap,
			timings: VecDeque::new(),
			ticks_since_resort: 0,
		}
	}
	/// Tile the base level into chunks and mark every chunk dirty. Agents
	/// already registered are re-bucketed into the new tiling
	pub fn initialize(&mut self, dimensions: &MapDimensions) {
		let grid = ChunkGrid::new(dimensions, self.config.chunk_size);
		self.chunk_states = vec![
			ChunkState {
				dirty: true,
				..Default::default()
			};
			grid.len()
		];
		self.queue.clear();
		self.agents.rebucket(&grid);
		self.grid = Some(grid);
		self.ticks_since_resort = 0;
		self.state = SchedulerState::Ready;
	}
	/// Get the options
	pub fn get_config(&self) -> &SchedulerConfig {
		&self.config
	}
	/// Replace the frame budget used by default
	pub fn set_frame_budget_ms(&mut self, budget_ms: f64) {
		self.config.frame_budget_ms = budget_ms;
	}
	/// Replace the priority weights, queued chunks pick them up at the next
	/// re-sort
	pub fn set_weights(&mut self, weights: PriorityWeights) {
		self.config.weights = weights;
	}
	/// Lifecycle state
	pub fn get_state(&self) -> SchedulerState {
		self.state
	}
	/// Current chunk cap
	pub fn get_cap(&self) -> usize {
		self.cap
	}
	/// Tiling, [None] until initialised
	pub fn get_grid(&self) -> Option<&ChunkGrid> {
		self.grid.as_ref()
	}
	/// Registered agents
	pub fn get_agents(&self) -> &AgentRegistry {
		&self.agents
	}
	/// Positions of the current targets
	pub fn get_targets(&self) -> &[Vec2] {
		&self.targets
	}
	/// Rolling average of the time one chunk takes
	pub fn get_average_chunk_ms(&self) -> f64 {
		if self.timings.is_empty() {
			0.0
		} else {
			self.timings.iter().sum::<f64>() / self.timings.len() as f64
		}
	}
	/// Record new targets and dirty every chunk within the configured radius
	/// of each
	pub fn set_targets(&mut self, positions: &[Vec2]) {
		self.targets = positions.to_vec();
		let radius = self.config.target_dirty_radius;
		for position in positions.iter() {
			self.mark_dirty(*position, radius);
		}
	}
	/// Dirty every chunk within `radius` of a world position, a chunk
	/// already queued re-joins with a fresh priority at the next tick
	pub fn mark_dirty(&mut self, position: Vec2, radius: f32) {
		let Some(grid) = &self.grid else {
			warn!("Chunks marked dirty before the scheduler was initialised");
			return;
		};
		for index in grid.get_chunks_within(position, radius) {
			let state = &mut self.chunk_states[index];
			state.dirty = true;
			// invalidate any queued entry
			state.queued = false;
			state.generation += 1;
		}
	}
	/// Dirty every chunk
	pub fn mark_all_dirty(&mut self) {
		for state in self.chunk_states.iter_mut() {
			state.dirty = true;
			state.queued = false;
			state.generation += 1;
		}
	}
	/// Register an agent, or update it if already known
	pub fn register_agent(&mut self, id: AgentId, agent: &impl NavigationAgent) {
		match &self.grid {
			Some(grid) => self.agents.register(id, agent, grid),
			None => warn!("Agent {:?} registered before the scheduler was initialised", id),
		}
	}
	/// Update a registered agent
	pub fn update_agent(&mut self, id: AgentId, agent: &impl NavigationAgent) {
		self.register_agent(id, agent);
	}
	/// Forget an agent
	pub fn unregister_agent(&mut self, id: AgentId) -> bool {
		self.agents.unregister(id)
	}
	/// Number of chunks waiting, queued or dirty
	pub fn get_remaining(&self) -> usize {
		self.chunk_states.iter().filter(|s| s.dirty).count()
	}
	/// Fraction of chunks that are up to date, `1.0` when nothing is waiting
	pub fn progress(&self) -> f32 {
		let total = self.chunk_states.len();
		if total == 0 {
			return if self.state == SchedulerState::Uninitialized {
				0.0
			} else {
				1.0
			};
		}
		(total - self.get_remaining()) as f32 / total as f32
	}
	/// Are chunks waiting to be processed
	pub fn is_busy(&self) -> bool {
		self.get_remaining() > 0
	}
	/// Priority of a chunk at time `now`
	fn priority(
		&self,
		grid: &ChunkGrid,
		index: usize,
		now: Duration,
		processor: &mut impl ChunkProcessor,
	) -> f32 {
		let weights = &self.config.weights;
		let centre = grid.get_chunks()[index].get_world_centre();
		let density = self.agents.get_density(index);
		let proximity = self
			.targets
			.iter()
			.map(|t| t.distance(centre))
			.reduce(f32::min)
			.map(|d| 1.0 / (1.0 + d / grid.get_chunk_extent().max(f32::EPSILON)))
			.unwrap_or(0.0);
		let max_staleness = self.config.max_staleness_secs;
		let since = match self.chunk_states[index].last_update {
			Some(last) => now.saturating_sub(last).as_secs_f32(),
			None => max_staleness,
		};
		let staleness = since.min(max_staleness) / max_staleness;
		let bias = processor.sample_normalised_bias(centre).clamp(0.0, 1.0);
		weights.agent_density * density
			+ weights.target_proximity * proximity
			+ weights.staleness * staleness
			+ weights.bias * bias
	}
	/// Recompute the priority of every queued chunk
	fn resort(&mut self, now: Duration, processor: &mut impl ChunkProcessor) {
		let Some(grid) = self.grid.take() else {
			return;
		};
		let mut entries: Vec<PriorityQueueEntry> = self.queue.drain().collect();
		entries.retain(|e| {
			let s = &self.chunk_states[e.chunk];
			s.queued && s.generation == e.generation
		});
		for entry in entries.iter_mut() {
			entry.priority = self.priority(&grid, entry.chunk, now, processor);
		}
		self.queue = BinaryHeap::from(entries);
		self.grid = Some(grid);
		trace!("Re-sorted {} queued chunks", self.queue.len());
	}
	/// Queue every dirty chunk without a live entry
	fn enqueue_dirty(&mut self, now: Duration, processor: &mut impl ChunkProcessor) {
		let Some(grid) = self.grid.take() else {
			return;
		};
		for index in 0..self.chunk_states.len() {
			let state = self.chunk_states[index];
			if state.dirty && !state.queued {
				let priority = self.priority(&grid, index, now, processor);
				self.chunk_states[index].queued = true;
				self.queue.push(PriorityQueueEntry {
					priority,
					chunk: index,
					generation: state.generation,
				});
			}
		}
		self.grid = Some(grid);
	}
	/// Process the highest priority chunks until the queue empties, the cap
	/// is reached or `budget_ms` of wall time has passed
	pub fn tick(
		&mut self,
		budget_ms: f64,
		processor: &mut impl ChunkProcessor,
		clock: &impl FrameClock,
	) -> TickReport {
		if self.state == SchedulerState::Uninitialized {
			warn!("Scheduler ticked before initialisation");
			return TickReport {
				cap: self.cap,
				..Default::default()
			};
		}
		let start = clock.now();
		self.ticks_since_resort += 1;
		let density_changed = self.agents.take_density_changed();
		if density_changed || self.ticks_since_resort >= self.config.resort_interval_ticks {
			self.resort(start, processor);
			self.ticks_since_resort = 0;
		}
		self.enqueue_dirty(start, processor);
		let mut processed = 0;
		let mut cap_limited = false;
		loop {
			let elapsed_ms = clock.now().saturating_sub(start).as_secs_f64() * 1000.0;
			if elapsed_ms >= budget_ms {
				break;
			}
			if processed >= self.cap {
				cap_limited = !self.queue.is_empty();
				break;
			}
			let Some(entry) = self.queue.pop() else {
				break;
			};
			let state = self.chunk_states[entry.chunk];
			if !state.queued || state.generation != entry.generation {
				// superseded by a newer entry
				continue;
			}
			let Some(chunk) = self.grid.as_ref().and_then(|g| g.get_chunk(entry.chunk)).copied()
			else {
				continue;
			};
			let chunk_start = clock.now();
			let outcome = match processor.process_chunk(&chunk) {
				Ok(outcome) => outcome,
				Err(e) => {
					error!("Processing chunk {:?} failed: {}", chunk.get_id(), e);
					ChunkOutcome::Settled
				}
			};
			let chunk_end = clock.now();
			self.record_timing(chunk_end.saturating_sub(chunk_start).as_secs_f64() * 1000.0);
			let state = &mut self.chunk_states[entry.chunk];
			// a chunk dirtied during its own processing stays dirty
			if state.generation == entry.generation {
				state.dirty = false;
			}
			state.queued = false;
			state.last_update = Some(chunk_end);
			if outcome == ChunkOutcome::Spread {
				self.carry_front(entry.chunk);
			}
			processed += 1;
		}
		let elapsed_ms = clock.now().saturating_sub(start).as_secs_f64() * 1000.0;
		self.adapt_cap(elapsed_ms, budget_ms, cap_limited);
		let remaining = self.get_remaining();
		self.state = if remaining > 0 {
			SchedulerState::Processing
		} else {
			SchedulerState::Idle
		};
		TickReport {
			processed,
			elapsed_ms,
			remaining,
			cap: self.cap,
		}
	}
	/// Dirty the chunk at `index` and the chunks touching it so the signal it
	/// gained is carried on. The chunk itself is revisited until a pass
	/// reaches nothing new
	fn carry_front(&mut self, index: usize) {
		let mut neighbours = match &self.grid {
			Some(grid) => grid.get_neighbours(index),
			None => return,
		};
		neighbours.push(index);
		for neighbour in neighbours {
			let state = &mut self.chunk_states[neighbour];
			state.dirty = true;
			state.queued = false;
			state.generation += 1;
		}
	}
	/// Push a chunk timing into the rolling window
	fn record_timing(&mut self, ms: f64) {
		self.timings.push_back(ms);
		while self.timings.len() > self.config.timing_window.max(1) {
			self.timings.pop_front();
		}
	}
	/// Shrink the cap after an overrun, grow it when the tick was held back
	/// by the cap yet the budget could afford another step of chunks
	fn adapt_cap(&mut self, elapsed_ms: f64, budget_ms: f64, cap_limited: bool) {
		let step = self.config.cap_adjust_step.max(1);
		let ceiling = self.config.max_chunks_per_tick.max(1);
		let previous = self.cap;
		if elapsed_ms > budget_ms {
			self.cap = self.cap.saturating_sub(step).max(1);
		} else if cap_limited && elapsed_ms < budget_ms * CAP_HEADROOM {
			let average = self.get_average_chunk_ms();
			if (self.cap + step) as f64 * average <= budget_ms {
				self.cap = (self.cap + step).min(ceiling);
			}
		}
		if self.cap != previous {
			debug!(
				"Chunk cap {} -> {} (tick {:.2}ms of {:.2}ms, average chunk {:.3}ms)",
				previous,
				self.cap,
				elapsed_ms,
				budget_ms,
				self.get_average_chunk_ms()
			);
		}
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::{Cell, RefCell};
	use std::rc::Rc;

	/// Clock advanced by hand
	#[derive(Clone, Default)]
	struct FakeClock(Rc<Cell<Duration>>);
	impl FrameClock for FakeClock {
		fn now(&self) -> Duration {
			self.0.get()
		}
	}
	/// Records processed chunks and advances the clock by a fixed cost
	struct StubProcessor {
		clock: FakeClock,
		cost: Duration,
		order: Rc<RefCell<Vec<usize>>>,
		columns: usize,
		/// Chunk reporting newly reached cells the first time it is processed
		spreads_from: Option<usize>,
	}
	impl ChunkProcessor for StubProcessor {
		fn process_chunk(&mut self, chunk: &Chunk) -> Result<ChunkOutcome, FlowFieldError> {
			let id = chunk.get_id();
			let index = id.get_row() * self.columns + id.get_column();
			self.order.borrow_mut().push(index);
			self.clock.0.set(self.clock.0.get() + self.cost);
			if self.spreads_from == Some(index) {
				self.spreads_from = None;
				Ok(ChunkOutcome::Spread)
			} else {
				Ok(ChunkOutcome::Settled)
			}
		}
	}
	struct Walker(Vec2, f32);
	impl NavigationAgent for Walker {
		fn position(&self) -> Vec2 {
			self.0
		}
		fn importance(&self) -> f32 {
			self.1
		}
	}
	fn dims() -> MapDimensions {
		MapDimensions::new(Vec2::ZERO, Vec2::splat(64.0), 64, 64, 1).unwrap()
	}
	fn scheduler(initial_cap: usize) -> ChunkScheduler {
		let config = SchedulerConfig {
			chunk_size: 16,
			initial_chunks_per_tick: initial_cap,
			max_chunks_per_tick: 64,
			..Default::default()
		};
		let mut scheduler = ChunkScheduler::new(config);
		scheduler.initialize(&dims());
		scheduler
	}
	fn stub(cost_ms: u64) -> (StubProcessor, FakeClock, Rc<RefCell<Vec<usize>>>) {
		let clock = FakeClock::default();
		let order = Rc::new(RefCell::new(Vec::new()));
		(
			StubProcessor {
				clock: clock.clone(),
				cost: Duration::from_millis(cost_ms),
				order: order.clone(),
				columns: 4,
				spreads_from: None,
			},
			clock,
			order,
		)
	}
	#[test]
	fn lifecycle() {
		let mut scheduler = ChunkScheduler::new(SchedulerConfig::default());
		assert_eq!(SchedulerState::Uninitialized, scheduler.get_state());
		let (mut processor, clock, _) = stub(1);
		let report = scheduler.tick(8.0, &mut processor, &clock);
		assert_eq!(0, report.processed);
		scheduler.initialize(&dims());
		assert_eq!(SchedulerState::Ready, scheduler.get_state());
		assert!(scheduler.is_busy());
		assert_eq!(0.0, scheduler.progress());
	}
	#[test]
	fn frame_budget_respected() {
		let mut scheduler = scheduler(64);
		let (mut processor, clock, _) = stub(3);
		let report = scheduler.tick(8.0, &mut processor, &clock);
		// floor(8 / 3) plus the chunk in flight at the boundary
		assert_eq!(3, report.processed);
		assert_eq!(13, report.remaining);
		assert_eq!(SchedulerState::Processing, scheduler.get_state());
	}
	#[test]
	fn cap_limits_chunks() {
		let mut scheduler = scheduler(2);
		let (mut processor, clock, _) = stub(0);
		let report = scheduler.tick(8.0, &mut processor, &clock);
		assert_eq!(2, report.processed);
	}
	#[test]
	fn descending_priority_order() {
		let mut scheduler = scheduler(64);
		scheduler.set_weights(PriorityWeights {
			agent_density: 1.0,
			target_proximity: 0.0,
			staleness: 0.0,
			bias: 0.0,
		});
		// chunk 5 densest, then 10, then 3
		scheduler.register_agent(AgentId::new(1), &Walker(Vec2::new(20.0, 20.0), 5.0));
		scheduler.register_agent(AgentId::new(2), &Walker(Vec2::new(40.0, 40.0), 3.0));
		scheduler.register_agent(AgentId::new(3), &Walker(Vec2::new(60.0, 1.0), 1.0));
		let (mut processor, clock, order) = stub(0);
		let report = scheduler.tick(8.0, &mut processor, &clock);
		assert_eq!(16, report.processed);
		let order = order.borrow();
		assert_eq!(&[5, 10, 3], &order[0..3]);
		// equal priorities fall back to chunk order
		assert_eq!(&[0, 1, 2, 4], &order[3..7]);
		assert!(!scheduler.is_busy());
		assert_eq!(1.0, scheduler.progress());
		assert_eq!(SchedulerState::Idle, scheduler.get_state());
	}
	#[test]
	fn target_proximity_jumps_the_queue() {
		let mut scheduler = scheduler(1);
		let (mut processor, clock, order) = stub(0);
		scheduler.set_targets(&[Vec2::new(56.0, 56.0)]);
		scheduler.tick(8.0, &mut processor, &clock);
		assert_eq!(vec![15], *order.borrow());
	}
	#[test]
	fn marking_dirty_requeues() {
		let mut scheduler = scheduler(64);
		let (mut processor, clock, order) = stub(0);
		scheduler.tick(8.0, &mut processor, &clock);
		assert!(!scheduler.is_busy());
		order.borrow_mut().clear();
		scheduler.mark_dirty(Vec2::new(8.0, 8.0), 1.0);
		assert!(scheduler.is_busy());
		let report = scheduler.tick(8.0, &mut processor, &clock);
		assert_eq!(1, report.processed);
		assert_eq!(vec![0], *order.borrow());
	}
	#[test]
	fn spreading_chunk_dirties_itself_and_neighbours() {
		let mut scheduler = scheduler(64);
		let (mut processor, clock, order) = stub(0);
		processor.spreads_from = Some(5);
		let report = scheduler.tick(8.0, &mut processor, &clock);
		// 6, 8, 9 and 10 were still queued when 5 spread, their entries are
		// superseded
		assert_eq!(12, report.processed);
		assert_eq!(9, report.remaining);
		order.borrow_mut().clear();
		// the second visit to 5 settles
		let report = scheduler.tick(8.0, &mut processor, &clock);
		assert_eq!(9, report.processed);
		let mut revisited = order.borrow().clone();
		revisited.sort();
		assert_eq!(vec![0, 1, 2, 4, 5, 6, 8, 9, 10], revisited);
		assert!(!scheduler.is_busy());
	}
	#[test]
	fn cap_shrinks_after_overrun() {
		let mut scheduler = scheduler(4);
		let (mut processor, clock, _) = stub(10);
		let report = scheduler.tick(8.0, &mut processor, &clock);
		assert_eq!(1, report.processed);
		assert_eq!(3, report.cap);
	}
	#[test]
	fn cap_grows_with_headroom() {
		let mut scheduler = scheduler(2);
		let (mut processor, clock, _) = stub(1);
		let report = scheduler.tick(8.0, &mut processor, &clock);
		// 2 chunks took 2ms, well under 6ms, and 3 chunks fit in 8ms
		assert_eq!(2, report.processed);
		assert_eq!(3, report.cap);
	}
}
