//! Measure relaxing every level of a world of walls where guidance has to snake
//! around a series of gaps (hence maze)
//!
//! World is a 256x256 base grid, 4 levels, target in the bottom left
//!

use bevy::prelude::*;
use bevy_flowfield_mipmap_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Vertical walls every 16 columns, each with a 4 pixel gap alternating
/// between the top and bottom of the world
fn prepare_fields() -> (NavigabilityHierarchy, FieldStorage, PropagationEngine) {
	let size = 256;
	let mut base = NavigabilityLevel::new_navigable(0, size, size);
	for (i, column) in (8..size).step_by(16).enumerate() {
		let gap = if i % 2 == 0 { 0..4 } else { size - 4..size };
		for row in 0..size {
			if !gap.contains(&row) {
				base.set_field_cell_value(false, FieldCell::new(column, row));
			}
		}
	}
	let hierarchy =
		NavigabilityHierarchy::from_base_level(base, Vec2::ZERO, Vec2::splat(256.0), 4).unwrap();
	let mut storage = FieldStorage::new(StorageConfig::default(), &hierarchy);
	let mut propagation = PropagationEngine::new(PropagationConfig::default());
	propagation.set_targets(
		storage.get_levels_mut(),
		&hierarchy,
		&[Vec2::new(2.0, 2.0)],
		1.0,
	);
	(hierarchy, storage, propagation)
}

/// Relax each level for a generous number of stages
fn propagate_maze(
	hierarchy: &NavigabilityHierarchy,
	mut storage: FieldStorage,
	propagation: &PropagationEngine,
) {
	let falloff = propagation.get_config().falloff_rate;
	for (level, nav) in hierarchy.get_levels().iter().enumerate() {
		propagation.propagate(&mut storage.get_levels_mut()[level], nav, falloff, 32);
	}
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("algorithm_use");
	group.significance_level(0.05).sample_size(100);
	let (hierarchy, storage, propagation) = prepare_fields();
	group.bench_function("propagate_maze", |b| {
		b.iter(|| {
			propagate_maze(
				black_box(&hierarchy),
				black_box(storage.clone()),
				black_box(&propagation),
			)
		})
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
