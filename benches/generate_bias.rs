//! Measure junction detection and generation of the bias field
//!
//! World is a 512x512 base grid crossed by a lattice of corridors, 5 levels
//!

use bevy::prelude::*;
use bevy_flowfield_mipmap_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Corridors 8 pixels wide every 64 pixels in both axes, giving plenty of
/// junctions
fn prepare_hierarchy() -> NavigabilityHierarchy {
	let size = 512;
	let mut base = NavigabilityLevel::new(0, size, size);
	for row in 0..size {
		for column in 0..size {
			if column % 64 < 8 || row % 64 < 8 {
				base.set_field_cell_value(true, FieldCell::new(column, row));
			}
		}
	}
	NavigabilityHierarchy::from_base_level(base, Vec2::ZERO, Vec2::splat(512.0), 5).unwrap()
}

/// Detect the junctions then generate the bias field around a few targets
fn generate_bias(hierarchy: &NavigabilityHierarchy) {
	let mut bias = BiasEstimator::new(BiasConfig::default(), *hierarchy.get_map_dimensions());
	bias.detect_junctions(hierarchy);
	bias.set_targets(&[
		Vec2::new(68.0, 68.0),
		Vec2::new(260.0, 4.0),
		Vec2::new(452.0, 452.0),
	]);
	let _field = bias.generate_bias_field();
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("data_initialisation");
	group.significance_level(0.05).sample_size(100);
	let hierarchy = prepare_hierarchy();
	group.bench_function("generate_bias", |b| {
		b.iter(|| generate_bias(black_box(&hierarchy)))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
