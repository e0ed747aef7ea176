//! Measure rasterising a surface and downsampling it into a navigability hierarchy
//!
//! World is a 1024x1024 base grid over a ring of rectangles, 6 levels
//!

use bevy::prelude::*;
use bevy_flowfield_mipmap_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Four corridors forming a square ring with an open courtyard in the middle
fn prepare_geometry() -> SurfaceGeometry {
	let mut geometry = SurfaceGeometry::rectangle(Vec2::ZERO, Vec2::new(1000.0, 100.0));
	geometry.append(&SurfaceGeometry::rectangle(
		Vec2::new(0.0, 900.0),
		Vec2::new(1000.0, 1000.0),
	));
	geometry.append(&SurfaceGeometry::rectangle(
		Vec2::new(0.0, 100.0),
		Vec2::new(100.0, 900.0),
	));
	geometry.append(&SurfaceGeometry::rectangle(
		Vec2::new(900.0, 100.0),
		Vec2::new(1000.0, 900.0),
	));
	geometry.append(&SurfaceGeometry::rectangle(
		Vec2::new(300.0, 300.0),
		Vec2::new(700.0, 700.0),
	));
	geometry
}

/// Build the hierarchy
fn build_hierarchy(geometry: &SurfaceGeometry, base: usize, levels: usize) {
	let _hierarchy = NavigabilityHierarchy::build(geometry, base, base, levels).unwrap();
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("data_initialisation");
	group.significance_level(0.05).sample_size(100);
	let geometry = prepare_geometry();
	group.bench_function("build_hierarchy", |b| {
		b.iter(|| build_hierarchy(black_box(&geometry), black_box(1024), black_box(6)))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
