//! Walkable surface geometry supplied as a triangle soup and its
//! rasterisation onto a pixel grid
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Triangles describing where actors may walk, positions are in world units
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceGeometry {
	/// Vertex positions
	vertices: Vec<Vec2>,
	/// Every three indices form a triangle
	indices: Vec<u32>,
	/// Explicit world bounds, when absent the padded extent of the vertices
	/// is used
	bounds: Option<(Vec2, Vec2)>,
}

impl SurfaceGeometry {
	/// Create a new instance of [SurfaceGeometry]
	pub fn new(vertices: Vec<Vec2>, indices: Vec<u32>) -> Self {
		SurfaceGeometry {
			vertices,
			indices,
			bounds: None,
		}
	}
	/// Use explicit world bounds rather than deriving them from the vertices
	pub fn with_bounds(mut self, min: Vec2, max: Vec2) -> Self {
		self.bounds = Some((min, max));
		self
	}
	/// A single axis aligned rectangle made of two triangles
	pub fn rectangle(min: Vec2, max: Vec2) -> Self {
		SurfaceGeometry::new(
			vec![min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)],
			vec![0, 1, 2, 0, 2, 3],
		)
	}
	/// Append the triangles of another geometry
	pub fn append(&mut self, other: &SurfaceGeometry) {
		let offset = self.vertices.len() as u32;
		self.vertices.extend_from_slice(&other.vertices);
		self.indices
			.extend(other.indices.iter().map(|i| i + offset));
	}
	/// Get the vertex positions
	pub fn get_vertices(&self) -> &[Vec2] {
		&self.vertices
	}
	/// Get the triangle indices
	pub fn get_indices(&self) -> &[u32] {
		&self.indices
	}
	/// Number of complete triangles
	pub fn triangle_count(&self) -> usize {
		self.indices.len() / 3
	}
	/// Iterate over every triangle whose indices are valid
	pub fn triangles(&self) -> impl Iterator<Item = [Vec2; 3]> + '_ {
		self.indices.chunks_exact(3).filter_map(|tri| {
			let a = self.vertices.get(tri[0] as usize)?;
			let b = self.vertices.get(tri[1] as usize)?;
			let c = self.vertices.get(tri[2] as usize)?;
			Some([*a, *b, *c])
		})
	}
	/// Find the world bounds of the geometry. Explicit bounds are returned
	/// as-is, otherwise the extent of every triangle vertex grown by
	/// `padding` on each side
	pub fn compute_bounds(&self, padding: f32) -> Result<(Vec2, Vec2), FlowFieldError> {
		if self.triangle_count() == 0 {
			return Err(FlowFieldError::EmptyGeometry);
		}
		if let Some(bounds) = self.bounds {
			return Ok(bounds);
		}
		let mut min = Vec2::splat(f32::INFINITY);
		let mut max = Vec2::splat(f32::NEG_INFINITY);
		for tri in self.triangles() {
			for v in tri.iter() {
				min = min.min(*v);
				max = max.max(*v);
			}
		}
		if !min.is_finite() || !max.is_finite() {
			return Err(FlowFieldError::DegenerateBounds { min, max });
		}
		// a sliver with zero area along an axis cannot be padded into a world
		if max.x <= min.x || max.y <= min.y {
			return Err(FlowFieldError::DegenerateBounds { min, max });
		}
		Ok((min - Vec2::splat(padding), max + Vec2::splat(padding)))
	}
	/// Rasterise every triangle onto a level `0` grid. A pixel is navigable
	/// when its centre lies inside (or on the edge of) a triangle, the
	/// pixels containing each vertex are always marked so thin triangles
	/// narrower than a pixel still leave a trace
	pub fn rasterise(&self, map_dimensions: &MapDimensions) -> NavigabilityLevel {
		let (width, height) = map_dimensions.get_base_dimensions();
		let mut nav = NavigabilityLevel::new(0, width, height);
		for tri in self.triangles() {
			let lo = tri[0].min(tri[1]).min(tri[2]);
			let hi = tri[0].max(tri[1]).max(tri[2]);
			let cell_lo = map_dimensions.world_to_cell_clamped(lo, 0);
			let cell_hi = map_dimensions.world_to_cell_clamped(hi, 0);
			for row in cell_lo.get_row()..=cell_hi.get_row() {
				for column in cell_lo.get_column()..=cell_hi.get_column() {
					let cell = FieldCell::new(column, row);
					let centre = map_dimensions.get_cell_centre(cell, 0);
					if point_in_triangle(centre, &tri) {
						nav.set_field_cell_value(true, cell);
					}
				}
			}
			for v in tri.iter() {
				if let Some(cell) = map_dimensions.world_to_cell(*v, 0) {
					nav.set_field_cell_value(true, cell);
				}
			}
		}
		nav
	}
	/// From a list of meshes and their translations extract the triangles of
	/// each into a single triangle soup. Vertex `x` and `y` are used, meshes
	/// are expected to lie in the `xy` plane
	pub fn from_bevy_meshes(meshes: &[(&Mesh, Vec2)]) -> Self {
		let mut geometry = SurfaceGeometry::default();
		for (mesh, translation) in meshes {
			let Some(positions) = mesh
				.attribute(Mesh::ATTRIBUTE_POSITION)
				.and_then(|attr| attr.as_float3())
			else {
				warn!("Mesh has no float3 position attribute, skipping");
				continue;
			};
			let offset = geometry.vertices.len() as u32;
			geometry.vertices.extend(
				positions
					.iter()
					.map(|p| Vec2::new(p[0] + translation.x, p[1] + translation.y)),
			);
			let triangles = retrieve_mesh_triangles(mesh, positions.len());
			for [a, b, c] in triangles {
				geometry.indices.push(a as u32 + offset);
				geometry.indices.push(b as u32 + offset);
				geometry.indices.push(c as u32 + offset);
			}
		}
		geometry
	}
}

/// From a mesh retrieve a list of triangles as index triples, meshes without
/// an index buffer are treated as sequentially indexed
fn retrieve_mesh_triangles(mesh: &Mesh, vertex_count: usize) -> Vec<[usize; 3]> {
	use bevy::render::mesh::PrimitiveTopology;
	let indices: Vec<usize> = match mesh.indices() {
		Some(indices) => indices.iter().collect(),
		None => (0..vertex_count).collect(),
	};
	let mut triangles = vec![];
	match mesh.primitive_topology() {
		PrimitiveTopology::TriangleList => {
			for i in indices.chunks_exact(3) {
				triangles.push([i[0], i[1], i[2]]);
			}
		}
		PrimitiveTopology::TriangleStrip => {
			if let Some(triangle_count) = indices.len().checked_sub(2) {
				for n in 0..triangle_count {
					if n % 2 == 0 {
						triangles.push([indices[n], indices[n + 1], indices[n + 2]]);
					} else {
						triangles.push([indices[n + 1], indices[n], indices[n + 2]]);
					}
				}
			} else {
				warn!("A TriangleStrip mesh has insufficient vertices");
			}
		}
		_ => {
			warn!("Mesh topology must be of TriangleList or TriangleStrip for use with vector fields");
		}
	}
	triangles
}

/// Edge function test accepting either winding, points on an edge count as
/// inside
fn point_in_triangle(p: Vec2, tri: &[Vec2; 3]) -> bool {
	let edge = |a: Vec2, b: Vec2| (b - a).perp_dot(p - a);
	let d0 = edge(tri[0], tri[1]);
	let d1 = edge(tri[1], tri[2]);
	let d2 = edge(tri[2], tri[0]);
	let has_neg = d0 < 0.0 || d1 < 0.0 || d2 < 0.0;
	let has_pos = d0 > 0.0 || d1 > 0.0 || d2 > 0.0;
	!(has_neg && has_pos)
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	use bevy::render::mesh::{Indices, PrimitiveTopology};
	use bevy::render::render_asset::RenderAssetUsages;
	#[test]
	fn empty_geometry_errors() {
		let geometry = SurfaceGeometry::default();
		assert!(matches!(
			geometry.compute_bounds(1.0),
			Err(FlowFieldError::EmptyGeometry)
		));
	}
	#[test]
	fn collinear_geometry_is_degenerate() {
		let geometry = SurfaceGeometry::new(
			vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)],
			vec![0, 1, 2],
		);
		assert!(matches!(
			geometry.compute_bounds(0.0),
			Err(FlowFieldError::DegenerateBounds { .. })
		));
	}
	#[test]
	fn padded_bounds() {
		let geometry = SurfaceGeometry::rectangle(Vec2::ZERO, Vec2::new(10.0, 5.0));
		let (min, max) = geometry.compute_bounds(1.0).unwrap();
		assert_eq!(Vec2::splat(-1.0), min);
		assert_eq!(Vec2::new(11.0, 6.0), max);
	}
	#[test]
	fn explicit_bounds_win() {
		let geometry = SurfaceGeometry::rectangle(Vec2::ZERO, Vec2::ONE)
			.with_bounds(Vec2::splat(-5.0), Vec2::splat(5.0));
		let (min, max) = geometry.compute_bounds(1.0).unwrap();
		assert_eq!((Vec2::splat(-5.0), Vec2::splat(5.0)), (min, max));
	}
	#[test]
	fn rasterise_rectangle_fills_grid() {
		let geometry = SurfaceGeometry::rectangle(Vec2::ZERO, Vec2::new(8.0, 4.0));
		let dims = MapDimensions::new(Vec2::ZERO, Vec2::new(8.0, 4.0), 8, 4, 1).unwrap();
		let nav = geometry.rasterise(&dims);
		assert_eq!(32, nav.count_navigable());
	}
	#[test]
	fn rasterise_triangle_leaves_corner_blocked() {
		// lower-left half of a square
		let geometry = SurfaceGeometry::new(
			vec![Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)],
			vec![0, 1, 2],
		);
		let dims = MapDimensions::new(Vec2::ZERO, Vec2::splat(10.0), 10, 10, 1).unwrap();
		let nav = geometry.rasterise(&dims);
		assert!(nav.get_field_cell_value(FieldCell::new(0, 0)));
		assert!(!nav.get_field_cell_value(FieldCell::new(8, 8)));
	}
	#[test]
	fn extract_triangle_list_mesh() {
		let mut mesh = Mesh::new(
			PrimitiveTopology::TriangleList,
			RenderAssetUsages::default(),
		);
		mesh.insert_attribute(
			Mesh::ATTRIBUTE_POSITION,
			vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
		);
		mesh.insert_indices(Indices::U32(vec![0, 1, 2, 0, 2, 3]));
		let geometry = SurfaceGeometry::from_bevy_meshes(&[(&mesh, Vec2::new(5.0, 5.0))]);
		assert_eq!(2, geometry.triangle_count());
		assert_eq!(Vec2::new(6.0, 6.0), geometry.get_vertices()[2]);
	}
	#[test]
	fn extract_skips_line_mesh() {
		let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default());
		mesh.insert_attribute(
			Mesh::ATTRIBUTE_POSITION,
			vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
		);
		let geometry = SurfaceGeometry::from_bevy_meshes(&[(&mesh, Vec2::ZERO)]);
		assert_eq!(0, geometry.triangle_count());
	}
}
