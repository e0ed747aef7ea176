//! `use bevy_flowfield_mipmap_plugin::prelude::*;` to import common structures and methods
//!

#[doc(hidden)]
pub use crate::flowfields::{
	bias::{junctions::*, *},
	chunks::{agents::*, scheduler::*, *},
	fields::{bias_field::*, navigability_field::*, vector_field::*, *},
	map_dimensions::*,
	navigability::{surface::*, *},
	propagation::*,
	query::*,
	storage::*,
	utilities::*,
};

#[doc(hidden)]
pub use crate::{
	config::*,
	engine::*,
	error::*,
	plugin::{field_layer::*, target_layer::*, *},
};
