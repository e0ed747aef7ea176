//! This is a plugin for Bevy game engine to generate and maintain a multi-resolution vector field
//! which guides large crowds of actors towards one or more dynamic targets
//!

pub mod config;
pub mod engine;
pub mod error;
pub mod flowfields;
pub mod plugin;

pub mod prelude;
