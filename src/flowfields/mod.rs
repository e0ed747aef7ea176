//! Vector fields are a means of guiding a crowd of actors toward shared targets
//! without planning a path per actor.
//!
//! [Fixing Pathfinding Once and For All](https://web.archive.org/web/20150905073624/http://www.ai-blog.net/archives/000152.html)
//!
//! [leifnode](https://leifnode.com/2013/12/flow-field-pathfinding/)
//!
//! The navigable surface is rasterised into a base grid and repeatedly
//! halved into a mipmap style hierarchy of levels. Each level carries a field
//! of 2d vectors pointing away from the targets which is relaxed a few stages
//! at a time, a level only ever reading its own cells. A scalar bias field
//! decides which level an actor reads: near targets and junctions the finest
//! level, in open space a coarse one.
//!
//! Grids are indexed from the minimum corner of the world bounds, rows grow
//! with world `y`.
//!
//! Definitions:
//!
//! * Navigability level - boolean grid of which cells can be walked, a cell of
//!   a coarser level is navigable when any of its four finer cells are
//! * Vector field - 2d vector per cell, a magnitude of `1.0` pins a target
//!   and magnitudes decay with distance from it
//! * Bias field - scalar per cell combining junction and target proximity,
//!   higher values select finer levels
//! * Chunk - square block of base cells, the unit of incremental
//!   recomputation
//!
//! ```text
//!  level 0          level 1      level 2
//!  _______________   _______      ___
//! |_|_|_|_|_|_|_|_| |___|___|    |   |
//! |_|_|_|_|_|_|_|_| |___|___|    |___|
//! |_|_|_|_|_|_|_|_|
//! |_|_|_|_|_|_|_|_|
//! ```
//!

pub mod bias;
pub mod chunks;
pub mod fields;
pub mod map_dimensions;
pub mod navigability;
pub mod propagation;
pub mod query;
pub mod storage;
pub mod utilities;
