//! Core engine for an evolving population of creatures and consumable food
//! on a bounded 2-D plane.
//!
//! Each tick the [`World`] rebuilds a k-d spatial index over everything
//! alive, hands every creature the neighborhood it can perceive, and runs
//! the behavior step: vision, a sticky reaction memory, movement, collision,
//! genome-mutating reproduction and the death check. Rendering, UI and save
//! files live outside this crate; the state they need is exposed as plain
//! serializable fields.

pub mod behavior;
pub mod config;
pub mod entity;
pub mod gene;
pub mod genome;
pub mod stats;
pub mod tree;
pub mod world;

pub use entity::{Creature, Entity, EntityId, Food, IdAllocator, Reaction, SpriteHandle};
pub use gene::{Gene, GeneRecord};
pub use genome::{Genome, GenomeError};
pub use stats::WorldStats;
pub use tree::{EntityKind, KdTree, TreeEntry};
pub use world::World;
