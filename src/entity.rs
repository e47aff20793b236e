use ::rand::Rng;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config;
use crate::genome::Genome;

/// Stable, globally unique entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Issues sequential ids. Owned by the world so a fixed seed replays with
/// identical ids and nothing leaks between simulations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque visual-asset reference. Attached at construction and handed through
/// to a renderer unchanged; the core never reads it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SpriteHandle(pub u32);

/// Shared capability of everything that lives on the plane.
pub trait Entity {
    fn id(&self) -> EntityId;
    fn position(&self) -> Vec2;
    fn radius(&self) -> f32;
    /// Bottom-right extent of the world this entity lives in.
    fn bounds(&self) -> Vec2;

    /// Whether the centre lies within the world rectangle (inclusive edges).
    fn within_bounds(&self) -> bool {
        let pos = self.position();
        let bounds = self.bounds();
        pos.x >= 0.0 && pos.x <= bounds.x && pos.y >= 0.0 && pos.y <= bounds.y
    }
}

/// A consumable energy payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Food {
    pub id: EntityId,
    pub pos: Vec2,
    pub bounds: Vec2,
    pub sprite: SpriteHandle,
    pub energy: f32,
    pub eaten: bool,
}

impl Food {
    pub fn spawn(id: EntityId, pos: Vec2, bounds: Vec2, rng: &mut impl Rng) -> Self {
        let energy = rng.gen_range(config::FOOD_ENERGY_MIN..=config::FOOD_ENERGY_MAX) as f32;
        trace!(id = id.0, x = pos.x, y = pos.y, energy, "food spawned");
        Self {
            id,
            pos,
            bounds,
            sprite: SpriteHandle::default(),
            energy,
            eaten: false,
        }
    }
}

impl Entity for Food {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.pos
    }

    fn radius(&self) -> f32 {
        config::FOOD_RADIUS
    }

    fn bounds(&self) -> Vec2 {
        self.bounds
    }
}

/// The remembered sign of a reaction roll: approach or flee.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Reaction {
    Toward,
    Away,
}

impl Reaction {
    pub fn sign(self) -> f32 {
        match self {
            Reaction::Toward => 1.0,
            Reaction::Away => -1.0,
        }
    }
}

/// An autonomous agent: genome-driven state plus the per-tick reaction memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Creature {
    pub id: EntityId,
    pub pos: Vec2,
    pub bounds: Vec2,
    pub sprite: SpriteHandle,
    pub genome: Genome,
    /// Signed; may dip below zero for one tick before the death check lands.
    pub energy: f32,
    /// Facing direction in degrees, kept normalized to `[0, 360)`.
    pub direction: f32,
    /// True while a target class is continuously in view; gates re-rolling
    /// the reaction so the creature does not jitter.
    pub seeing: bool,
    pub remembered_reaction: Option<Reaction>,
    pub dead: bool,

    /// Child staged for the orchestrator to collect. At most one.
    #[serde(skip)]
    pub child: Option<Box<Creature>>,

    // Observability for a renderer's debug overlay; no simulation logic
    // reads these.
    #[serde(skip)]
    pub checked: Vec<EntityId>,
    #[serde(skip)]
    pub in_range: Vec<EntityId>,
    #[serde(skip)]
    pub visible: Vec<EntityId>,
    #[serde(skip)]
    pub focus: Option<EntityId>,
}

impl Creature {
    /// Founder creature with a freshly drawn genome.
    pub fn create(id: EntityId, pos: Vec2, bounds: Vec2, species: u32, rng: &mut impl Rng) -> Self {
        let genome = Genome::create(species, 1, rng);
        let energy = genome.base_energy.value * config::START_ENERGY_FACTOR;
        Self::from_genome(id, pos, bounds, genome, energy, rng)
    }

    /// Creature carrying an existing genome: founder clones and newborn
    /// children. Runtime state always starts fresh.
    pub fn from_genome(
        id: EntityId,
        pos: Vec2,
        bounds: Vec2,
        genome: Genome,
        energy: f32,
        rng: &mut impl Rng,
    ) -> Self {
        debug!(
            id = id.0,
            species = genome.species.value,
            generation = genome.generation.value,
            "creature created"
        );
        Self {
            id,
            pos,
            bounds,
            sprite: SpriteHandle::default(),
            genome,
            energy,
            direction: rng.gen_range(0.0..360.0),
            seeing: false,
            remembered_reaction: None,
            dead: false,
            child: None,
            checked: Vec::new(),
            in_range: Vec::new(),
            visible: Vec::new(),
            focus: None,
        }
    }
}

impl Entity for Creature {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.pos
    }

    /// Always derived from the genome; a mutated radius gene is visible here
    /// immediately.
    fn radius(&self) -> f32 {
        self.genome.radius.value
    }

    fn bounds(&self) -> Vec2 {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::rand::SeedableRng;
    use glam::vec2;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn id_allocator_issues_sequential_ids() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), EntityId(1));
        assert_eq!(ids.allocate(), EntityId(2));
        assert_eq!(ids.allocate(), EntityId(3));
    }

    #[test]
    fn within_bounds_is_inclusive_at_the_edges() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let bounds = vec2(100.0, 100.0);

        let on_corner = Food::spawn(EntityId(1), vec2(100.0, 0.0), bounds, &mut rng);
        assert!(on_corner.within_bounds());

        let outside = Food::spawn(EntityId(2), vec2(100.1, 50.0), bounds, &mut rng);
        assert!(!outside.within_bounds());

        let negative = Food::spawn(EntityId(3), vec2(50.0, -0.1), bounds, &mut rng);
        assert!(!negative.within_bounds());
    }

    #[test]
    fn creature_radius_follows_the_genome() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut creature = Creature::create(EntityId(1), vec2(10.0, 10.0), vec2(100.0, 100.0), 1, &mut rng);

        creature.genome.radius.value = 3.25;
        assert_eq!(creature.radius(), 3.25);
    }

    #[test]
    fn fresh_creatures_start_normalized_and_searching() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for seed in 0..20 {
            let mut rng_n = ChaCha8Rng::seed_from_u64(seed);
            let creature =
                Creature::create(EntityId(1), vec2(0.0, 0.0), vec2(50.0, 50.0), 1, &mut rng_n);
            assert!(creature.direction >= 0.0 && creature.direction < 360.0);
            assert!(!creature.seeing);
            assert!(creature.remembered_reaction.is_none());
            assert!(!creature.dead);
        }

        let creature = Creature::create(EntityId(1), vec2(0.0, 0.0), vec2(50.0, 50.0), 1, &mut rng);
        let energy = creature.genome.base_energy.value * config::START_ENERGY_FACTOR;
        assert_eq!(creature.energy, energy);
    }
}
