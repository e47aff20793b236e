use ::rand::seq::SliceRandom;
use ::rand::{Rng, SeedableRng};
use glam::{vec2, Vec2};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::behavior::{self, Flock};
use crate::config;
use crate::entity::{Creature, Entity, Food, IdAllocator};
use crate::genome::Genome;
use crate::stats::WorldStats;
use crate::tree::{KdTree, TreeEntry};

/// Owns the populations, rebuilds the spatial index once per step, drives
/// every creature's behavior step and reconciles the results.
#[derive(Serialize, Deserialize)]
pub struct World {
    pub size: f32,
    pub creatures: Vec<Creature>,
    pub food: Vec<Food>,
    /// Tick-start snapshot index; rebuilt every step and never serialized.
    #[serde(skip)]
    pub tree: KdTree,
    /// Largest creature radius ever admitted; pads every query box so a big
    /// neighbor's body cannot poke into an unqueried area.
    pub largest_radius: f32,
    pub tick_speed: u32,
    pub paused: bool,
    pub seconds: f64,
    pub stats: WorldStats,
    pub ids: IdAllocator,
    pub rng: ChaCha8Rng,
    second_timer: f32,
    food_timer: f32,
}

impl World {
    pub fn new(seed: u64) -> Self {
        Self::with_population(
            config::WORLD_SIZE,
            seed,
            config::START_SPECIES,
            config::START_CREATURES,
            config::START_FOOD,
        )
    }

    pub fn with_population(
        size: f32,
        seed: u64,
        start_species: usize,
        start_creatures: usize,
        start_food: usize,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut ids = IdAllocator::new();
        let bounds = vec2(size, size);

        let mut food = Vec::with_capacity(start_food);
        for _ in 0..start_food {
            let pos = random_cell(size, &mut rng);
            food.push(Food::spawn(ids.allocate(), pos, bounds, &mut rng));
        }

        // Each founder genome is shared by a cohort of one species.
        let mut creatures = Vec::with_capacity(start_creatures);
        let mut largest_radius = 0.0f32;
        let cohort = if start_species == 0 {
            0
        } else {
            start_creatures / start_species
        };
        for species in 0..start_species {
            let founder = Genome::create(species as u32 + 1, 1, &mut rng);
            for _ in 0..cohort {
                let energy = founder.base_energy.value * config::START_ENERGY_FACTOR;
                let creature = Creature::from_genome(
                    ids.allocate(),
                    random_cell(size, &mut rng),
                    bounds,
                    founder.clone(),
                    energy,
                    &mut rng,
                );
                largest_radius = largest_radius.max(creature.radius());
                creatures.push(creature);
            }
        }

        Self {
            size,
            creatures,
            food,
            tree: KdTree::default(),
            largest_radius,
            tick_speed: 1,
            paused: false,
            seconds: 0.0,
            stats: WorldStats::new(config::STATS_CAPACITY),
            ids,
            rng,
            second_timer: 0.0,
            food_timer: 0.0,
        }
    }

    /// Advance the simulation, repeating the step `tick_speed` times to
    /// fast-forward. Real-time pacing between calls belongs to the caller.
    pub fn tick(&mut self, dt: f32) {
        for _ in 0..self.tick_speed {
            self.step(dt);
        }
    }

    fn step(&mut self, dt: f32) {
        self.seconds += f64::from(dt);
        self.second_timer += dt;
        self.food_timer += dt;

        self.tree = KdTree::build(self.snapshot());

        // Every creature reads positions from the same tick-start snapshot:
        // late movers see their siblings' pre-move positions.
        let mut newborns: Vec<Creature> = Vec::new();
        for index in 0..self.creatures.len() {
            let me = &self.creatures[index];
            let half = 2.0 * me.genome.vision_radius.value + self.largest_radius;
            let origin = me.pos;
            let hits = self.tree.range_search(
                origin,
                vec2(origin.x - half, origin.y + half),
                vec2(origin.x + half, origin.y - half),
            );

            let (before, rest) = self.creatures.split_at_mut(index);
            let Some((me, after)) = rest.split_first_mut() else {
                continue;
            };
            let flock = Flock::new(before, after);
            behavior::step(
                me,
                &hits,
                &mut self.food,
                &flock,
                &mut self.ids,
                &mut self.rng,
                dt,
            );

            if let Some(child) = me.child.take() {
                newborns.push(*child);
            }
        }

        let food_before = self.food.len();
        self.food.retain(|item| !item.eaten);
        self.stats.note_eaten((food_before - self.food.len()) as u32);

        let creatures_before = self.creatures.len();
        self.creatures.retain(|creature| !creature.dead);
        self.stats
            .note_deaths((creatures_before - self.creatures.len()) as u32);

        for child in newborns {
            if child.dead {
                // Stillborn: spawned outside the world, never lived.
                debug!(id = child.id.0, "stillborn child discarded");
                continue;
            }
            self.largest_radius = self.largest_radius.max(child.radius());
            self.stats.note_births(1);
            self.creatures.push(child);
        }

        if self.second_timer >= 1.0 {
            self.second_timer = 0.0;
            let (mean_energy, mean_generation) = population_means(&self.creatures);
            self.stats.sample(
                self.creatures.len(),
                self.food.len(),
                mean_energy,
                mean_generation,
            );
            for creature in &mut self.creatures {
                creature.focus = None;
            }
        }

        if self.food_timer >= 1.0 / config::FOOD_SPAWN_PER_SECOND {
            self.food_timer = 0.0;
            self.spawn_food();
        }
    }

    /// Scatter one food item near an existing one, skipping coordinates the
    /// index already knows and positions outside the world. With nothing to
    /// grow from, seed a uniformly random in-bounds item instead.
    fn spawn_food(&mut self) {
        let bounds = vec2(self.size, self.size);

        if self.food.is_empty() {
            let pos = random_cell(self.size, &mut self.rng);
            self.food
                .push(Food::spawn(self.ids.allocate(), pos, bounds, &mut self.rng));
            return;
        }

        for _ in 0..config::FOOD_SPAWN_ATTEMPTS {
            let Some(anchor) = self.food.choose(&mut self.rng) else {
                return;
            };
            let candidate = anchor.pos
                + vec2(
                    self.rng.gen_range(-config::FOOD_SCATTER..=config::FOOD_SCATTER) as f32,
                    self.rng.gen_range(-config::FOOD_SCATTER..=config::FOOD_SCATTER) as f32,
                );

            let in_bounds = candidate.x >= 0.0
                && candidate.x <= bounds.x
                && candidate.y >= 0.0
                && candidate.y <= bounds.y;
            if in_bounds && !self.tree.find(candidate) {
                self.food
                    .push(Food::spawn(self.ids.allocate(), candidate, bounds, &mut self.rng));
                return;
            }
        }
        debug!("food spawn gave up: no free coordinate found");
    }

    /// Clamped fast-forward control: 1..=10 steps per tick.
    pub fn change_tick_speed(&mut self, direction: i32) {
        let next = self.tick_speed as i32 + direction;
        if next > 0 && next <= config::TICK_SPEED_MAX as i32 {
            self.tick_speed = next as u32;
        }
    }

    fn snapshot(&self) -> Vec<TreeEntry> {
        let mut entries = Vec::with_capacity(self.creatures.len() + self.food.len());
        entries.extend(
            self.creatures
                .iter()
                .enumerate()
                .map(|(index, creature)| TreeEntry::creature(creature, index)),
        );
        entries.extend(
            self.food
                .iter()
                .enumerate()
                .map(|(index, item)| TreeEntry::food(item, index)),
        );
        entries
    }
}

fn random_cell(size: f32, rng: &mut impl Rng) -> Vec2 {
    vec2(
        rng.gen_range(0..size as i32) as f32,
        rng.gen_range(0..size as i32) as f32,
    )
}

fn population_means(creatures: &[Creature]) -> (f32, f32) {
    if creatures.is_empty() {
        return (0.0, 0.0);
    }
    let count = creatures.len() as f32;
    let energy: f32 = creatures.iter().map(|c| c.energy).sum();
    let generation: f32 = creatures.iter().map(|c| c.genome.generation.value).sum();
    (energy / count, generation / count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::gene::OPEN_MAX;

    fn empty_world(size: f32, seed: u64) -> World {
        World::with_population(size, seed, 0, 0, 0)
    }

    /// A creature that stays put and never births unless a test asks for it.
    fn docile_creature(world: &mut World, pos: Vec2) -> Creature {
        let mut rng = ChaCha8Rng::seed_from_u64(999);
        let bounds = vec2(world.size, world.size);
        let mut creature = Creature::create(world.ids.allocate(), pos, bounds, 1, &mut rng);
        creature.direction = 0.0;
        creature.genome.speed.value = 0.0;
        creature.genome.base_energy.value = 1.0;
        creature.genome.vision_radius.value = 1.0;
        creature.genome.birth_energy.value = OPEN_MAX;
        creature.energy = 10_000.0;
        creature
    }

    #[test]
    fn new_world_seeds_cohorts_per_species() {
        let world = World::with_population(500.0, 1, 2, 10, 30);

        assert_eq!(world.creatures.len(), 10);
        assert_eq!(world.food.len(), 30);

        let first_species: Vec<f32> = world.creatures[..5]
            .iter()
            .map(|c| c.genome.species.value)
            .collect();
        assert!(first_species.iter().all(|&s| s == 1.0));
        assert!(world.creatures[5..]
            .iter()
            .all(|c| c.genome.species.value == 2.0));

        // Founder cohorts share a genome; everyone is inside the world.
        assert_eq!(
            world.creatures[0].genome.speed.value,
            world.creatures[4].genome.speed.value
        );
        assert!(world.creatures.iter().all(|c| c.within_bounds()));
        assert!(world.largest_radius > 0.0);
    }

    #[test]
    fn entity_ids_are_unique_across_both_populations() {
        let world = World::with_population(500.0, 2, 3, 9, 40);

        let mut ids: Vec<u64> = world
            .creatures
            .iter()
            .map(|c| c.id.0)
            .chain(world.food.iter().map(|f| f.id.0))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), world.creatures.len() + world.food.len());
    }

    #[test]
    fn starving_creature_is_gone_after_the_tick_reconciles() {
        let mut world = empty_world(200.0, 3);
        let mut creature = docile_creature(&mut world, vec2(50.0, 50.0));
        creature.genome.base_energy.value = 10.0;
        creature.energy = 1.0;
        world.creatures.push(creature);

        world.tick(1.0);

        assert!(world.creatures.is_empty());
    }

    #[test]
    fn eaten_food_leaves_the_collection_and_the_next_index() {
        let mut world = empty_world(200.0, 4);
        let mut creature = docile_creature(&mut world, vec2(50.0, 50.0));
        creature.genome.radius.value = 2.0;
        world.creatures.push(creature);

        let bounds = vec2(200.0, 200.0);
        let id = world.ids.allocate();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        world
            .food
            .push(Food::spawn(id, vec2(51.0, 50.0), bounds, &mut rng));

        // Keep the spawner quiet so only the tombstone matters here.
        world.food_timer = f32::MIN;
        world.tick(0.016);
        assert!(world.food.is_empty());

        // The next step rebuilds the index without the tombstoned item.
        world.food_timer = f32::MIN;
        world.tick(0.016);
        assert!(!world.tree.find(vec2(51.0, 50.0)));
        assert!(world
            .tree
            .range_search(vec2(50.0, 50.0), vec2(40.0, 60.0), vec2(60.0, 40.0))
            .is_empty());
    }

    #[test]
    fn colliding_creatures_admit_a_newborn() {
        let mut world = empty_world(200.0, 5);

        let mut mother = docile_creature(&mut world, vec2(100.0, 100.0));
        mother.genome.radius.value = 2.0;
        mother.genome.turning_energy.value = 1.0;
        mother.genome.birth_energy.value = 100.0;
        let mut father = docile_creature(&mut world, vec2(101.0, 100.0));
        father.id = EntityId(900);
        father.genome.radius.value = 2.0;
        father.genome.turning_energy.value = 1.0;
        father.genome.birth_energy.value = 100.0;
        world.creatures.push(mother);
        world.creatures.push(father);

        world.tick(0.016);

        assert!(world.creatures.len() > 2);
        let newborn = world
            .creatures
            .iter()
            .find(|c| c.genome.generation.value == 2.0)
            .expect("a second-generation creature");
        assert!(newborn.within_bounds());
        assert!(!newborn.dead);
    }

    #[test]
    fn spawned_food_lands_on_a_free_in_bounds_coordinate() {
        let mut world = empty_world(100.0, 6);
        let bounds = vec2(100.0, 100.0);
        let id = world.ids.allocate();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        world
            .food
            .push(Food::spawn(id, vec2(50.0, 50.0), bounds, &mut rng));

        world.tree = KdTree::build(world.snapshot());
        world.spawn_food();

        assert_eq!(world.food.len(), 2);
        let spawned = &world.food[1];
        assert!(spawned.within_bounds());
        assert_ne!(spawned.pos, vec2(50.0, 50.0));
        assert!((spawned.pos.x - 50.0).abs() <= config::FOOD_SCATTER as f32);
        assert!((spawned.pos.y - 50.0).abs() <= config::FOOD_SCATTER as f32);
    }

    #[test]
    fn spawning_into_an_empty_world_places_food_anywhere_in_bounds() {
        let mut world = empty_world(100.0, 7);

        world.spawn_food();

        assert_eq!(world.food.len(), 1);
        assert!(world.food[0].within_bounds());
    }

    #[test]
    fn tick_speed_stays_clamped() {
        let mut world = empty_world(100.0, 8);

        for _ in 0..15 {
            world.change_tick_speed(1);
        }
        assert_eq!(world.tick_speed, config::TICK_SPEED_MAX);

        for _ in 0..15 {
            world.change_tick_speed(-1);
        }
        assert_eq!(world.tick_speed, 1);
    }

    #[test]
    fn fast_forward_repeats_the_step() {
        let mut world = empty_world(100.0, 9);
        world.tick_speed = 3;

        world.tick(0.5);

        assert!((world.seconds - 1.5).abs() < 1e-6);
    }

    #[test]
    fn world_state_round_trips_through_serde() {
        let mut world = World::with_population(300.0, 10, 2, 6, 25);
        world.tick(0.016);

        let json = serde_json::to_string(&world).unwrap();
        let mut restored: World = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.creatures.len(), world.creatures.len());
        assert_eq!(restored.food.len(), world.food.len());
        assert_eq!(restored.seconds, world.seconds);
        assert_eq!(restored.tick_speed, world.tick_speed);

        // The index is rebuilt, not restored; the world keeps ticking.
        restored.tick(0.016);
    }
}
