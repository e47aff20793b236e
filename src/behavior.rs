//! The per-creature behavior step: vision, reaction, movement, collision,
//! reproduction and the death check, driven by the neighbor set the
//! orchestrator queried from the spatial index.

use ::rand::seq::SliceRandom;
use ::rand::Rng;
use glam::Vec2;
use tracing::debug;

use crate::config;
use crate::entity::{Creature, Entity, Food, IdAllocator, Reaction};
use crate::genome::Genome;
use crate::tree::{EntityKind, TreeEntry};

/// Read-only view of the rest of the population while one creature steps.
/// Built from the two halves around the stepping creature, so resolving its
/// own snapshot index yields `None`.
pub struct Flock<'a> {
    before: &'a [Creature],
    after: &'a [Creature],
}

impl<'a> Flock<'a> {
    pub fn new(before: &'a [Creature], after: &'a [Creature]) -> Self {
        Self { before, after }
    }

    pub fn get(&self, index: usize) -> Option<&Creature> {
        if index < self.before.len() {
            self.before.get(index)
        } else {
            index
                .checked_sub(self.before.len() + 1)
                .and_then(|i| self.after.get(i))
        }
    }
}

/// Normalize an angle in degrees into `[0, 360)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    angle.rem_euclid(360.0)
}

/// Normalized angle from `from` toward `to`, in screen coordinates
/// (0 points right, angles grow clockwise because y grows downward).
pub fn bearing(from: Vec2, to: Vec2) -> f32 {
    let offset = to - from;
    wrap_degrees(offset.y.atan2(offset.x).to_degrees())
}

/// Shortest signed arc from `from` to `to`, in `(-180, 180]` degrees.
pub fn signed_arc(from: f32, to: f32) -> f32 {
    let arc = wrap_degrees(to - from);
    if arc > 180.0 {
        arc - 360.0
    } else {
        arc
    }
}

/// Whether `angle` lies inside the aperture centred on `facing`. Both
/// boundaries normalize into `[0, 360)`; when the left boundary ends up
/// numerically above the right one the interval wraps through zero.
pub fn within_aperture(angle: f32, facing: f32, aperture: f32) -> bool {
    let left = wrap_degrees(facing - aperture * 0.5);
    let right = wrap_degrees(facing + aperture * 0.5);
    if left <= right {
        left <= angle && angle <= right
    } else {
        angle >= left || angle <= right
    }
}

/// Vision test: inside the vision radius and inside the angular aperture.
pub fn in_sight(creature: &Creature, target: Vec2) -> bool {
    let distance = creature.pos.distance(target);
    distance < creature.genome.vision_radius.value
        && within_aperture(
            bearing(creature.pos, target),
            creature.direction,
            creature.genome.vision_angle.value,
        )
}

/// Run one full behavior step for `creature`.
///
/// `candidates` is the tick-start snapshot the orchestrator queried around
/// this creature; positions read from it are simultaneous-move positions,
/// while food `eaten` flags are checked live so one payload feeds one mouth.
pub fn step(
    creature: &mut Creature,
    candidates: &[TreeEntry],
    food: &mut [Food],
    flock: &Flock<'_>,
    ids: &mut IdAllocator,
    rng: &mut impl Rng,
    dt: f32,
) {
    if creature.dead {
        return;
    }

    creature.energy -= creature.genome.base_energy.value * dt;

    creature.checked.clear();
    creature.in_range.clear();
    creature.visible.clear();

    let mut seen: Vec<&TreeEntry> = Vec::new();
    for entry in candidates {
        if entry.id == creature.id {
            continue;
        }
        creature.checked.push(entry.id);
        if creature.pos.distance(entry.pos) < creature.genome.vision_radius.value {
            creature.in_range.push(entry.id);
            if within_aperture(
                bearing(creature.pos, entry.pos),
                creature.direction,
                creature.genome.vision_angle.value,
            ) {
                creature.visible.push(entry.id);
                seen.push(entry);
            }
        }
    }

    match seen.choose(rng) {
        Some(&target) => {
            creature.focus = Some(target.id);
            react(creature, target, flock, rng, dt);
            creature.seeing = true;
        }
        None => creature.seeing = false,
    }

    advance(creature, rng, dt);

    for entry in candidates {
        if entry.id == creature.id {
            continue;
        }
        if creature.pos.distance(entry.pos) >= creature.radius() + entry.radius {
            continue;
        }
        match entry.kind {
            EntityKind::Food => {
                let Some(item) = food.get_mut(entry.index) else {
                    continue;
                };
                if item.eaten {
                    continue;
                }
                item.eaten = true;
                creature.energy += item.energy * creature.genome.plant_energy.value;
                debug!(id = creature.id.0, food = item.id.0, "food eaten");
                if rng.gen_range(1..=config::EAT_BIRTH_ODDS) == 1 {
                    try_birth(creature, None, ids, rng);
                }
            }
            EntityKind::Creature => {
                let Some(partner) = flock.get(entry.index) else {
                    continue;
                };
                let partner_genome = partner.genome.clone();
                try_birth(creature, Some(&partner_genome), ids, rng);

                // Bounce apart.
                let turn =
                    rng.gen_range(config::BOUNCE_TURN_MIN..=config::BOUNCE_TURN_MAX) as f32;
                creature.direction = wrap_degrees(creature.direction + turn);
                creature.energy -= creature.genome.turning_energy.value * turn;
            }
        }
    }

    if creature.energy <= 0.0 {
        creature.dead = true;
        debug!(id = creature.id.0, energy = creature.energy, "creature died");
    }
}

/// Decide (or recall) the reaction to the chosen target and turn toward or
/// away from its bearing.
fn react(
    creature: &mut Creature,
    target: &TreeEntry,
    flock: &Flock<'_>,
    rng: &mut impl Rng,
    dt: f32,
) {
    let reaction = if creature.seeing {
        // Still watching the same class of target: keep the earlier decision
        // instead of re-rolling every tick.
        creature.remembered_reaction.unwrap_or(Reaction::Toward)
    } else {
        let offset = match target.kind {
            EntityKind::Food => creature.genome.food_offset.value,
            EntityKind::Creature => {
                let same_species = flock
                    .get(target.index)
                    .map(|other| other.genome.species.value == creature.genome.species.value)
                    .unwrap_or(false);
                if same_species {
                    creature.genome.known_offset.value
                } else {
                    creature.genome.stranger_offset.value
                }
            }
        };
        let probability = (creature.genome.react_towards.value + offset).abs().min(1.0);
        let rolled = if rng.gen_bool(f64::from(probability)) {
            Reaction::Toward
        } else {
            Reaction::Away
        };
        creature.remembered_reaction = Some(rolled);
        rolled
    };

    let arc = signed_arc(creature.direction, bearing(creature.pos, target.pos));
    let turn = creature.genome.react_speed.value * reaction.sign() * dt * arc.signum();
    creature.direction = wrap_degrees(creature.direction + turn);
    creature.energy -= creature.genome.turning_energy.value * creature.genome.react_speed.value * dt;
}

/// Advance along the facing direction, paying for the distance travelled.
/// Leaving the world deflects the direction instead of clamping the position.
fn advance(creature: &mut Creature, rng: &mut impl Rng, dt: f32) {
    let travelled = creature.genome.speed.value * dt;
    let heading = creature.direction.to_radians();
    creature.pos += Vec2::new(heading.cos(), heading.sin()) * travelled;
    creature.energy -= creature.genome.movement_energy.value * travelled;

    if !creature.within_bounds() {
        let jitter = rng.gen_range(-config::BOUNDARY_DEFLECT_JITTER..=config::BOUNDARY_DEFLECT_JITTER);
        let deflect = config::BOUNDARY_DEFLECT_ANGLE + jitter as f32;
        creature.direction = wrap_degrees(creature.direction + deflect);
        creature.energy -= creature.genome.turning_energy.value * deflect;
    }
}

/// Attempt a birth. Too little energy or an already-occupied child slot is a
/// silent no-op. A child landing outside the world is stillborn: staged dead,
/// collected and discarded by the orchestrator.
pub fn try_birth(
    creature: &mut Creature,
    partner: Option<&Genome>,
    ids: &mut IdAllocator,
    rng: &mut impl Rng,
) {
    let cost = creature.genome.birth_energy.value;
    if creature.energy <= cost || creature.child.is_some() {
        return;
    }
    creature.energy -= cost;

    let genome = creature.genome.inherit(partner, rng);
    let offset_angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let offset = Vec2::from_angle(offset_angle) * (creature.radius() * config::CHILD_OFFSET_FACTOR);

    let mut child = Creature::from_genome(
        ids.allocate(),
        creature.pos + offset,
        creature.bounds,
        genome,
        cost,
        rng,
    );
    if !child.within_bounds() {
        child.dead = true;
    }
    debug!(
        parent = creature.id.0,
        child = child.id.0,
        stillborn = child.dead,
        "birth"
    );
    creature.child = Some(Box::new(child));
}
