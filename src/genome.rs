use std::collections::HashMap;

use ::rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gene::{Gene, GeneRecord, MUTATION_FACTOR, MUTATION_PROBABILITY, OPEN_MAX};

/// Attribute keys of every required trait, in enumeration order.
pub const TRAITS: [&str; 19] = [
    "colour_red",
    "colour_green",
    "colour_blue",
    "radius",
    "speed",
    "base_energy",
    "movement_energy",
    "turning_energy",
    "birth_energy",
    "plant_energy",
    "vision_radius",
    "vision_angle",
    "react_towards",
    "react_speed",
    "food_offset",
    "stranger_offset",
    "known_offset",
    "species",
    "generation",
];

#[derive(Debug, Error, PartialEq)]
pub enum GenomeError {
    #[error("genome is missing required trait `{0}`")]
    MissingTrait(&'static str),
    #[error("genome lists trait `{0}` more than once")]
    DuplicateTrait(String),
    #[error("genome lists unknown trait `{0}`")]
    UnknownTrait(String),
}

/// The fixed named gene set describing one creature.
///
/// Structure is immutable after construction; only gene values change, and
/// only during reproduction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    // Appearance
    pub colour_red: Gene,
    pub colour_green: Gene,
    pub colour_blue: Gene,
    pub radius: Gene,

    // Movement
    pub speed: Gene,

    // Energy economy
    pub base_energy: Gene,
    pub movement_energy: Gene,
    pub turning_energy: Gene,
    pub birth_energy: Gene,
    pub plant_energy: Gene,

    // Perception and behaviour
    pub vision_radius: Gene,
    pub vision_angle: Gene,
    pub react_towards: Gene,
    pub react_speed: Gene,

    // Offsets applied to the approach probability per target class
    pub food_offset: Gene,
    pub stranger_offset: Gene,
    pub known_offset: Gene,

    // Identity (never mutates)
    pub species: Gene,
    pub generation: Gene,
}

impl Genome {
    /// Draw a fresh genome for a founder creature of the given species.
    pub fn create(species: u32, generation: u32, rng: &mut impl Rng) -> Self {
        let radius = Gene::float("Creature Radius Size", "SIZ", rng.gen_range(0.5..7.0), 0.5, OPEN_MAX);
        let base_energy = Gene::float("Energy Consumed per Second", "ENB", rng.gen_range(1.0..100.0), 1.0, OPEN_MAX);
        let birth_value = rng.gen_range(base_energy.value * 60.0..base_energy.value * 6000.0);
        let vision_value = rng.gen_range(radius.value..radius.value + 10.0);

        Self {
            colour_red: Gene::int("Red Colour", "CLR", rng.gen_range(0..=255) as f32, 0.0, 255.0),
            colour_green: Gene::int("Green Colour", "CLG", rng.gen_range(0..=255) as f32, 0.0, 255.0),
            colour_blue: Gene::int("Blue Colour", "CLB", rng.gen_range(0..=255) as f32, 0.0, 255.0),
            radius,
            speed: Gene::float("Speed", "SPD", rng.gen_range(0.0..50.0), 0.0, OPEN_MAX),
            base_energy,
            movement_energy: Gene::float("Energy Consumed for Movement", "ENM", rng.gen_range(5.0..100.0), 1.0, OPEN_MAX),
            turning_energy: Gene::float("Energy Consumed for Turning", "ENT", rng.gen_range(5.0..100.0), 1.0, OPEN_MAX),
            birth_energy: Gene::float("Energy Consumed for Birthing", "ENI", birth_value, 1.0, OPEN_MAX),
            plant_energy: Gene::float("% of Energy Gained From Eating", "ENP", rng.gen_range(0.0..1.0), 0.0, OPEN_MAX),
            vision_radius: Gene::float("Vision Radius", "VIR", vision_value, 0.0, OPEN_MAX),
            vision_angle: Gene::float("Vision Angle", "VIA", rng.gen_range(1..=180) as f32, 1.0, 180.0),
            react_towards: Gene::float("Reaction Towards Entity", "RTO", rng.gen_range(0.0..1.0), 0.0, OPEN_MAX),
            react_speed: Gene::float("Reaction Speed", "RSP", rng.gen_range(1.0..13.0), 0.0, OPEN_MAX),
            food_offset: Gene::float("Reaction Food Offset", "RFO", rng.gen_range(-0.5..0.5), -0.5, 0.5),
            stranger_offset: Gene::float("Reaction Stranger Offset", "RSO", rng.gen_range(-0.5..0.5), -0.5, 0.5),
            known_offset: Gene::float("Reaction Known Offset", "RKO", rng.gen_range(-0.5..0.5), -0.5, 0.5),
            species: Gene::fixed("Species", "SPE", species as f32),
            generation: Gene::fixed("Generation", "GEN", generation as f32),
        }
    }

    /// Clone this genome into a child genome: generation advances by one, the
    /// values blend with the partner's (two-parent only) and every gene then
    /// mutates independently.
    pub fn inherit(&self, partner: Option<&Genome>, rng: &mut impl Rng) -> Self {
        let mut child = self.clone();
        child.generation.value = self.generation.value + 1.0;

        if let Some(partner) = partner {
            child.blend(partner);
        }
        child.mutate_all(rng);
        child
    }

    /// Set every mutable gene to the arithmetic mean of this genome's and the
    /// partner's value. Identity genes are left alone.
    fn blend(&mut self, partner: &Genome) {
        self.for_each_gene_mut(|attr, gene| {
            if !gene.mutable {
                return;
            }
            if let Some(other) = partner.gene(attr) {
                gene.value = (gene.value + other.value) * 0.5;
            }
        });
    }

    /// Mutate every gene independently with the standard probability.
    fn mutate_all(&mut self, rng: &mut impl Rng) {
        self.for_each_gene_mut(|_, gene| gene.mutate(MUTATION_PROBABILITY, MUTATION_FACTOR, rng));
    }

    pub fn gene(&self, attr: &str) -> Option<&Gene> {
        Some(match attr {
            "colour_red" => &self.colour_red,
            "colour_green" => &self.colour_green,
            "colour_blue" => &self.colour_blue,
            "radius" => &self.radius,
            "speed" => &self.speed,
            "base_energy" => &self.base_energy,
            "movement_energy" => &self.movement_energy,
            "turning_energy" => &self.turning_energy,
            "birth_energy" => &self.birth_energy,
            "plant_energy" => &self.plant_energy,
            "vision_radius" => &self.vision_radius,
            "vision_angle" => &self.vision_angle,
            "react_towards" => &self.react_towards,
            "react_speed" => &self.react_speed,
            "food_offset" => &self.food_offset,
            "stranger_offset" => &self.stranger_offset,
            "known_offset" => &self.known_offset,
            "species" => &self.species,
            "generation" => &self.generation,
            _ => return None,
        })
    }

    pub fn for_each_gene(&self, mut f: impl FnMut(&'static str, &Gene)) {
        for attr in TRAITS {
            if let Some(gene) = self.gene(attr) {
                f(attr, gene);
            }
        }
    }

    fn for_each_gene_mut(&mut self, mut f: impl FnMut(&'static str, &mut Gene)) {
        f("colour_red", &mut self.colour_red);
        f("colour_green", &mut self.colour_green);
        f("colour_blue", &mut self.colour_blue);
        f("radius", &mut self.radius);
        f("speed", &mut self.speed);
        f("base_energy", &mut self.base_energy);
        f("movement_energy", &mut self.movement_energy);
        f("turning_energy", &mut self.turning_energy);
        f("birth_energy", &mut self.birth_energy);
        f("plant_energy", &mut self.plant_energy);
        f("vision_radius", &mut self.vision_radius);
        f("vision_angle", &mut self.vision_angle);
        f("react_towards", &mut self.react_towards);
        f("react_speed", &mut self.react_speed);
        f("food_offset", &mut self.food_offset);
        f("stranger_offset", &mut self.stranger_offset);
        f("known_offset", &mut self.known_offset);
        f("species", &mut self.species);
        f("generation", &mut self.generation);
    }

    /// Emit every gene as a flat record, one per trait.
    pub fn records(&self) -> Vec<GeneRecord> {
        let mut records = Vec::with_capacity(TRAITS.len());
        self.for_each_gene(|attr, gene| records.push(gene.record(attr)));
        records
    }

    /// Rebuild a genome from records, failing fast on a missing, duplicated
    /// or unknown trait rather than defaulting anything.
    pub fn from_records(records: &[GeneRecord]) -> Result<Self, GenomeError> {
        let mut by_attr: HashMap<&str, Gene> = HashMap::with_capacity(records.len());
        for record in records {
            if !TRAITS.contains(&record.attr.as_str()) {
                return Err(GenomeError::UnknownTrait(record.attr.clone()));
            }
            if by_attr
                .insert(record.attr.as_str(), Gene::from_record(record))
                .is_some()
            {
                return Err(GenomeError::DuplicateTrait(record.attr.clone()));
            }
        }

        fn take(map: &mut HashMap<&str, Gene>, attr: &'static str) -> Result<Gene, GenomeError> {
            map.remove(attr).ok_or(GenomeError::MissingTrait(attr))
        }

        let map = &mut by_attr;
        Ok(Self {
            colour_red: take(map, "colour_red")?,
            colour_green: take(map, "colour_green")?,
            colour_blue: take(map, "colour_blue")?,
            radius: take(map, "radius")?,
            speed: take(map, "speed")?,
            base_energy: take(map, "base_energy")?,
            movement_energy: take(map, "movement_energy")?,
            turning_energy: take(map, "turning_energy")?,
            birth_energy: take(map, "birth_energy")?,
            plant_energy: take(map, "plant_energy")?,
            vision_radius: take(map, "vision_radius")?,
            vision_angle: take(map, "vision_angle")?,
            react_towards: take(map, "react_towards")?,
            react_speed: take(map, "react_speed")?,
            food_offset: take(map, "food_offset")?,
            stranger_offset: take(map, "stranger_offset")?,
            known_offset: take(map, "known_offset")?,
            species: take(map, "species")?,
            generation: take(map, "generation")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn create_draws_every_gene_within_its_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..50 {
            let genome = Genome::create(1, 1, &mut rng);
            genome.for_each_gene(|attr, gene| {
                assert!(
                    gene.value >= gene.min && gene.value <= gene.max,
                    "{attr} drawn outside bounds: {}",
                    gene.value
                );
            });
            assert_eq!(genome.colour_red.value, genome.colour_red.value.round());
            assert!(genome.radius.value >= 0.5);
            assert!(genome.vision_angle.value >= 1.0 && genome.vision_angle.value <= 180.0);
            assert!(genome.vision_radius.value >= genome.radius.value);
        }
    }

    #[test]
    fn birth_energy_scales_with_base_energy() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        for _ in 0..50 {
            let genome = Genome::create(1, 1, &mut rng);
            let base = genome.base_energy.value;
            assert!(genome.birth_energy.value >= base * 60.0);
            assert!(genome.birth_energy.value <= base * 6000.0);
        }
    }

    #[test]
    fn records_enumerate_every_trait_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let genome = Genome::create(2, 5, &mut rng);

        let records = genome.records();
        assert_eq!(records.len(), TRAITS.len());
        for (record, attr) in records.iter().zip(TRAITS) {
            assert_eq!(record.attr, attr);
        }
    }

    #[test]
    fn records_round_trip_through_json() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let genome = Genome::create(3, 2, &mut rng);

        let json = serde_json::to_string(&genome.records()).unwrap();
        let records: Vec<GeneRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(Genome::from_records(&records).unwrap(), genome);
    }

    #[test]
    fn missing_trait_fails_fast() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut records = Genome::create(1, 1, &mut rng).records();
        records.retain(|r| r.attr != "vision_radius");

        assert_eq!(
            Genome::from_records(&records),
            Err(GenomeError::MissingTrait("vision_radius"))
        );
    }

    #[test]
    fn duplicate_trait_fails_fast() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut records = Genome::create(1, 1, &mut rng).records();
        records.push(records[0].clone());

        assert_eq!(
            Genome::from_records(&records),
            Err(GenomeError::DuplicateTrait("colour_red".to_string()))
        );
    }

    #[test]
    fn unknown_trait_fails_fast() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut records = Genome::create(1, 1, &mut rng).records();
        records[0].attr = "wingspan".to_string();

        assert_eq!(
            Genome::from_records(&records),
            Err(GenomeError::UnknownTrait("wingspan".to_string()))
        );
    }

    #[test]
    fn inherit_advances_generation_and_keeps_species() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let parent = Genome::create(7, 3, &mut rng);

        let child = parent.inherit(None, &mut rng);
        assert_eq!(child.generation.value, 4.0);
        assert_eq!(child.species.value, 7.0);
    }

    #[test]
    fn blended_inheritance_averages_mutable_genes() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut mother = Genome::create(1, 1, &mut rng);
        let mut father = Genome::create(2, 1, &mut rng);
        mother.speed.value = 10.0;
        father.speed.value = 30.0;

        let mut child = mother.clone();
        child.blend(&father);

        assert_eq!(child.speed.value, 20.0);
        // Identity genes never take part in blending.
        assert_eq!(child.species.value, 1.0);
        assert_eq!(child.generation.value, 1.0);
    }
}
