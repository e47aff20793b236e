use std::borrow::Cow;

use ::rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Upper bound used for genes the genome does not cap explicitly.
pub const OPEN_MAX: f32 = 99_999.0;

/// Chance that a single gene mutates during reproduction.
pub const MUTATION_PROBABILITY: f64 = 0.2;
/// Scales the size of a mutation step.
pub const MUTATION_FACTOR: f32 = 1.0;

/// A single bounded, optionally-mutable numeric trait.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub name: Cow<'static, str>,
    pub code: Cow<'static, str>,
    pub value: f32,
    pub mutable: bool,
    pub min: f32,
    pub max: f32,
    pub integer: bool,
}

/// Flat, serializable form of one gene, keyed by its trait attribute.
/// This is the enumerable shape an external persistence layer consumes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub attr: String,
    pub name: String,
    pub code: String,
    pub value: f32,
    pub mutable: bool,
    pub min: f32,
    pub max: f32,
    pub integer: bool,
}

impl Gene {
    /// Continuous mutable gene clamped into `[min, max]`.
    pub fn float(name: &'static str, code: &'static str, value: f32, min: f32, max: f32) -> Self {
        Self {
            name: Cow::Borrowed(name),
            code: Cow::Borrowed(code),
            value: value.clamp(min, max),
            mutable: true,
            min,
            max,
            integer: false,
        }
    }

    /// Integer-quantized mutable gene clamped into `[min, max]`.
    pub fn int(name: &'static str, code: &'static str, value: f32, min: f32, max: f32) -> Self {
        Self {
            integer: true,
            ..Self::float(name, code, value.round(), min, max)
        }
    }

    /// Non-mutating identity gene (species id, generation number).
    pub fn fixed(name: &'static str, code: &'static str, value: f32) -> Self {
        Self {
            mutable: false,
            ..Self::float(name, code, value, 0.0, OPEN_MAX)
        }
    }

    /// With chance `probability`, nudge the value by a bounded random step and
    /// clamp back into `[min, max]`. Non-mutable genes never change.
    pub fn mutate(&mut self, probability: f64, factor: f32, rng: &mut impl Rng) {
        if !self.mutable || !rng.gen_bool(probability) {
            return;
        }

        let old = self.value;
        let step = if self.integer {
            rng.gen_range(-2.0 * factor..=2.0 * factor).round()
        } else {
            rng.gen_range(-0.2 * factor..=0.2 * factor)
        };
        self.value = (self.value + step).clamp(self.min, self.max);

        if self.value != old {
            trace!(gene = %self.code, old, new = self.value, "gene mutated");
        }
    }

    pub fn record(&self, attr: &str) -> GeneRecord {
        GeneRecord {
            attr: attr.to_string(),
            name: self.name.to_string(),
            code: self.code.to_string(),
            value: self.value,
            mutable: self.mutable,
            min: self.min,
            max: self.max,
            integer: self.integer,
        }
    }

    pub fn from_record(record: &GeneRecord) -> Self {
        Self {
            name: Cow::Owned(record.name.clone()),
            code: Cow::Owned(record.code.clone()),
            value: record.value,
            mutable: record.mutable,
            min: record.min,
            max: record.max,
            integer: record.integer,
        }
    }
}
