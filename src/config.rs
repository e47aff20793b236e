// All tunable simulation constants in one place.

// World
pub const WORLD_SIZE: f32 = 1000.0;
pub const START_SPECIES: usize = 4;
pub const START_CREATURES: usize = 10;
pub const START_FOOD: usize = 500;
pub const TICK_SPEED_MAX: u32 = 10;

// Food
pub const FOOD_RADIUS: f32 = 0.5;
pub const FOOD_ENERGY_MIN: u32 = 50;
pub const FOOD_ENERGY_MAX: u32 = 500;
pub const FOOD_SPAWN_PER_SECOND: f32 = 2000.0;
pub const FOOD_SCATTER: i32 = 5;
pub const FOOD_SPAWN_ATTEMPTS: usize = 32;

// Creatures
pub const START_ENERGY_FACTOR: f32 = 6000.0;
pub const EAT_BIRTH_ODDS: u32 = 200;
pub const CHILD_OFFSET_FACTOR: f32 = 3.0;
pub const BOUNDARY_DEFLECT_ANGLE: f32 = 180.0;
pub const BOUNDARY_DEFLECT_JITTER: i32 = 10;
pub const BOUNCE_TURN_MIN: i32 = 90;
pub const BOUNCE_TURN_MAX: i32 = 180;

// Stats
pub const STATS_CAPACITY: usize = 1000;
