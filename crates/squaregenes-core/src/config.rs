use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible simulation runs.
    pub seed: u64,
    /// The grid is a `2^grid_pow` square torus.
    pub grid_pow: u32,
    /// Whether BUILD may add further nuclei to an existing entity.
    pub allow_multi_nuclei: bool,
    /// Fixed logical timestep, in seconds of model time.
    pub dt: f64,
    /// Fresh random entities attempted at the end of every tick.
    pub spawn_per_tick: usize,
    /// Coordinate draws per scheduler spawn before giving up silently.
    pub spawn_attempts: usize,
    /// Coordinate draws for an explicit genome placement before reporting failure.
    pub place_attempts: usize,
    /// Base mutation rate, scaled by genome length.
    pub mutation_rate: f64,
    /// Energy charged per interpreted instruction per second.
    pub energy_gene_cost: f64,
    /// Ticks a part lives before it dies of old age.
    pub start_life: i64,
    /// Eaters live this many times longer; they are bounded by food instead.
    pub eater_life_multiplier: i64,
    /// Energy given to spawned and explicitly placed root entities.
    pub start_energy: f64,
    /// Energy capacity contributed by each live part.
    pub max_energy: f64,
    /// Upper bound on energy handed to a seeded child entity.
    pub max_seed_energy: f64,
    /// Base cost of a BUILD; eaters pay a fraction of it.
    pub new_part_cost: f64,
    /// Cost of a SEED, paid before the child endowment is split off.
    pub new_seed_cost: f64,
    /// Energy a green part harvests per second.
    pub green_energy_rate: f64,
    /// Food an eater converts to entity energy per second.
    pub food_energy_rate: f64,
    /// Lower and upper (exclusive) bounds of random genome lengths.
    pub random_genome_len: (usize, usize),
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid_pow: 7,
            allow_multi_nuclei: true,
            dt: 0.05,
            spawn_per_tick: 10,
            spawn_attempts: 1,
            place_attempts: 100,
            mutation_rate: 0.01,
            energy_gene_cost: 1.0 / 20.0,
            start_life: 1000,
            eater_life_multiplier: 5,
            start_energy: 1.33,
            max_energy: 2.0,
            max_seed_energy: 3.0,
            new_part_cost: 1.0,
            new_seed_cost: 1.33,
            green_energy_rate: 0.75,
            food_energy_rate: 4.0,
            random_genome_len: (10, 300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimConfigError {
    #[error("grid_pow must be between {min} and {max} (got {actual})")]
    GridPowOutOfRange { min: u32, max: u32, actual: u32 },
    #[error("dt must be positive and finite (got {0})")]
    InvalidDt(f64),
    #[error("{name} must be finite and non-negative (got {value})")]
    InvalidConstant { name: &'static str, value: f64 },
    #[error("start_life must be positive (got {0})")]
    InvalidStartLife(i64),
    #[error("eater_life_multiplier must be at least 1 (got {0})")]
    InvalidEaterLife(i64),
    #[error("start_life * eater_life_multiplier overflows ({start_life} * {multiplier})")]
    EaterLifeOverflow { start_life: i64, multiplier: i64 },
    #[error("random_genome_len must be a non-empty range starting at 2 or more (got {0}..{1})")]
    InvalidGenomeLength(usize, usize),
    #[error("place_attempts must be positive")]
    InvalidPlaceAttempts,
}

impl SimConfig {
    pub const MIN_GRID_POW: u32 = 2;
    /// 4096 x 4096 cells is the most the part buffer is allowed to hold.
    pub const MAX_GRID_POW: u32 = 12;

    pub fn grid_size(&self) -> u32 {
        1 << self.grid_pow
    }

    pub fn start_food(&self) -> f64 {
        self.new_part_cost * 0.8
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if !(Self::MIN_GRID_POW..=Self::MAX_GRID_POW).contains(&self.grid_pow) {
            return Err(SimConfigError::GridPowOutOfRange {
                min: Self::MIN_GRID_POW,
                max: Self::MAX_GRID_POW,
                actual: self.grid_pow,
            });
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimConfigError::InvalidDt(self.dt));
        }
        let constants = [
            ("mutation_rate", self.mutation_rate),
            ("energy_gene_cost", self.energy_gene_cost),
            ("start_energy", self.start_energy),
            ("max_energy", self.max_energy),
            ("max_seed_energy", self.max_seed_energy),
            ("new_part_cost", self.new_part_cost),
            ("new_seed_cost", self.new_seed_cost),
            ("green_energy_rate", self.green_energy_rate),
            ("food_energy_rate", self.food_energy_rate),
        ];
        for (name, value) in constants {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimConfigError::InvalidConstant { name, value });
            }
        }
        // The eater steal draws uniformly from [0, max_energy).
        if self.max_energy <= 0.0 {
            return Err(SimConfigError::InvalidConstant {
                name: "max_energy",
                value: self.max_energy,
            });
        }
        if self.start_life <= 0 {
            return Err(SimConfigError::InvalidStartLife(self.start_life));
        }
        if self.eater_life_multiplier < 1 {
            return Err(SimConfigError::InvalidEaterLife(self.eater_life_multiplier));
        }
        if self.start_life.checked_mul(self.eater_life_multiplier).is_none() {
            return Err(SimConfigError::EaterLifeOverflow {
                start_life: self.start_life,
                multiplier: self.eater_life_multiplier,
            });
        }
        let (lo, hi) = self.random_genome_len;
        if lo < 2 || hi <= lo {
            return Err(SimConfigError::InvalidGenomeLength(lo, hi));
        }
        if self.place_attempts == 0 {
            return Err(SimConfigError::InvalidPlaceAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
        assert_eq!(SimConfig::default().grid_size(), 128);
    }

    #[test]
    fn rejects_oversized_grid() {
        let config = SimConfig {
            grid_pow: 13,
            ..SimConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(SimConfigError::GridPowOutOfRange {
                min: SimConfig::MIN_GRID_POW,
                max: SimConfig::MAX_GRID_POW,
                actual: 13
            })
        );
    }

    #[test]
    fn rejects_eater_life_that_overflows() {
        let config = SimConfig {
            start_life: i64::MAX / 2,
            eater_life_multiplier: 5,
            ..SimConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(SimConfigError::EaterLifeOverflow {
                start_life: i64::MAX / 2,
                multiplier: 5
            })
        );
        let config = SimConfig {
            start_life: i64::MAX / 2,
            eater_life_multiplier: 2,
            ..SimConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_finite_rates() {
        let config = SimConfig {
            green_energy_rate: f64::NAN,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::InvalidConstant {
                name: "green_energy_rate",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_dt() {
        let config = SimConfig {
            dt: 0.0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(SimConfigError::InvalidDt(0.0)));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = SimConfig::from_json_str(r#"{"grid_pow": 8, "allow_multi_nuclei": false}"#)
            .expect("valid json");
        assert_eq!(config.grid_pow, 8);
        assert!(!config.allow_multi_nuclei);
        assert_eq!(config.spawn_per_tick, SimConfig::default().spawn_per_tick);
    }
}
