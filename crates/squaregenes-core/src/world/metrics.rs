use super::{World, WorldInitError};
use crate::config::SimConfig;
use crate::entity::Entity;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct StepTimings {
    pub part_phase_us: u64,
    pub entity_phase_us: u64,
    pub reconcile_us: u64,
    pub spawn_us: u64,
    pub total_us: u64,
}

/// Running maxima over registered entities, refreshed every tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldStats {
    pub oldest_alive: u64,
    pub max_generation: u32,
    pub max_energy: f64,
    pub max_parts: u32,
}

impl WorldStats {
    pub(crate) fn observe(&mut self, e: &Entity) {
        self.oldest_alive = self.oldest_alive.max(e.alive_ticks);
        self.max_generation = self.max_generation.max(e.generation);
        self.max_energy = self.max_energy.max(e.energy);
        self.max_parts = self.max_parts.max(e.parts);
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StepMetrics {
    pub step: u64,
    pub alive_entities: usize,
    pub live_parts: usize,
    pub live_nuclei: usize,
    pub total_spawned: u64,
    pub died: u64,
    pub oldest_alive: u64,
    pub max_generation: u32,
    pub max_energy: f64,
    pub max_parts: u32,
    pub mean_genome_len: f32,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub seed: u64,
    pub steps: usize,
    pub sample_every: usize,
    pub final_alive_count: usize,
    pub samples: Vec<StepMetrics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExperimentError {
    #[error("sample_every must be positive")]
    InvalidSampleEvery,
    #[error("steps ({actual}) exceed supported maximum ({max})")]
    TooManySteps { max: usize, actual: usize },
    #[error("sample count ({actual}) exceeds supported maximum ({max})")]
    TooManySamples { max: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    #[error("seed {seed}: {source}")]
    Init {
        seed: u64,
        #[source]
        source: WorldInitError,
    },
    #[error("seed {seed}: {source}")]
    Experiment {
        seed: u64,
        #[source]
        source: ExperimentError,
    },
}

impl World {
    pub const MAX_EXPERIMENT_STEPS: usize = 1_000_000;
    pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;

    pub fn live_parts(&self) -> usize {
        self.live_parts
    }

    pub fn collect_step_metrics(&self) -> StepMetrics {
        let mut live_nuclei = 0usize;
        let mut genome_len_sum = 0usize;
        for coord in 0..self.grid.len() as u32 {
            if let Some(n) = self
                .part_at(coord)
                .filter(|p| !p.removed)
                .and_then(|p| p.nucleus())
            {
                live_nuclei += 1;
                genome_len_sum += n.genome.len();
            }
        }
        let alive = self.alive_entities();
        StepMetrics {
            step: self.step_index,
            alive_entities: alive,
            live_parts: self.live_parts,
            live_nuclei,
            total_spawned: self.total_spawned,
            died: self.total_spawned.saturating_sub(alive as u64),
            oldest_alive: self.stats.oldest_alive,
            max_generation: self.stats.max_generation,
            max_energy: self.stats.max_energy,
            max_parts: self.stats.max_parts,
            mean_genome_len: if live_nuclei > 0 {
                genome_len_sum as f32 / live_nuclei as f32
            } else {
                0.0
            },
        }
    }

    pub fn run_experiment(&mut self, steps: usize, sample_every: usize) -> RunSummary {
        self.try_run_experiment(steps, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment(
        &mut self,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        let estimated_samples = if steps == 0 {
            0
        } else {
            ((steps - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_EXPERIMENT_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_EXPERIMENT_SAMPLES,
                actual: estimated_samples,
            });
        }

        let mut samples = Vec::with_capacity(estimated_samples);
        for step in 1..=steps {
            self.step();
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics());
            }
        }
        Ok(RunSummary {
            schema_version: 1,
            seed: self.config.seed,
            steps,
            sample_every,
            final_alive_count: self.alive_entities(),
            samples,
        })
    }
}

/// Run one independent world per config on the rayon pool. Each world's
/// grid scan stays single-threaded; only whole worlds run side by side.
pub fn run_batch(
    configs: &[SimConfig],
    steps: usize,
    sample_every: usize,
) -> Result<Vec<RunSummary>, BatchError> {
    configs
        .par_iter()
        .map(|config| {
            let seed = config.seed;
            let mut world = World::try_new(config.clone())
                .map_err(|source| BatchError::Init { seed, source })?;
            world
                .try_run_experiment(steps, sample_every)
                .map_err(|source| BatchError::Experiment { seed, source })
        })
        .collect()
}
