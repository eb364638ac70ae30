use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use squaregenes_core::part::NucleusState;
use squaregenes_core::{
    disassemble, run_batch, Coord, EntityId, PartId, RunSummary, SimConfig, World,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "squaregenes",
    version,
    about = "Headless runs of the square-genes cellular evolution world"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct WorldArgs {
    /// Ticks to simulate.
    #[arg(long, default_value_t = 1000)]
    steps: usize,
    /// Record a metrics sample every this many ticks.
    #[arg(long, default_value_t = 100)]
    sample_every: usize,
    /// Grid side is 2^pow.
    #[arg(long)]
    pow: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    /// Forbid BUILD from adding nuclei to an existing organism.
    #[arg(long)]
    single_nucleus: bool,
    /// JSON file with a full or partial world configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one world and log sampled metrics.
    Run {
        #[command(flatten)]
        world: WorldArgs,
        /// Write the run summary as JSON to this file.
        #[arg(long)]
        json: Option<PathBuf>,
        /// Print the final occupancy map.
        #[arg(long)]
        ascii: bool,
    },
    /// Run one world per seed in parallel.
    Batch {
        #[command(flatten)]
        world: WorldArgs,
        /// Comma-separated seeds, e.g. 1,2,3.
        #[arg(long, value_delimiter = ',', required = true)]
        seeds: Vec<u64>,
    },
    /// Run, then disassemble the genome of the largest organism.
    Inspect {
        #[command(flatten)]
        world: WorldArgs,
    },
}

impl WorldArgs {
    fn sim_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let data = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                SimConfig::from_json_str(&data).with_context(|| {
                    format!("config file {} is not a valid configuration", path.display())
                })?
            }
            None => SimConfig::default(),
        };
        if let Some(pow) = self.pow {
            config.grid_pow = pow;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.single_nucleus {
            config.allow_multi_nuclei = false;
        }
        config.validate().context("invalid world configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run { world, json, ascii } => run_command(&world, json, ascii),
        Command::Batch { world, seeds } => batch_command(&world, &seeds),
        Command::Inspect { world } => inspect_command(&world),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn run_command(args: &WorldArgs, json: Option<PathBuf>, ascii: bool) -> Result<()> {
    let config = args.sim_config()?;
    info!(
        size = config.grid_size(),
        seed = config.seed,
        steps = args.steps,
        "starting run"
    );
    let mut world = World::try_new(config).context("failed to create world")?;
    let summary = world
        .try_run_experiment(args.steps, args.sample_every)
        .context("invalid run length")?;
    log_samples(&summary);

    if let Some(path) = json {
        let body =
            serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?;
        fs::write(&path, body)
            .with_context(|| format!("failed to write run summary to {}", path.display()))?;
        info!(path = %path.display(), "wrote run summary");
    }
    if ascii {
        print!("{}", world.render_ascii());
    }
    Ok(())
}

fn log_samples(summary: &RunSummary) {
    for m in &summary.samples {
        info!(
            step = m.step,
            alive = m.alive_entities,
            parts = m.live_parts,
            nuclei = m.live_nuclei,
            spawned = m.total_spawned,
            died = m.died,
            oldest = m.oldest_alive,
            generation = m.max_generation,
            max_energy = m.max_energy,
            max_parts = m.max_parts,
            genome_len = m.mean_genome_len,
            "sample"
        );
    }
}

fn batch_command(args: &WorldArgs, seeds: &[u64]) -> Result<()> {
    let base = args.sim_config()?;
    let configs: Vec<SimConfig> = seeds
        .iter()
        .map(|&seed| SimConfig {
            seed,
            ..base.clone()
        })
        .collect();
    info!(worlds = configs.len(), steps = args.steps, "starting batch");
    let summaries = run_batch(&configs, args.steps, args.sample_every).context("batch failed")?;
    for summary in &summaries {
        match summary.samples.last() {
            Some(last) => println!(
                "seed {:>8}: alive {:>5}  spawned {:>7}  max generation {:>4}  oldest {:>6}  max parts {:>4}",
                summary.seed,
                summary.final_alive_count,
                last.total_spawned,
                last.max_generation,
                last.oldest_alive,
                last.max_parts
            ),
            None => println!("seed {:>8}: no samples", summary.seed),
        }
    }
    Ok(())
}

fn inspect_command(args: &WorldArgs) -> Result<()> {
    let mut world = World::try_new(args.sim_config()?).context("failed to create world")?;
    for _ in 0..args.steps {
        world.step();
    }

    let Some((entity, e)) = world.entities().max_by_key(|(_, e)| e.parts()) else {
        bail!("no organisms alive after {} steps", args.steps);
    };
    println!(
        "entity {}: parts {} nuclei {} generation {} energy {:.3} age {}",
        entity.0,
        e.parts(),
        e.nucleus(),
        e.generation(),
        e.energy(),
        e.alive_ticks()
    );

    let Some(coord) = (0..world.grid().len() as Coord).find(|&c| {
        world
            .part_at(c)
            .is_some_and(|p| p.entity() == entity && p.is_nucleus() && !p.is_removed())
    }) else {
        bail!("entity {} has no live nucleus", entity.0);
    };
    let Some(nucleus) = world.inspect(coord).and_then(|found| found.nucleus) else {
        bail!("no nucleus found at {coord}");
    };

    // One more tick so the trace shows which instructions ran.
    world.step();
    let Some(state) = traced_nucleus(&world, coord, nucleus, entity) else {
        warn!("inspected nucleus died during the traced tick");
        return Ok(());
    };
    println!(
        "nucleus at ({}, {}) level {} genome length {}",
        world.grid().x_of(coord),
        world.grid().y_of(coord),
        state.level(),
        state.genome().len()
    );
    let heat = state.trace().map(|t| t.heat()).unwrap_or_default();
    for instr in disassemble(state.genome().data()) {
        let ran = heat.get(instr.offset).is_some_and(|&t| t > 0);
        println!(
            "{} {:>4}  {instr}",
            if ran { '*' } else { ' ' },
            instr.offset
        );
    }
    Ok(())
}

/// The nucleus `inspect` attached a trace to, provided it still sits alive
/// on `coord` for `entity`. Part slots are reused, so the id alone is not enough.
fn traced_nucleus(
    world: &World,
    coord: Coord,
    nucleus: PartId,
    entity: EntityId,
) -> Option<&NucleusState> {
    if world.part_id_at(coord) != Some(nucleus) {
        return None;
    }
    world
        .part_at(coord)
        .filter(|p| p.entity() == entity && !p.is_removed())
        .and_then(|p| p.nucleus())
        .filter(|n| n.trace().is_some())
}
