use squaregenes_core::{SimConfig, World};
use std::time::Instant;

const WARMUP_STEPS: usize = 200;
const BENCHMARK_STEPS: usize = 500;
const TARGET_SPS: f64 = 60.0;

fn run_benchmark(grid_pow: u32, seed: u64) {
    let config = SimConfig {
        grid_pow,
        seed,
        ..SimConfig::default()
    };
    let mut world = World::new(config.clone());

    // Let the population reach a steady state first.
    for _ in 0..WARMUP_STEPS {
        world.step();
    }

    let mut total_parts = 0u64;
    let mut total_entities = 0u64;
    let mut total_reconcile = 0u64;
    let mut total_spawn = 0u64;
    let mut total_time = 0u64;
    for _ in 0..BENCHMARK_STEPS {
        let timings = world.step();
        total_parts += timings.part_phase_us;
        total_entities += timings.entity_phase_us;
        total_reconcile += timings.reconcile_us;
        total_spawn += timings.spawn_us;
        total_time += timings.total_us;
    }

    let avg_step_us = total_time as f64 / BENCHMARK_STEPS as f64;
    let steps_per_sec = 1_000_000.0 / avg_step_us.max(1.0);
    let size = config.grid_size();

    println!(
        "--- {size}x{size} grid, {} organisms, {} parts ---",
        world.alive_entities(),
        world.live_parts()
    );
    println!("  Avg step:      {avg_step_us:.0} us ({steps_per_sec:.1} steps/sec)");
    println!(
        "  Breakdown:     parts={:.0} us, entities={:.0} us, reconcile={:.0} us, spawn={:.0} us",
        total_parts as f64 / BENCHMARK_STEPS as f64,
        total_entities as f64 / BENCHMARK_STEPS as f64,
        total_reconcile as f64 / BENCHMARK_STEPS as f64,
        total_spawn as f64 / BENCHMARK_STEPS as f64,
    );

    // Sampling cost on top of the plain step loop.
    let mut sampled = World::new(config);
    let start = Instant::now();
    sampled.run_experiment(BENCHMARK_STEPS, 1);
    let with_metrics = start.elapsed();
    println!(
        "  With metrics:  {:?} per step",
        with_metrics / BENCHMARK_STEPS as u32
    );

    let verdict = if steps_per_sec >= TARGET_SPS {
        "GO"
    } else {
        "NO-GO"
    };
    println!("  Verdict:       {verdict} (target: >={TARGET_SPS} steps/sec)");
    println!();
}

fn main() {
    if cfg!(debug_assertions) {
        eprintln!("WARNING: running in debug mode. Results are not representative.");
        eprintln!("         Use: cargo run -p squaregenes-cli --bin benchmark_step --release");
        eprintln!();
    }
    println!("=== Square Genes Step Benchmark ===");
    println!("Warmup: {WARMUP_STEPS} steps, Benchmark: {BENCHMARK_STEPS} steps");
    println!();

    for grid_pow in [6, 7, 8, 9] {
        run_benchmark(grid_pow, 42);
    }
}
