pub mod arena;
pub mod builder;
pub mod config;
pub mod entity;
pub mod genome;
pub mod grid;
pub mod interpreter;
pub mod part;
pub mod world;

pub use arena::{EntityId, PartId};
pub use config::{SimConfig, SimConfigError};
pub use genome::{disassemble, Genome, Instruction, Opcode};
pub use grid::{Coord, Grid};
pub use part::{PartKind, Trace};
pub use world::{
    run_batch, BatchError, CellView, ExperimentError, Inspection, PlacementError, RunSummary,
    StepMetrics, StepTimings, World, WorldInitError, WorldStats,
};
