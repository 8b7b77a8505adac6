//! floragrid-slurm — adapter over the SLURM command-line tools, plus the
//! batch-script synthesizer for Flower stack jobs.
//!
//! The scheduler is driven exclusively through its own programs (`sbatch`,
//! `scancel`, `squeue`, `scontrol`, `sinfo`); this crate shells out, captures
//! their combined textual output and leaves interpretation to the caller.
//! Tests substitute a scripted runner for the real programs.

mod client;
mod error;
pub mod script;

pub use client::{
    ClusterStatus, CommandOutput, CommandRunner, ScriptedRunner, SlurmClient, SystemRunner,
};
pub use error::{SlurmError, SlurmResult};
