//! Batch-script synthesis for one Flower stack deployment.
//!
//! The allocation holds `num_nodes + 1` single-task nodes: the server agent
//! runs on the first allocated node, a client agent on each of the rest, all
//! backgrounded under one `wait`. The script is a pure function of its
//! inputs; equal specs render byte-identical scripts.

use std::fmt::Write as _;
use std::path::PathBuf;

use flora_core::API_SERVER_ENV;

/// Inputs of one stack script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSpec {
    /// Client-node count; the allocation adds one server node on top.
    pub num_nodes: u32,
    pub partition: Option<String>,
    pub memory: Option<String>,
    pub time_limit: Option<String>,
    /// Externally reachable coordinator base URL.
    pub api_url: String,
    /// Path of the florad binary on the shared filesystem.
    pub florad_bin: PathBuf,
    /// Directory receiving the `%j`-templated scheduler log files.
    pub logs_dir: PathBuf,
}

pub fn render_stack_script(spec: &ScriptSpec) -> String {
    let total_nodes = spec.num_nodes + 1;
    let logs = spec.logs_dir.display();

    let mut script = String::new();
    script.push_str("#!/bin/bash\n");
    script.push_str("#SBATCH --job-name=flower-stack\n");
    let _ = writeln!(script, "#SBATCH --nodes={total_nodes}");
    script.push_str("#SBATCH --ntasks-per-node=1\n");
    if let Some(partition) = &spec.partition {
        let _ = writeln!(script, "#SBATCH --partition={partition}");
    }
    if let Some(memory) = &spec.memory {
        let _ = writeln!(script, "#SBATCH --mem={memory}");
    }
    if let Some(time_limit) = &spec.time_limit {
        let _ = writeln!(script, "#SBATCH --time={time_limit}");
    }
    let _ = writeln!(script, "#SBATCH --output={logs}/flower-stack-%j.out");
    let _ = writeln!(script, "#SBATCH --error={logs}/flower-stack-%j.err");

    script.push('\n');
    let _ = writeln!(script, "export {API_SERVER_ENV}={}", spec.api_url);
    let _ = writeln!(script, "FLORAD_BIN={}", spec.florad_bin.display());

    script.push('\n');
    script.push_str("# Server agent on the first allocated node\n");
    script.push_str(
        "srun --nodes=1 --ntasks=1 --nodelist=$(scontrol show hostname $SLURM_JOB_NODELIST | head -n 1) \\\n",
    );
    let _ = writeln!(
        script,
        "  $FLORAD_BIN server-agent --api-server ${API_SERVER_ENV} \\\n  > {logs}/server-agent-$SLURM_JOB_ID.log 2>&1 &"
    );

    script.push('\n');
    script.push_str("# Client agents on the remaining nodes\n");
    script.push_str("if [ $SLURM_NNODES -gt 1 ]; then\n");
    script.push_str("  for node in $(scontrol show hostname $SLURM_JOB_NODELIST | tail -n +2); do\n");
    script.push_str("    srun --nodes=1 --ntasks=1 --nodelist=$node \\\n");
    let _ = writeln!(
        script,
        "      $FLORAD_BIN client-agent --api-server ${API_SERVER_ENV} \\\n      > {logs}/client-agent-$node-$SLURM_JOB_ID.log 2>&1 &"
    );
    script.push_str("  done\n");
    script.push_str("fi\n");

    script.push('\n');
    script.push_str("wait\n");
    script
}
