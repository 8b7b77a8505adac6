//! SLURM client — runs the scheduler's programs and captures their output.
//!
//! The client never interprets output beyond "exit status zero"; parsing
//! stays with the caller. `CommandRunner` is the seam tests use to
//! substitute canned textual output for real scheduler invocations.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::error::{SlurmError, SlurmResult};

/// Scheduler commands the coordinator depends on.
const REQUIRED_COMMANDS: &[&str] = &["sbatch", "scancel", "squeue", "scontrol", "sinfo"];

/// Prefix sbatch prints ahead of the job id.
const SUBMITTED_PREFIX: &str = "Submitted batch job ";

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command_line: String,
    /// stdout followed by stderr.
    pub output: String,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs. The system implementation spawns real processes;
/// tests provide a `ScriptedRunner` with fixed output instead.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> SlurmResult<CommandOutput>;
}

/// `CommandRunner` backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> SlurmResult<CommandOutput> {
        let command_line = render_command_line(program, args);
        debug!(command = %command_line, "running scheduler command");

        let out = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SlurmError::ProgramNotFound {
                    program: program.to_string(),
                }
            } else {
                SlurmError::Io(e)
            }
        })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        let result = CommandOutput {
            command_line,
            output,
            code: out.status.code(),
        };
        if !result.success() {
            return Err(SlurmError::CommandFailed {
                command_line: result.command_line,
                code: result.code,
                output: result.output,
            });
        }
        Ok(result)
    }
}

fn render_command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Typed operations over the scheduler's programs.
#[derive(Clone)]
pub struct SlurmClient {
    runner: Arc<dyn CommandRunner>,
}

impl Default for SlurmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SlurmClient {
    pub fn new() -> Self {
        Self {
            runner: Arc::new(SystemRunner),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Submit a batch script. The caller parses the job id out of the output.
    pub fn submit(&self, script_path: &Path) -> SlurmResult<CommandOutput> {
        self.runner.run("sbatch", &[&script_path.to_string_lossy()])
    }

    /// Cancel a job by id.
    pub fn cancel(&self, job_id: &str) -> SlurmResult<CommandOutput> {
        self.runner.run("scancel", &[job_id])
    }

    /// Queued jobs, optionally narrowed to a user with a format template.
    pub fn queue(&self, user: Option<&str>, format: Option<&str>) -> SlurmResult<CommandOutput> {
        let mut args: Vec<&str> = Vec::new();
        if let Some(user) = user {
            args.push("-u");
            args.push(user);
        }
        if let Some(format) = format {
            args.push("-o");
            args.push(format);
        }
        self.runner.run("squeue", &args)
    }

    /// Detailed description of one job.
    pub fn job_detail(&self, job_id: &str) -> SlurmResult<CommandOutput> {
        self.runner.run("scontrol", &["show", "job", job_id])
    }

    /// Per-node partition/state listing used by the monitoring endpoint.
    pub fn nodes(&self) -> SlurmResult<CommandOutput> {
        self.runner.run("sinfo", &["-N", "-o", "%N %T %C %m %e %f"])
    }

    /// State counts across all nodes and queued jobs.
    pub fn cluster_status(&self) -> SlurmResult<ClusterStatus> {
        let mut status = ClusterStatus::default();
        let nodes = self.runner.run("sinfo", &["-h", "-o", "%T"])?;
        for state in non_empty_lines(&nodes.output) {
            *status.nodes.entry(state.to_string()).or_insert(0) += 1;
            status.total_nodes += 1;
        }
        let jobs = self.runner.run("squeue", &["-h", "-o", "%T"])?;
        for state in non_empty_lines(&jobs.output) {
            *status.jobs.entry(state.to_string()).or_insert(0) += 1;
            status.total_jobs += 1;
        }
        Ok(status)
    }

    /// Probe every required scheduler command; the error names what is
    /// missing so startup can log a useful degraded-mode warning.
    pub fn availability(&self) -> SlurmResult<()> {
        let mut missing = Vec::new();
        for cmd in REQUIRED_COMMANDS {
            if self.runner.run("which", &[cmd]).is_err() {
                missing.push(*cmd);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SlurmError::ProgramNotFound {
                program: missing.join(", "),
            })
        }
    }

    /// Extract the job id from sbatch output (`Submitted batch job <id>`).
    pub fn parse_job_id(output: &str) -> Option<String> {
        output
            .lines()
            .find_map(|line| line.trim().strip_prefix(SUBMITTED_PREFIX))
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    }
}

/// Aggregated cluster state, keyed by the scheduler's own state names
/// (idle, allocated, RUNNING, PENDING, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterStatus {
    pub nodes: HashMap<String, u32>,
    pub jobs: HashMap<String, u32>,
    pub total_nodes: u32,
    pub total_jobs: u32,
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// `CommandRunner` returning canned output per program and recording every
/// invocation. For tests.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned stdout for a program; programs without a response report
    /// `ProgramNotFound`.
    pub fn respond(mut self, program: &str, output: &str) -> Self {
        self.responses.insert(program.to_string(), output.to_string());
        self
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str]) -> SlurmResult<CommandOutput> {
        let command_line = render_command_line(program, args);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command_line.clone());
        match self.responses.get(program) {
            Some(output) => Ok(CommandOutput {
                command_line,
                output: output.clone(),
                code: Some(0),
            }),
            None => Err(SlurmError::ProgramNotFound {
                program: program.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_job_id() {
        assert_eq!(
            SlurmClient::parse_job_id("Submitted batch job 12345\n"),
            Some("12345".to_string())
        );
    }

    #[test]
    fn parses_a_job_id_among_other_lines() {
        let output = "sbatch: lua: extra partition checks passed\nSubmitted batch job 98765\n";
        assert_eq!(SlurmClient::parse_job_id(output), Some("98765".to_string()));
    }

    #[test]
    fn no_job_id_in_unrelated_output() {
        assert_eq!(SlurmClient::parse_job_id("error: invalid partition\n"), None);
        assert_eq!(SlurmClient::parse_job_id(""), None);
    }

    #[test]
    fn scripted_runner_records_command_lines() {
        let runner = Arc::new(ScriptedRunner::new().respond("scancel", ""));
        let client = SlurmClient::with_runner(runner.clone());

        client.cancel("12345").unwrap();
        assert_eq!(runner.calls(), vec!["scancel 12345".to_string()]);
    }

    #[test]
    fn missing_program_is_reported_distinctly() {
        let runner = Arc::new(ScriptedRunner::new());
        let client = SlurmClient::with_runner(runner);

        match client.cancel("12345") {
            Err(SlurmError::ProgramNotFound { program }) => assert_eq!(program, "scancel"),
            other => panic!("expected ProgramNotFound, got {other:?}"),
        }
    }

    #[test]
    fn availability_names_missing_commands() {
        let runner = Arc::new(ScriptedRunner::new());
        let client = SlurmClient::with_runner(runner);

        match client.availability() {
            Err(SlurmError::ProgramNotFound { program }) => {
                assert!(program.contains("sbatch"));
                assert!(program.contains("sinfo"));
            }
            other => panic!("expected ProgramNotFound, got {other:?}"),
        }
    }

    #[test]
    fn availability_passes_when_which_answers() {
        let runner = Arc::new(ScriptedRunner::new().respond("which", "/usr/bin/placeholder\n"));
        let client = SlurmClient::with_runner(runner);
        client.availability().unwrap();
    }

    #[test]
    fn queue_builds_user_and_format_args() {
        let runner = Arc::new(ScriptedRunner::new().respond("squeue", "JOBID\n"));
        let client = SlurmClient::with_runner(runner.clone());

        client.queue(Some("alice"), Some("%i %T")).unwrap();
        assert_eq!(runner.calls(), vec!["squeue -u alice -o %i %T".to_string()]);
    }

    #[test]
    fn cluster_status_tallies_states() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .respond("sinfo", "idle\nidle\nallocated\n")
                .respond("squeue", "RUNNING\nPENDING\n\n"),
        );
        let client = SlurmClient::with_runner(runner);

        let status = client.cluster_status().unwrap();
        assert_eq!(status.nodes.get("idle"), Some(&2));
        assert_eq!(status.nodes.get("allocated"), Some(&1));
        assert_eq!(status.total_nodes, 3);
        assert_eq!(status.jobs.get("RUNNING"), Some(&1));
        assert_eq!(status.total_jobs, 2);
    }

    #[test]
    fn system_runner_reports_unknown_binary_as_not_found() {
        let result = SystemRunner.run("definitely-not-a-scheduler-command", &[]);
        match result {
            Err(SlurmError::ProgramNotFound { program }) => {
                assert_eq!(program, "definitely-not-a-scheduler-command")
            }
            other => panic!("expected ProgramNotFound, got {other:?}"),
        }
    }

    #[test]
    fn system_runner_captures_combined_output() {
        let result = SystemRunner.run("sh", &["-c", "echo out; echo err >&2"]).unwrap();
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
        assert!(result.success());
    }

    #[test]
    fn system_runner_surfaces_nonzero_exit() {
        match SystemRunner.run("sh", &["-c", "echo boom >&2; exit 3"]) {
            Err(SlurmError::CommandFailed { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert!(output.contains("boom"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}
