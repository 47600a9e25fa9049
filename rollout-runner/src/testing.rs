//! Test doubles for command execution and the quality gate

use async_trait::async_trait;
use rollout_sonar::{
    CeTask, CeTaskStatus, GateCondition, ProjectStatus, QualityGateStatus, REPORT_TASK_PATH,
    SonarError,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use tempfile::TempDir;

use crate::command::{CommandExecutor, CommandOutput, CommandSpec, ExecError};
use crate::quality_gate::QualityGate;

struct Rule {
    program: String,
    prefix: Vec<String>,
    response: Response,
}

#[derive(Clone)]
enum Response {
    Output(CommandOutput),
    SpawnError,
}

/// Executor that records invocations and answers from scripted rules
///
/// The first rule whose program and leading arguments match wins. Commands
/// without a rule succeed with empty output.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, program: &str, prefix: &[&str], response: Response) {
        self.rules.lock().unwrap().push(Rule {
            program: program.to_string(),
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            response,
        });
    }

    pub fn respond(&self, program: &str, prefix: &[&str], stdout: &str) -> &Self {
        self.push(
            program,
            prefix,
            Response::Output(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            }),
        );
        self
    }

    pub fn fail(&self, program: &str, prefix: &[&str], exit_code: i32, stderr: &str) -> &Self {
        self.push(
            program,
            prefix,
            Response::Output(CommandOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            }),
        );
        self
    }

    pub fn spawn_error(&self, program: &str) -> &Self {
        self.push(program, &[], Response::SpawnError);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered invocations, in order
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(|spec| spec.to_string()).collect()
    }

    /// Number of invocations of `program` whose arguments start with `prefix`
    pub fn count(&self, program: &str, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|spec| matches_rule(spec, program, prefix))
            .count()
    }
}

fn matches_rule<S: AsRef<str>>(spec: &CommandSpec, program: &str, prefix: &[S]) -> bool {
    spec.program == program
        && prefix.len() <= spec.args.len()
        && prefix
            .iter()
            .zip(&spec.args)
            .all(|(expected, actual)| expected.as_ref() == actual.as_str())
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(spec.clone());

        let response = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| matches_rule(spec, &rule.program, rule.prefix.as_slice()))
            .map(|rule| rule.response.clone());

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnError) => Err(ExecError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}

/// Quality gate that replays scripted task states and a final verdict
pub struct FakeGate {
    states: Mutex<VecDeque<CeTaskStatus>>,
    verdict: QualityGateStatus,
    conditions: Vec<GateCondition>,
    task_error: Mutex<Option<SonarError>>,
    polls: Mutex<usize>,
}

impl FakeGate {
    /// Task reports the given states in order, repeating the last one
    pub fn new(states: &[CeTaskStatus], verdict: QualityGateStatus) -> Self {
        Self {
            states: Mutex::new(states.iter().copied().collect()),
            verdict,
            conditions: Vec::new(),
            task_error: Mutex::new(None),
            polls: Mutex::new(0),
        }
    }

    /// Conditions reported alongside the verdict
    pub fn with_conditions(mut self, conditions: Vec<GateCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// The next task query fails with `error`
    pub fn with_task_error(self, error: SonarError) -> Self {
        *self.task_error.lock().unwrap() = Some(error);
        self
    }

    /// Analysis succeeds immediately with the given verdict
    pub fn passing() -> Self {
        Self::new(&[CeTaskStatus::Success], QualityGateStatus::Ok)
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl QualityGate for FakeGate {
    async fn task(&self, task_id: &str) -> Result<CeTask, SonarError> {
        *self.polls.lock().unwrap() += 1;
        if let Some(error) = self.task_error.lock().unwrap().take() {
            return Err(error);
        }

        let mut states = self.states.lock().unwrap();
        let status = if states.len() > 1 {
            states.pop_front().unwrap_or(CeTaskStatus::Pending)
        } else {
            states.front().copied().unwrap_or(CeTaskStatus::Pending)
        };

        Ok(CeTask {
            id: task_id.to_string(),
            status,
            analysis_id: (status == CeTaskStatus::Success).then(|| "AN-1".to_string()),
            error_message: (status == CeTaskStatus::Failed).then(|| "boom".to_string()),
        })
    }

    async fn verdict(&self, _analysis_id: &str) -> Result<ProjectStatus, SonarError> {
        Ok(ProjectStatus {
            status: self.verdict,
            conditions: self.conditions.clone(),
        })
    }
}

/// Workspace whose scanner report points at analysis task `AYx1`
///
/// The directory is removed when the returned guard is dropped.
pub fn workspace_with_report() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".scannerwork")).unwrap();
    std::fs::write(
        dir.path().join(REPORT_TASK_PATH),
        "projectKey=my-website\nserverUrl=http://sonar:9000\nceTaskId=AYx1\n",
    )
    .unwrap();
    dir
}
