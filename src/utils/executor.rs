//! Command execution abstraction for testability
//!
//! Every adapter and stage runs its external programs through a
//! [`CommandExecutor`], so tests can swap in the recording [`mock::MockExecutor`].

use super::command::CommandSpec;
use anyhow::Result;
use std::process::Output;

/// Abstraction for command execution, enabling mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a command, failing on non-zero exit or timeout
    fn run(&self, spec: &CommandSpec) -> Result<Output>;

    /// Run a command and return stdout as string
    fn run_stdout(&self, spec: &CommandSpec) -> Result<String> {
        let output = self.run(spec)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Whether `program` can be found on PATH
    fn is_available(&self, program: &str) -> bool;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        super::command::run(spec)
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        /// Environment variable names only; values are never recorded
        pub env_keys: Vec<String>,
        pub working_dir: Option<String>,
    }

    impl CommandCall {
        pub fn has_arg(&self, arg: &str) -> bool {
            self.args.iter().any(|a| a == arg)
        }
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    impl MockResponse {
        pub fn stdout(stdout: &str) -> Self {
            MockResponse::Success {
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }

        pub fn failure(stderr: &str) -> Self {
            MockResponse::Failure {
                stderr: stderr.to_string(),
                exit_code: 1,
            }
        }
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses: program name -> response
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
        /// Programs reported as installed by `is_available`
        available: Arc<Mutex<HashSet<String>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for a specific program
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(program.to_string(), response);
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        /// Mark a program as present on PATH
        pub fn with_program(self, program: &str) -> Self {
            self.available.lock().unwrap().insert(program.to_string());
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Recorded calls to one program, in order
        pub fn calls_to(&self, program: &str) -> Vec<CommandCall> {
            self.get_calls()
                .into_iter()
                .filter(|c| c.program == program)
                .collect()
        }

        /// Check if a program was called
        pub fn was_called(&self, program: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.program == program)
        }

        /// Get number of calls to a specific program
        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        fn record_call(&self, spec: &CommandSpec) {
            self.calls.lock().unwrap().push(CommandCall {
                program: spec.program.clone(),
                args: spec.args.clone(),
                env_keys: spec.envs.iter().map(|(k, _)| k.clone()).collect(),
                working_dir: spec.current_dir.as_ref().map(|p| p.display().to_string()),
            });
        }

        fn get_response(&self, program: &str) -> MockResponse {
            self.responses
                .lock()
                .unwrap()
                .get(program)
                .cloned()
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }

        fn execute_response(&self, spec: &CommandSpec, response: MockResponse) -> Result<Output> {
            match response {
                MockResponse::Success { stdout, stderr } => Ok(Output {
                    status: std::process::ExitStatus::default(),
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                }),
                MockResponse::Failure { stderr, exit_code } => {
                    anyhow::bail!(
                        "{} failed with exit code {:?}: {}",
                        spec.program,
                        exit_code,
                        stderr
                    )
                }
                MockResponse::Timeout => {
                    anyhow::bail!("{} timed out", spec.program)
                }
            }
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run(&self, spec: &CommandSpec) -> Result<Output> {
            self.record_call(spec);
            let response = self.get_response(&spec.program);
            self.execute_response(spec, response)
        }

        fn is_available(&self, program: &str) -> bool {
            self.available.lock().unwrap().contains(program)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn test_mock_executor_records_calls() {
        let executor = MockExecutor::new().with_default_response(MockResponse::stdout("output"));

        let spec = CommandSpec::new("test-program")
            .args(["arg1", "arg2"])
            .env("SECRET", "value")
            .current_dir("/tmp");
        let _ = executor.run(&spec);

        assert!(executor.was_called("test-program"));
        assert_eq!(executor.call_count("test-program"), 1);

        let calls = executor.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "test-program");
        assert_eq!(calls[0].args, vec!["arg1", "arg2"]);
        assert_eq!(calls[0].env_keys, vec!["SECRET"]);
        assert_eq!(calls[0].working_dir.as_deref(), Some("/tmp"));
    }

    #[test]
    fn test_mock_executor_configured_response() {
        let executor = MockExecutor::new().expect("my-program", MockResponse::stdout("expected output"));

        let result = executor.run_stdout(&CommandSpec::new("my-program"));
        assert_eq!(result.unwrap(), "expected output");
    }

    #[test]
    fn test_mock_executor_failure_response() {
        let executor = MockExecutor::new().expect("failing-program", MockResponse::failure("error message"));

        let result = executor.run(&CommandSpec::new("failing-program"));
        assert!(result.unwrap_err().to_string().contains("error message"));
    }

    #[test]
    fn test_mock_executor_availability() {
        let executor = MockExecutor::new().with_program("pigz");
        assert!(executor.is_available("pigz"));
        assert!(!executor.is_available("pbzip2"));
    }
}
