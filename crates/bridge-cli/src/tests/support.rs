//! Test support utilities for CLI unit and behavioural coverage.
//!
//! Supplies a world that owns a status directory, an optional fake endpoint,
//! and captured IO, so step definitions and unit tests stay focused on their
//! assertions.

use std::cell::RefCell;
use std::ffi::OsString;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use bridge_client::test_support::{Behaviour, FakeEndpoint, StatusDirectory};
use bridge_config::Config;
use rstest::fixture;
use serde_json::Value;

use crate::{AppError, ConfigLoader, IoStreams, run_with_loader};

const STATUS_FILE: &str = "bridge-editor.json";
const WAIT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(50);

/// A config loader that returns a fixed configuration for tests.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Test world holding configuration, the fake endpoint, and captured IO.
pub(super) struct TestWorld {
    pub config: Config,
    pub status: StatusDirectory,
    pub endpoint: Option<FakeEndpoint>,
    pub stdin: Vec<u8>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<ExitCode>,
}

impl TestWorld {
    pub fn new() -> Result<Self> {
        let status = StatusDirectory::new()?;
        let config = Config {
            status_dirs: status.path().to_string_lossy().into_owned(),
            request_timeout_secs: 5,
            ..Config::default()
        };
        Ok(Self {
            config,
            status,
            endpoint: None,
            stdin: Vec::new(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
        })
    }

    pub fn start_endpoint(&mut self, behaviour: Behaviour) -> Result<()> {
        let endpoint = FakeEndpoint::spawn(behaviour)?;
        self.status
            .publish_port(STATUS_FILE, endpoint.port(), Duration::from_secs(1))?;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    pub fn set_batch_input<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stdin.clear();
        for line in lines {
            self.stdin.extend_from_slice(line.as_ref().as_bytes());
            self.stdin.push(b'\n');
        }
    }

    pub fn run(&mut self, command: &str) {
        self.stdout.clear();
        self.stderr.clear();
        let args = Self::build_args(command);
        let loader = StaticConfigLoader::new(self.config.clone());
        let mut stdin = self.stdin.as_slice();
        let io = IoStreams::new(&mut stdin, &mut self.stdout, &mut self.stderr);
        self.exit_code = Some(run_with_loader(args, io, &loader));
    }

    fn build_args(command: &str) -> Vec<OsString> {
        let mut args = vec![OsString::from("unity-bridge")];
        let trimmed = command.trim();
        if !trimmed.is_empty() {
            args.extend(
                trimmed
                    .split_whitespace()
                    .map(|token| OsString::from(token.trim_matches('"'))),
            );
        }
        args
    }

    pub fn stdout_text(&self) -> Result<String> {
        String::from_utf8(self.stdout.clone()).context("stdout utf8")
    }

    pub fn stderr_text(&self) -> Result<String> {
        String::from_utf8(self.stderr.clone()).context("stderr utf8")
    }

    /// Parses each stdout line as one JSON reply.
    pub fn responses(&self) -> Result<Vec<Value>> {
        self.stdout_text()?
            .lines()
            .map(|line| serde_json::from_str(line).with_context(|| format!("parse {line:?}")))
            .collect()
    }

    /// Parses the whole of stdout as a single JSON document.
    pub fn response(&self) -> Result<Value> {
        serde_json::from_str(&self.stdout_text()?).context("parse stdout as JSON")
    }

    pub fn assert_exit_code(&self, expected: u8) -> Result<()> {
        let exit = self.exit_code.context("exit code recorded")?;
        ensure!(
            exit == ExitCode::from(expected),
            "expected exit code {expected}, got {exit:?}; stderr: {:?}",
            self.stderr_text()?
        );
        Ok(())
    }

    pub fn endpoint(&self) -> Result<&FakeEndpoint> {
        self.endpoint.as_ref().context("fake endpoint not started")
    }

    pub fn endpoint_requests(&self) -> Result<Vec<Value>> {
        self.endpoint()?.requests()
    }

    pub fn assert_connections(&self, expected: usize) -> Result<()> {
        let endpoint = self.endpoint()?;
        ensure!(
            endpoint.wait_for_connections(expected, WAIT),
            "endpoint saw {} connection(s), expected {expected}",
            endpoint.connections()
        );
        std::thread::sleep(SETTLE);
        ensure!(
            endpoint.connections() == expected,
            "endpoint saw {} connection(s), expected {expected}",
            endpoint.connections()
        );
        Ok(())
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new().expect("create test world"))
}
