// Reusable external-process runner: accumulate args, spawn, capture
// stdout/stderr/exit status, bounded wait. One command in flight per
// instance; every run overwrites the previous capture.
use std::process::Stdio;
use std::time::Duration;

use log::debug;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::error::{AdbError, AdbResult};

/// Bound applied by `run` / `run_with` while waiting for termination.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HostCommand {
    program: String,
    args: Vec<String>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<i32>,
    child: Option<Child>,
    stdout_task: Option<JoinHandle<Vec<u8>>>,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
            child: None,
            stdout_task: None,
            stderr_task: None,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Append one argument to the stored list.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments to the stored list.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Reset the stored argument list and all captured results. A running
    /// child is not touched.
    pub fn clear(&mut self) -> &mut Self {
        self.args.clear();
        self.stdout.clear();
        self.stderr.clear();
        self.exit_code = None;
        self
    }

    /// Spawn with the stored args and wait for termination (bounded by
    /// `DEFAULT_RUN_TIMEOUT`). Nonzero exits are not an error here; callers
    /// inspect `exit_success()`.
    pub async fn run(&mut self) -> AdbResult<()> {
        self.run_within(DEFAULT_RUN_TIMEOUT).await
    }

    /// `run` with a caller-chosen termination bound. On timeout the child
    /// keeps running; the caller decides between `wait` and `kill`.
    pub async fn run_within(&mut self, limit: Duration) -> AdbResult<()> {
        let args = self.args.clone();
        self.spawn(&args)?;
        self.finish_within(limit).await
    }

    /// Spawn with an override argument list, leaving the stored list as
    /// is, and wait for termination.
    pub async fn run_with<I, S>(&mut self, args: I) -> AdbResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.spawn(&args)?;
        self.finish_within(DEFAULT_RUN_TIMEOUT).await
    }

    /// Spawn with the stored args and return immediately; stdio is drained
    /// in background tasks until `wait` or `kill` harvests it.
    pub fn start(&mut self) -> AdbResult<()> {
        let args = self.args.clone();
        self.spawn(&args)
    }

    /// Bounded wait for an outstanding child. `Ok(true)` means the process
    /// terminated and its output was captured; `Ok(false)` means the bound
    /// elapsed with the process still running, which `is_running()` keeps
    /// reflecting. The timeout itself is the caller's failure to handle.
    pub async fn wait(&mut self, limit: Duration) -> AdbResult<bool> {
        let Some(child) = self.child.as_mut() else {
            return Ok(true);
        };
        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => {
                self.exit_code = Some(status.code().unwrap_or(-1));
                self.child = None;
                self.harvest().await?;
                Ok(true)
            }
            Ok(Err(source)) => {
                self.exit_code = Some(-1);
                self.child = None;
                self.harvest().await?;
                Err(AdbError::Io { source })
            }
            Err(_elapsed) => Ok(false),
        }
    }

    /// Terminate an outstanding child and harvest whatever it produced.
    pub async fn kill(&mut self) -> AdbResult<()> {
        if let Some(child) = self.child.as_mut() {
            child.kill().await?;
            self.exit_code = Some(-1);
            self.child = None;
            self.harvest().await?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn exit_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Move the captured stdout out without copying (framebuffer payloads
    /// run to megabytes).
    pub fn take_stdout(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stdout)
    }

    pub(crate) fn set_stdout(&mut self, bytes: Vec<u8>) {
        self.stdout = bytes;
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn output_starts_with(&self, prefix: &str) -> bool {
        self.output_text().starts_with(prefix)
    }

    /// Substring test over captured stdout, at any position.
    pub fn output_has(&self, needle: &str) -> bool {
        !needle.is_empty() && self.output_text().contains(needle)
    }

    /// Captured stdout split into lines (trailing CR stripped per line).
    pub fn output_lines(&self) -> Vec<String> {
        self.output_text().lines().map(str::to_string).collect()
    }

    /// True when any stdout line contains `key`. With `ignore_comments`
    /// set, lines starting with '#' do not count.
    pub fn output_lines_have(&self, key: &str, ignore_comments: bool) -> bool {
        self.output_text().lines().any(|line| {
            if ignore_comments && line.trim_start().starts_with('#') {
                return false;
            }
            line.contains(key)
        })
    }

    /// Build the error describing a finished command's nonzero exit.
    pub fn exit_failure(&self) -> AdbError {
        AdbError::CommandFailed {
            command: self.command_line(),
            code: self.exit_code.unwrap_or(-1),
            stderr: self.error_text().trim().to_string(),
        }
    }

    /// Program plus args, for log lines and error descriptions.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn spawn(&mut self, args: &[String]) -> AdbResult<()> {
        if self.is_running() {
            return Err(AdbError::ExecutorBusy {
                command: self.command_line(),
            });
        }
        self.stdout.clear();
        self.stderr.clear();
        self.exit_code = None;

        debug!("spawning: {} {}", self.program, args.join(" "));
        let mut child = match Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                // Failed spawns still leave a nonzero marker so
                // exit_success() stays false for this attempt.
                self.exit_code = Some(-1);
                self.stderr = format!("spawn failed: {source}").into_bytes();
                return Err(AdbError::SpawnFailed {
                    program: self.program.clone(),
                    source,
                });
            }
        };

        self.stdout_task = child.stdout.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });
        self.stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });
        self.child = Some(child);
        Ok(())
    }

    async fn finish_within(&mut self, limit: Duration) -> AdbResult<()> {
        if self.wait(limit).await? {
            Ok(())
        } else {
            Err(AdbError::Timeout {
                duration: limit,
                description: self.command_line(),
            })
        }
    }

    async fn harvest(&mut self) -> AdbResult<()> {
        if let Some(task) = self.stdout_task.take() {
            self.stdout = task.await?;
        }
        if let Some(task) = self.stderr_task.take() {
            self.stderr = task.await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout_and_exit_code() {
        let mut cmd = HostCommand::new("sh");
        cmd.arg("-c").arg("printf hello");
        cmd.run().await.expect("sh should run");

        assert_eq!(cmd.output_text(), "hello", "stdout should be captured");
        assert_eq!(cmd.exit_code(), Some(0), "exit code should be recorded");
        assert!(cmd.exit_success(), "zero exit should be a success");
        assert!(!cmd.is_running(), "process should be reaped after run");
    }

    #[tokio::test]
    async fn test_run_captures_stderr_and_nonzero_exit() {
        let mut cmd = HostCommand::new("sh");
        cmd.arg("-c").arg("echo oops >&2; exit 3");
        cmd.run().await.expect("nonzero exit is not a run error");

        assert_eq!(cmd.exit_code(), Some(3), "nonzero code should be kept");
        assert!(!cmd.exit_success(), "nonzero exit is not a success");
        assert!(
            cmd.error_text().contains("oops"),
            "stderr should be captured"
        );
    }

    #[tokio::test]
    async fn test_rerun_overwrites_previous_capture() {
        let mut cmd = HostCommand::new("sh");
        cmd.arg("-c").arg("printf first");
        cmd.run().await.expect("first run");
        assert_eq!(cmd.output_text(), "first");

        cmd.run_with(["-c", "printf second"])
            .await
            .expect("second run");
        assert_eq!(
            cmd.output_text(),
            "second",
            "each run must overwrite the captured buffers"
        );
    }

    #[tokio::test]
    async fn test_run_with_leaves_stored_args_alone() {
        let mut cmd = HostCommand::new("sh");
        cmd.arg("-c").arg("printf stored");
        cmd.run_with(["-c", "printf override"])
            .await
            .expect("override run");
        assert_eq!(cmd.output_text(), "override");

        cmd.run().await.expect("stored run");
        assert_eq!(
            cmd.output_text(),
            "stored",
            "override list must not replace the stored args"
        );
    }

    #[tokio::test]
    async fn test_wait_timeout_leaves_process_running() {
        let mut cmd = HostCommand::new("sleep");
        cmd.arg("5");
        cmd.start().expect("sleep should start");

        let finished = cmd
            .wait(Duration::from_millis(50))
            .await
            .expect("wait should not fail");
        assert!(!finished, "sleep 5 cannot finish in 50ms");
        assert!(cmd.is_running(), "timed-out wait must leave the child running");

        cmd.kill().await.expect("kill should succeed");
        assert!(!cmd.is_running(), "killed child should be reaped");
        assert!(!cmd.exit_success(), "killed child is not a success");
    }

    #[tokio::test]
    async fn test_second_run_while_running_is_busy() {
        let mut cmd = HostCommand::new("sleep");
        cmd.arg("5");
        cmd.start().expect("sleep should start");

        let err = cmd.run().await.expect_err("run while running must fail");
        assert!(
            matches!(err, AdbError::ExecutorBusy { .. }),
            "expected ExecutorBusy, got: {err}"
        );

        cmd.kill().await.expect("cleanup kill");
    }

    #[tokio::test]
    async fn test_spawn_failure_sets_nonzero_marker() {
        let mut cmd = HostCommand::new("definitely-not-a-real-binary-42");
        let err = cmd.run().await.expect_err("spawn must fail");
        assert!(err.is_program_missing(), "NotFound should classify as missing");
        assert_eq!(cmd.exit_code(), Some(-1), "spawn failure leaves -1 marker");
        assert!(!cmd.exit_success());
        assert!(
            !cmd.error_text().is_empty(),
            "spawn failure should leave stderr context"
        );
    }

    #[tokio::test]
    async fn test_clear_resets_args_and_capture() {
        let mut cmd = HostCommand::new("sh");
        cmd.arg("-c").arg("printf data");
        cmd.run().await.expect("run");
        assert!(!cmd.output_text().is_empty());

        cmd.clear();
        assert_eq!(cmd.output_text(), "", "clear must drop captured stdout");
        assert_eq!(cmd.exit_code(), None, "clear must drop the exit code");
        assert_eq!(cmd.command_line(), "sh", "clear must drop stored args");
    }

    #[tokio::test]
    async fn test_output_helpers() {
        let mut cmd = HostCommand::new("sh");
        cmd.arg("-c")
            .arg("printf '%s\\n' '-q quality' '# comment -s' 'plain'");
        cmd.run().await.expect("run");

        assert!(
            cmd.output_starts_with("-q"),
            "prefix match at position 0 must count"
        );
        assert!(
            cmd.output_has("-q"),
            "substring match at position 0 must count"
        );
        assert!(cmd.output_has("plain"));
        assert!(!cmd.output_has("absent"));

        assert_eq!(cmd.output_lines().len(), 3);
        assert!(cmd.output_lines_have("quality", true));
        assert!(
            !cmd.output_lines_have("-s", true),
            "comment lines are skipped when ignore_comments is set"
        );
        assert!(
            cmd.output_lines_have("-s", false),
            "comment lines count when ignore_comments is off"
        );
    }
}
