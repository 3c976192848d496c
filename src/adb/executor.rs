// adb client executor: a HostCommand fixed to the bridge binary, plus the
// newline repair needed for binary payloads read back through a tty.
use std::env;
use std::ops::{Deref, DerefMut};

use log::debug;

use super::command::HostCommand;
use super::error::{AdbError, AdbResult};

/// Environment override for the adb binary location.
pub const ADB_PROGRAM_ENV: &str = "ADB";
pub const DEFAULT_ADB_PROGRAM: &str = "adb";

/// Resolve the adb client program, honoring the `ADB` env override.
pub fn adb_program() -> String {
    env::var(ADB_PROGRAM_ENV).unwrap_or_else(|_| DEFAULT_ADB_PROGRAM.to_string())
}

/// Replace every CR,LF pair with LF, in place. The adb transport cooks
/// binary stdout this way; lone CRs and lone LFs are real payload bytes
/// and must survive untouched. Never apply this to line-oriented text.
pub fn repair_crlf(bytes: &mut Vec<u8>) {
    let mut write = 0;
    let mut read = 0;
    let len = bytes.len();
    while read < len {
        if bytes[read] == b'\r' && read + 1 < len && bytes[read + 1] == b'\n' {
            bytes[write] = b'\n';
            read += 2;
        } else {
            bytes[write] = bytes[read];
            read += 1;
        }
        write += 1;
    }
    bytes.truncate(write);
}

/// Command executor whose program is the adb client.
pub struct AdbExecutor {
    cmd: HostCommand,
}

impl AdbExecutor {
    pub fn new() -> Self {
        Self {
            cmd: HostCommand::new(adb_program()),
        }
    }

    /// Point the executor at a different client binary. Used by tests and
    /// by setups with a renamed platform-tools install.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            cmd: HostCommand::new(program),
        }
    }

    /// Executor backed by a throwaway shell script standing in for the
    /// adb client. The script ignores its arguments and runs `body`, so
    /// a test can fake whatever device output it needs.
    #[cfg(test)]
    pub(crate) fn scripted(tag: &str, body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let path = env::temp_dir().join(format!("fake-adb-{}-{tag}", std::process::id()));
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake adb script");
        let mut permissions = std::fs::metadata(&path)
            .expect("stat fake adb script")
            .permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("mark fake adb script executable");
        Self::with_program(path.to_string_lossy().into_owned())
    }

    /// Reset the argument list to a `shell` invocation with the given
    /// on-device command words.
    pub fn shell<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd.clear();
        self.cmd.arg("shell");
        self.cmd.args(args);
        self
    }

    /// `shell(...)` followed by a bounded foreground run.
    pub async fn run_shell<I, S>(&mut self, args: I) -> AdbResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell(args);
        self.cmd.run().await
    }

    /// Undo the transport's CRLF cooking on a binary capture.
    pub fn fix_newlines(&mut self) {
        let mut bytes = self.cmd.take_stdout();
        repair_crlf(&mut bytes);
        self.cmd.set_stdout(bytes);
    }
}

impl Default for AdbExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for AdbExecutor {
    type Target = HostCommand;

    fn deref(&self) -> &HostCommand {
        &self.cmd
    }
}

impl DerefMut for AdbExecutor {
    fn deref_mut(&mut self) -> &mut HostCommand {
        &mut self.cmd
    }
}

/// Probe that the adb client starts at all. Returns its version banner
/// line. A missing binary maps to a clear install hint.
pub async fn ensure_adb_available() -> AdbResult<String> {
    probe_client(&adb_program()).await
}

async fn probe_client(program: &str) -> AdbResult<String> {
    let mut cmd = HostCommand::new(program);
    cmd.arg("version");
    match cmd.run().await {
        Ok(()) => {
            let banner = cmd
                .output_lines()
                .into_iter()
                .next()
                .unwrap_or_else(|| "unknown version".to_string());
            debug!("adb client: {banner}");
            Ok(banner)
        }
        Err(err) if err.is_program_missing() => Err(AdbError::ClientNotFound {
            program: program.to_string(),
        }),
        Err(err) => Err(err),
    }
}
