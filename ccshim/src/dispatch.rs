/*
 *        Copyright (c) 2023-2024 Dinu Blanovschi
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        https://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

use std::io::{self, Write};
use std::process::{Command, ExitStatus, Output, Stdio};

/// The real compiler.
pub trait Delegate {
    /// Runs `args[0]` with the remaining arguments, capturing its output.
    fn run(&self, args: &[String]) -> io::Result<Output>;
}

pub struct ProcessDelegate;

impl Delegate for ProcessDelegate {
    fn run(&self, args: &[String]) -> io::Result<Output> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        Command::new(program)
            .args(rest)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
    }
}

/// Writes the captured streams out unchanged.
///
/// Both streams are attempted; the first failure is returned.
pub fn relay(output: &Output, stdout: impl Write, stderr: impl Write) -> io::Result<()> {
    let out = relay_stream(&output.stdout, stdout);
    let err = relay_stream(&output.stderr, stderr);
    out.and(err)
}

fn relay_stream(captured: &[u8], mut stream: impl Write) -> io::Result<()> {
    if captured.is_empty() {
        return Ok(());
    }
    stream.write_all(captured)?;
    stream.flush()
}

/// The code the shim has to exit with for the given compiler status.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
