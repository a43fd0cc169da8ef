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

use std::cell::OnceCell;
use std::io::Write;
use std::process::{Command, Stdio};

use log::debug;

use crate::ShimResult;

const PROBE_PROGRAM: &str = "int main (int argc, char **argv) { return 0; }";
const AARCH64_MACRO: &[u8] = b"__aarch64__";

pub trait ArchitectureDetector {
    fn is_aarch64(&self) -> bool;
}

/// Asks the compiler for its predefined macros and looks for
/// `__aarch64__`.
///
/// A probe that fails for any reason reports "not arm64".
pub struct MacroProbe {
    compiler: String,
}

impl MacroProbe {
    pub fn new(compiler: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
        }
    }

    fn probe(&self) -> ShimResult<bool> {
        let mut source = tempfile::Builder::new()
            .prefix("ccshim-probe")
            .suffix(".cpp")
            .tempfile()?;
        source.write_all(PROBE_PROGRAM.as_bytes())?;
        source.flush()?;

        let output = Command::new(&self.compiler)
            .args(["-dM", "-E", "-"])
            .stdin(source.reopen()?)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            debug!("{} -dM -E - exited with {}", self.compiler, output.status);
            return Ok(false);
        }

        Ok(output
            .stdout
            .windows(AARCH64_MACRO.len())
            .any(|w| w == AARCH64_MACRO))
    }
}

impl ArchitectureDetector for MacroProbe {
    fn is_aarch64(&self) -> bool {
        match self.probe() {
            Ok(is_aarch64) => {
                debug!("architecture probe: aarch64 = {is_aarch64}");
                is_aarch64
            }
            Err(e) => {
                debug!("architecture probe failed, assuming not aarch64: {e}");
                false
            }
        }
    }
}

impl<D: ArchitectureDetector + ?Sized> ArchitectureDetector for &D {
    fn is_aarch64(&self) -> bool {
        (**self).is_aarch64()
    }
}

pub struct FixedArchitecture(pub bool);

impl ArchitectureDetector for FixedArchitecture {
    fn is_aarch64(&self) -> bool {
        self.0
    }
}

/// Remembers the first answer of the wrapped detector.
pub struct Cached<D> {
    inner: D,
    answer: OnceCell<bool>,
}

impl<D: ArchitectureDetector> Cached<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            answer: OnceCell::new(),
        }
    }
}

impl<D: ArchitectureDetector> ArchitectureDetector for Cached<D> {
    fn is_aarch64(&self) -> bool {
        *self.answer.get_or_init(|| self.inner.is_aarch64())
    }
}
