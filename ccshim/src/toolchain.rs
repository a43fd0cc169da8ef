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

use std::ffi::OsString;
use std::process::Command;

use log::debug;

use crate::{ShimError, ShimResult};

/// Something that can describe the runtime the build is driven from,
/// including the compiler that runtime was built with.
pub trait RuntimeDescriptor {
    fn version_string(&self) -> ShimResult<String>;
}

/// A version string known up front.
pub struct StaticDescriptor(pub String);

impl RuntimeDescriptor for StaticDescriptor {
    fn version_string(&self) -> ShimResult<String> {
        Ok(self.0.clone())
    }
}

/// Asks a Python interpreter for `sys.version`, which ends with the
/// compiler the interpreter was built with, e.g.
/// `3.11.4 (main, Jun 20 2023) [Clang 14.0.3 (clang-1403.0.22.14.1)]`.
pub struct InterpreterDescriptor {
    program: OsString,
}

impl InterpreterDescriptor {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RuntimeDescriptor for InterpreterDescriptor {
    fn version_string(&self) -> ShimResult<String> {
        let output = Command::new(&self.program)
            .args(["-c", "import sys; print(sys.version)"])
            .output()
            .map_err(|e| {
                ShimError::Resolution(format!(
                    "cannot run {}: {e}",
                    self.program.to_string_lossy()
                ))
            })?;

        if !output.status.success() {
            return Err(ShimError::Resolution(format!(
                "{} exited with {}",
                self.program.to_string_lossy(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

/// The lowercase name of the real compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainIdentity(String);

impl ToolchainIdentity {
    pub fn new(name: impl AsRef<str>) -> ShimResult<Self> {
        let name = name.as_ref().trim().to_lowercase();
        if name.is_empty() {
            return Err(ShimError::Resolution("empty compiler name".to_owned()));
        }
        Ok(Self(name))
    }

    pub fn resolve(descriptor: &dyn RuntimeDescriptor) -> ShimResult<Self> {
        let version = descriptor.version_string()?;
        let identity = Self::from_version_string(&version)?;
        debug!("resolved compiler {} from {:?}", identity.name(), version);
        Ok(identity)
    }

    pub fn from_version_string(version: &str) -> ShimResult<Self> {
        match bracketed_word(version) {
            Some(word) => Self::new(word),
            None => Err(ShimError::Resolution(format!(
                "no `[compiler ...]` in version string {version:?}"
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// First run of word characters directly after a `[`.
fn bracketed_word(s: &str) -> Option<&str> {
    s.match_indices('[').find_map(|(idx, _)| {
        let rest = &s[idx + 1..];
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    })
}
