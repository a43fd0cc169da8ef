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

use ccshim_core::{Platform, RuleTable, SourceKind, SOURCE_MARKER};
use log::debug;

use crate::toolchain::ToolchainIdentity;
use crate::MalformedInvocation;

/// The command line the shim was invoked with.
///
/// The first token is the name the build tool believes the compiler
/// has; the source file is whatever follows the first `-c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    args: Vec<String>,
    source_index: usize,
}

impl Invocation {
    pub fn parse<I, S>(argv: I) -> Result<Self, MalformedInvocation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = argv.into_iter().map(Into::into).collect::<Vec<String>>();

        let marker = args
            .iter()
            .skip(1)
            .position(|arg| arg == SOURCE_MARKER)
            .map(|idx| idx + 1)
            .ok_or(MalformedInvocation::MissingSourceMarker)?;

        if marker + 1 >= args.len() {
            return Err(MalformedInvocation::MissingSourcePath);
        }

        Ok(Self {
            args,
            source_index: marker + 1,
        })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn source(&self) -> &str {
        &self.args[self.source_index]
    }

    pub fn source_kind(&self) -> SourceKind {
        SourceKind::from_path(self.source())
    }
}

/// Builds the command line for the real compiler.
///
/// Every flag a matching rule lists has to be present; the first
/// occurrence of each is removed.
pub fn translate(
    invocation: &Invocation,
    toolchain: &ToolchainIdentity,
    platform: &Platform,
    include_flag: Option<&str>,
    rules: &RuleTable,
) -> Result<Vec<String>, MalformedInvocation> {
    let mut args = invocation.args().to_vec();
    args[0] = toolchain.name().to_owned();

    if let Some(flag) = include_flag {
        args.push(flag.to_owned());
    }

    for rule in rules.matching(platform, invocation.source_kind()) {
        for flag in &rule.strip {
            let idx = args
                .iter()
                .skip(1)
                .position(|arg| arg == flag)
                .map(|idx| idx + 1)
                .ok_or_else(|| MalformedInvocation::FlagNotFound { flag: flag.clone() })?;
            debug!("stripping {flag} for {}", invocation.source());
            args.remove(idx);
        }
    }

    Ok(args)
}
