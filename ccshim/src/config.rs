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

use std::path::PathBuf;

use ccshim_core::{
    RuleTable, CCSHIM_ASSUME_AARCH64_ENV, CCSHIM_CC_ENV, CCSHIM_PYTHON_ENV, CCSHIM_RULES_ENV,
    CCSHIM_RUNTIME_VERSION_ENV, CCSHIM_SSE2NEON_ROOT_ENV, CCSHIM_SSE2NEON_URL_ENV,
    SSE2NEON_REPO_URL,
};
use log::warn;

use crate::toolchain::{
    InterpreterDescriptor, RuntimeDescriptor, StaticDescriptor, ToolchainIdentity,
};
use crate::ShimResult;

const DEFAULT_PYTHON: &str = "python3";

/// Everything the shim reads from its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimConfig {
    /// Compiler name to use as-is, skipping version string scraping.
    pub compiler: Option<String>,
    pub runtime_version: Option<String>,
    pub python: String,
    /// Skips the architecture probe.
    pub assume_aarch64: Option<bool>,
    pub sse2neon_root: PathBuf,
    pub sse2neon_url: String,
    /// JSON file with additional strip rules.
    pub rules_file: Option<PathBuf>,
}

impl ShimConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let assume_aarch64 = get(CCSHIM_ASSUME_AARCH64_ENV).and_then(|value| {
            match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => {
                    warn!("ignoring {CCSHIM_ASSUME_AARCH64_ENV}={value:?}");
                    None
                }
            }
        });

        Self {
            compiler: get(CCSHIM_CC_ENV),
            runtime_version: get(CCSHIM_RUNTIME_VERSION_ENV),
            python: get(CCSHIM_PYTHON_ENV).unwrap_or_else(|| DEFAULT_PYTHON.to_owned()),
            assume_aarch64,
            sse2neon_root: get(CCSHIM_SSE2NEON_ROOT_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            sse2neon_url: get(CCSHIM_SSE2NEON_URL_ENV)
                .unwrap_or_else(|| SSE2NEON_REPO_URL.to_owned()),
            rules_file: get(CCSHIM_RULES_ENV).map(PathBuf::from),
        }
    }

    pub fn runtime_descriptor(&self) -> Box<dyn RuntimeDescriptor> {
        match &self.runtime_version {
            Some(version) => Box::new(StaticDescriptor(version.clone())),
            None => Box::new(InterpreterDescriptor::new(&self.python)),
        }
    }

    pub fn toolchain(&self) -> ShimResult<ToolchainIdentity> {
        match &self.compiler {
            Some(compiler) => ToolchainIdentity::new(compiler),
            None => ToolchainIdentity::resolve(self.runtime_descriptor().as_ref()),
        }
    }

    /// The built-in rules, followed by the ones from `rules_file`.
    pub fn rule_table(&self) -> ShimResult<RuleTable> {
        let mut rules = RuleTable::builtin();
        if let Some(path) = &self.rules_file {
            let json = std::fs::read_to_string(path)?;
            rules.extend(RuleTable::from_json(&json)?);
        }
        Ok(rules)
    }
}
