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

//! A stand-in for the C/C++ compiler that setuptools (or any build tool
//! that hands the same flags to every source file) invokes.
//!
//! The pipeline, per invocation:
//! 1. resolve the real compiler ([`toolchain`]);
//! 2. probe whether the host is arm64 ([`arch`]);
//! 3. on arm64, make sure `sse2neon.h` is available ([`provision`]);
//! 4. fix up the command line for the file being compiled ([`invocation`]);
//! 5. run the real compiler and relay its result ([`dispatch`]).

use std::path::PathBuf;
use std::process::Output;

use ccshim_core::{Platform, RuleTable};
use log::{debug, info};

pub mod arch;
pub mod config;
pub mod dispatch;
pub mod invocation;
pub mod provision;
pub mod toolchain;

use arch::ArchitectureDetector;
use dispatch::Delegate;
use invocation::Invocation;
use provision::Provisioner;
use toolchain::ToolchainIdentity;

/// Exit code used when the header could not be provisioned.
pub const PROVISIONING_EXIT_CODE: i32 = 1;
/// Exit code for every other failure of the shim itself.
pub const SHIM_FAILURE_EXIT_CODE: i32 = 101;

/// The command line does not have the shape the build tool is known to
/// produce.
#[derive(Debug, thiserror::Error)]
pub enum MalformedInvocation {
    #[error("no `-c` in the compiler command line")]
    MissingSourceMarker,
    #[error("`-c` is the last argument, expected a source path after it")]
    MissingSourcePath,
    #[error("expected flag `{flag}` is missing from the compiler command line")]
    FlagNotFound { flag: String },
    #[error("argument {0:?} is not valid unicode")]
    NotUnicode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("cannot resolve the real compiler: {0}")]
    Resolution(String),
    #[error("failed to provision {} from {url}: {reason}", .dest.display())]
    Provisioning {
        url: String,
        dest: PathBuf,
        reason: String,
    },
    #[error("malformed invocation: {0}")]
    MalformedInvocation(#[from] MalformedInvocation),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

impl ShimError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShimError::Provisioning { .. } => PROVISIONING_EXIT_CODE,
            _ => SHIM_FAILURE_EXIT_CODE,
        }
    }

    /// Whether this is a "destination already exists" failure.
    pub fn is_already_exists(&self) -> bool {
        match self {
            ShimError::Git(e) => e.code() == git2::ErrorCode::Exists,
            ShimError::IO(e) => e.kind() == std::io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }
}

pub type ShimResult<T = ()> = Result<T, ShimError>;

pub struct Shim<'a> {
    pub toolchain: ToolchainIdentity,
    pub platform: Platform,
    pub rules: RuleTable,
    pub detector: &'a dyn ArchitectureDetector,
    pub provisioner: Provisioner<'a>,
    pub delegate: &'a dyn Delegate,
}

impl<'a> Shim<'a> {
    /// Computes the command line the real compiler will be run with.
    ///
    /// The invocation is validated before anything else happens, so a
    /// malformed command line never probes, clones or compiles.
    pub fn translate<I, S>(&self, argv: I) -> ShimResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = Invocation::parse(argv)?;
        debug!(
            "source file: {} ({:?})",
            invocation.source(),
            invocation.source_kind()
        );

        let include_flag = if self.detector.is_aarch64() {
            info!("arm64 host, sse2neon is required");
            self.provisioner.ensure()?;
            Some(self.provisioner.include_flag())
        } else {
            None
        };

        let args = invocation::translate(
            &invocation,
            &self.toolchain,
            &self.platform,
            include_flag.as_deref(),
            &self.rules,
        )?;

        Ok(args)
    }

    /// Translates `argv` and runs the real compiler with the result.
    ///
    /// A compiler that fails is not an error here; its status is in the
    /// returned [`Output`].
    pub fn run<I, S>(&self, argv: I) -> ShimResult<Output>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = self.translate(argv)?;
        info!("running {:?}", args);
        Ok(self.delegate.run(&args)?)
    }
}
