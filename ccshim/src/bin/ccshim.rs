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

use anyhow::Context;
use ccshim::arch::{ArchitectureDetector, Cached, FixedArchitecture, MacroProbe};
use ccshim::config::ShimConfig;
use ccshim::dispatch::{self, ProcessDelegate};
use ccshim::provision::{GitFetcher, Provisioner};
use ccshim::{MalformedInvocation, Shim, ShimError, SHIM_FAILURE_EXIT_CODE};
use ccshim_core::{Platform, CCSHIM_LOG_ENV};
use log::error;

pub type CcShimResult<T = ()> = anyhow::Result<T>;

fn main_impl() -> CcShimResult<i32> {
    pretty_env_logger::formatted_builder()
        .parse_env(CCSHIM_LOG_ENV)
        .init();

    let argv = std::env::args_os()
        .map(|arg| {
            arg.into_string().map_err(|arg| {
                ShimError::from(MalformedInvocation::NotUnicode(
                    arg.to_string_lossy().into_owned(),
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let config = ShimConfig::from_env();
    let toolchain = config.toolchain()?;
    let rules = config
        .rule_table()
        .context("failed to load extra strip rules")?;

    let probe = Cached::new(MacroProbe::new(toolchain.name()));
    let assumed = config.assume_aarch64.map(FixedArchitecture);
    let detector: &dyn ArchitectureDetector = match &assumed {
        Some(fixed) => fixed,
        None => &probe,
    };

    let fetcher = GitFetcher;
    let delegate = ProcessDelegate;

    let shim = Shim {
        toolchain,
        platform: Platform::current(),
        rules,
        detector,
        provisioner: Provisioner::new(&config.sse2neon_root, &config.sse2neon_url, &fetcher),
        delegate: &delegate,
    };

    let output = shim.run(argv)?;

    // The compiler ran, so its status is what the build has to see.
    if let Err(e) = dispatch::relay(&output, std::io::stdout().lock(), std::io::stderr().lock()) {
        error!("failed to relay compiler output: {e}");
    }

    Ok(dispatch::exit_code(&output.status))
}

fn main() {
    match main_impl() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<ShimError>()
                .map_or(SHIM_FAILURE_EXIT_CODE, ShimError::exit_code);
            std::process::exit(code);
        }
    }
}
