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

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ccshim_core::{SSE2NEON_DIR_NAME, SSE2NEON_HEADER_NAME};
use log::{debug, info, warn};

use crate::{ShimError, ShimResult};

/// Fetches the repository at `url` into `dest`.
pub trait HeaderFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> ShimResult<()>;
}

pub struct GitFetcher;

impl HeaderFetcher for GitFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> ShimResult<()> {
        info!("cloning {} into {}", url, dest.display());
        git2::Repository::clone(url, dest)?;
        Ok(())
    }
}

/// How long to wait for a clone another shim is running into the same
/// directory.
pub const DEFAULT_RACE_WAIT: Duration = Duration::from_secs(120);

const RACE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Makes sure `<root>/sse2neon/sse2neon.h` exists.
pub struct Provisioner<'a> {
    root: PathBuf,
    url: String,
    fetcher: &'a dyn HeaderFetcher,
    race_wait: Duration,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        url: impl Into<String>,
        fetcher: &'a dyn HeaderFetcher,
    ) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
            fetcher,
            race_wait: DEFAULT_RACE_WAIT,
        }
    }

    pub fn with_race_wait(mut self, race_wait: Duration) -> Self {
        self.race_wait = race_wait;
        self
    }

    pub fn header_dir(&self) -> PathBuf {
        self.root.join(SSE2NEON_DIR_NAME)
    }

    pub fn header_path(&self) -> PathBuf {
        self.header_dir().join(SSE2NEON_HEADER_NAME)
    }

    pub fn is_provisioned(&self) -> bool {
        self.header_path().is_file()
    }

    /// Fetches the header unless it is already there.
    ///
    /// Another shim may be cloning into the same directory at the same
    /// time. A fetch that fails because the destination already exists
    /// waits for that clone to produce the header, and counts as success
    /// even if the wait runs out.
    pub fn ensure(&self) -> ShimResult<()> {
        if self.is_provisioned() {
            debug!("{} already present", self.header_path().display());
            return Ok(());
        }

        let dest = self.header_dir();
        match self.fetcher.fetch(&self.url, &dest) {
            Ok(()) => {
                if !self.is_provisioned() {
                    warn!(
                        "fetched {} but {} is still missing",
                        self.url,
                        self.header_path().display()
                    );
                }
                Ok(())
            }
            Err(e) if self.is_provisioned() => {
                warn!("fetch failed ({e}), but the header is present now; continuing");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                info!(
                    "{} already exists, waiting for a concurrent clone",
                    dest.display()
                );
                if !self.wait_for_header() {
                    warn!(
                        "{} did not show up within {:?}; continuing",
                        self.header_path().display(),
                        self.race_wait
                    );
                }
                Ok(())
            }
            Err(e) => Err(ShimError::Provisioning {
                url: self.url.clone(),
                dest,
                reason: e.to_string(),
            }),
        }
    }

    fn wait_for_header(&self) -> bool {
        let deadline = Instant::now() + self.race_wait;
        loop {
            if self.is_provisioned() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(RACE_POLL_INTERVAL.min(deadline - now));
        }
    }

    pub fn include_flag(&self) -> String {
        format!("-I{}", self.header_dir().display())
    }
}
