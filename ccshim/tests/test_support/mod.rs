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

use std::cell::{Cell, RefCell};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use ccshim::arch::FixedArchitecture;
use ccshim::dispatch::Delegate;
use ccshim::provision::{HeaderFetcher, Provisioner};
use ccshim::toolchain::ToolchainIdentity;
use ccshim::{Shim, ShimError, ShimResult};
use ccshim_core::{Platform, RuleTable, SSE2NEON_HEADER_NAME, SSE2NEON_REPO_URL};

pub type R<T = ()> = anyhow::Result<T>;

pub const RESOLVED: &str = "clang";

pub fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

pub fn write_header(dest: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dest)?;
    std::fs::write(dest.join(SSE2NEON_HEADER_NAME), "/* sse2neon */\n")
}

/// A local repository with `sse2neon.h` committed at its root, usable
/// as a clone URL.
pub fn init_sse2neon_repo(path: &Path) -> R<String> {
    write_header(path)?;

    let repo = git2::Repository::init(path)?;
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let signature =
        git2::Signature::new("John Doe", "johndoe@example.com", &git2::Time::new(0, 0))?;
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        "Initial commit",
        &repo.find_tree(tree_id)?,
        &[],
    )?;

    Ok(path.to_string_lossy().into_owned())
}

/// What a `git clone` into an existing, non-empty directory leaves behind.
pub fn start_clone_in_progress(dest: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dest.join(".git"))?;
    std::fs::write(dest.join(".git").join("HEAD"), "ref: refs/heads/master\n")
}

/// Stands in for `git clone`.
pub struct CountingFetcher {
    pub calls: Cell<usize>,
    /// `None` means the fetch succeeds.
    pub error: Option<io::ErrorKind>,
    /// Whether the header ends up on disk, regardless of `error`.
    pub leaves_header: bool,
}

impl CountingFetcher {
    pub fn working() -> Self {
        Self {
            calls: Cell::new(0),
            error: None,
            leaves_header: true,
        }
    }

    pub fn broken() -> Self {
        Self {
            calls: Cell::new(0),
            error: Some(io::ErrorKind::ConnectionRefused),
            leaves_header: false,
        }
    }

    /// Another shim finished cloning first.
    pub fn losing_race() -> Self {
        Self {
            calls: Cell::new(0),
            error: Some(io::ErrorKind::AlreadyExists),
            leaves_header: true,
        }
    }

    /// Another shim started cloning and never finished.
    pub fn stalled_race() -> Self {
        Self {
            calls: Cell::new(0),
            error: Some(io::ErrorKind::AlreadyExists),
            leaves_header: false,
        }
    }
}

impl HeaderFetcher for CountingFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> ShimResult<()> {
        assert_eq!(url, SSE2NEON_REPO_URL);
        self.calls.set(self.calls.get() + 1);
        if self.leaves_header {
            write_header(dest)?;
        }
        match self.error {
            None => Ok(()),
            Some(kind) => Err(ShimError::IO(io::Error::new(kind, "fetch failed"))),
        }
    }
}

/// Records every command line it is asked to run.
pub struct RecordingDelegate {
    pub calls: RefCell<Vec<Vec<String>>>,
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RecordingDelegate {
    pub fn exiting_with(code: i32) -> Self {
        Self {
            calls: RefCell::new(vec![]),
            code,
            stdout: vec![],
            stderr: vec![],
        }
    }

    pub fn last_call(&self) -> Option<Vec<String>> {
        self.calls.borrow().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Delegate for RecordingDelegate {
    fn run(&self, args: &[String]) -> io::Result<Output> {
        self.calls.borrow_mut().push(args.to_vec());
        Ok(Output {
            status: exit_status(self.code),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        })
    }
}

pub struct Fixture {
    pub root: tempfile::TempDir,
    pub arch: FixedArchitecture,
    pub fetcher: CountingFetcher,
    pub delegate: RecordingDelegate,
    pub rules: RuleTable,
    pub race_wait: Duration,
}

impl Fixture {
    pub fn new(aarch64: bool) -> R<Self> {
        Ok(Self {
            root: tempfile::tempdir()?,
            arch: FixedArchitecture(aarch64),
            fetcher: CountingFetcher::working(),
            delegate: RecordingDelegate::exiting_with(0),
            rules: RuleTable::builtin(),
            race_wait: Duration::from_millis(50),
        })
    }

    pub fn with_fetcher(mut self, fetcher: CountingFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_delegate(mut self, delegate: RecordingDelegate) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn header_dir(&self) -> PathBuf {
        self.provisioner().header_dir()
    }

    pub fn provisioner(&self) -> Provisioner<'_> {
        Provisioner::new(self.root.path(), SSE2NEON_REPO_URL, &self.fetcher)
            .with_race_wait(self.race_wait)
    }

    pub fn shim(&self, platform: Platform) -> R<Shim<'_>> {
        Ok(Shim {
            toolchain: ToolchainIdentity::new(RESOLVED)?,
            platform,
            rules: self.rules.clone(),
            detector: &self.arch,
            provisioner: self.provisioner(),
            delegate: &self.delegate,
        })
    }
}
