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

use std::path::Path;

/// The token the build toolchain puts right before the source path.
pub const SOURCE_MARKER: &str = "-c";

pub const SSE2NEON_DIR_NAME: &str = "sse2neon";
pub const SSE2NEON_HEADER_NAME: &str = "sse2neon.h";
pub const SSE2NEON_REPO_URL: &str = "https://github.com/DLTcollab/sse2neon.git";

pub const CCSHIM_LOG_ENV: &str = "CCSHIM_LOG";
pub const CCSHIM_CC_ENV: &str = "CCSHIM_CC";
pub const CCSHIM_RUNTIME_VERSION_ENV: &str = "CCSHIM_RUNTIME_VERSION";
pub const CCSHIM_PYTHON_ENV: &str = "CCSHIM_PYTHON";
pub const CCSHIM_ASSUME_AARCH64_ENV: &str = "CCSHIM_ASSUME_AARCH64";
pub const CCSHIM_SSE2NEON_ROOT_ENV: &str = "CCSHIM_SSE2NEON_ROOT";
pub const CCSHIM_SSE2NEON_URL_ENV: &str = "CCSHIM_SSE2NEON_URL";
pub const CCSHIM_RULES_ENV: &str = "CCSHIM_RULES";

/// The operating system the shim runs on.
///
/// Rules are keyed on this, not on the CPU architecture.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "macos")]
    MacOs,
    Linux,
    Windows,
    #[serde(untagged)]
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    pub fn from_os_name(os: &str) -> Self {
        match os {
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            other => Platform::Other(other.to_owned()),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    C,
    Cxx,
    ObjC,
    ObjCxx,
    Other,
}

impl SourceKind {
    /// Classifies a source file by its extension.
    ///
    /// Only a lowercase `.c` is plain C; `.C` is the traditional
    /// spelling of a C++ source.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("c") => SourceKind::C,
            Some("cc" | "cpp" | "cxx" | "c++" | "C") => SourceKind::Cxx,
            Some("m") => SourceKind::ObjC,
            Some("mm") => SourceKind::ObjCxx,
            _ => SourceKind::Other,
        }
    }
}

/// Flags that have to go away when compiling a given kind of source
/// on a given platform.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StripRule {
    pub platform: Platform,
    pub source_kind: SourceKind,
    pub strip: Vec<String>,
}

impl StripRule {
    pub fn applies_to(&self, platform: &Platform, source_kind: SourceKind) -> bool {
        &self.platform == platform && self.source_kind == source_kind
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    pub rules: Vec<StripRule>,
}

impl RuleTable {
    /// setuptools hands the same flags to clang for every source file,
    /// and clang rejects the C++ ones on a `.c` file.
    pub fn builtin() -> Self {
        Self {
            rules: vec![StripRule {
                platform: Platform::MacOs,
                source_kind: SourceKind::C,
                strip: vec!["-stdlib=libc++".to_owned(), "-std=c++11".to_owned()],
            }],
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn extend(&mut self, other: RuleTable) {
        self.rules.extend(other.rules);
    }

    pub fn matching<'a>(
        &'a self,
        platform: &'a Platform,
        source_kind: SourceKind,
    ) -> impl Iterator<Item = &'a StripRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.applies_to(platform, source_kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_from_extension() {
        assert_eq!(SourceKind::from_path("src/foo.c"), SourceKind::C);
        assert_eq!(SourceKind::from_path("src/foo.cc"), SourceKind::Cxx);
        assert_eq!(SourceKind::from_path("src/foo.cpp"), SourceKind::Cxx);
        assert_eq!(SourceKind::from_path("src/foo.C"), SourceKind::Cxx);
        assert_eq!(SourceKind::from_path("src/foo.mm"), SourceKind::ObjCxx);
        assert_eq!(SourceKind::from_path("src/foo.h"), SourceKind::Other);
        assert_eq!(SourceKind::from_path("Makefile"), SourceKind::Other);
    }

    #[test]
    fn builtin_only_strips_c_on_macos() {
        let table = RuleTable::builtin();
        let flags = table
            .matching(&Platform::MacOs, SourceKind::C)
            .flat_map(|rule| rule.strip.iter().map(String::as_str))
            .collect::<Vec<_>>();
        assert_eq!(flags, ["-stdlib=libc++", "-std=c++11"]);

        assert_eq!(table.matching(&Platform::MacOs, SourceKind::Cxx).count(), 0);
        assert_eq!(table.matching(&Platform::Linux, SourceKind::C).count(), 0);
    }

    #[test]
    fn rules_from_json() {
        let table = RuleTable::from_json(
            r#"{"rules":[
                {"platform":"linux","source_kind":"c","strip":["-fno-rtti"]},
                {"platform":"freebsd","source_kind":"cxx","strip":[]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(table.rules.len(), 2);
        assert_eq!(table.rules[0].platform, Platform::Linux);
        assert_eq!(table.rules[0].strip, ["-fno-rtti"]);
        assert_eq!(table.rules[1].platform, Platform::Other("freebsd".to_owned()));
        assert_eq!(table.rules[1].source_kind, SourceKind::Cxx);
    }

    #[test]
    fn platform_from_os_name() {
        assert_eq!(Platform::from_os_name("macos"), Platform::MacOs);
        assert_eq!(Platform::from_os_name("linux"), Platform::Linux);
        assert_eq!(
            Platform::from_os_name("openbsd"),
            Platform::Other("openbsd".to_owned())
        );
    }
}
