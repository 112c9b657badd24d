//! Settings infrastructure for declmatch.
//!
//! This module provides support for loading and parsing `declmatch.toml` files
//! to configure the compile toolchain, the declaration parser and name lookup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::decl::{ParamSplit, ParseOptions};

/// Name of the settings file searched for next to the source module.
pub const SETTINGS_FILE: &str = "declmatch.toml";

/// Root settings structure loaded from declmatch.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// External tool configuration.
    pub toolchain: Option<ToolchainSettings>,

    /// Declaration file parsing.
    pub declarations: Option<DeclarationSettings>,

    /// Name lookup in the compiled module.
    pub lookup: Option<LookupSettings>,
}

/// Programs and flags used to produce LLVM IR.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Cython executable.
    pub cython: String,

    /// Clang executable.
    pub clang: String,

    /// Python interpreter queried for its include directory.
    pub python: String,

    /// Whether to add the Python include directory to the clang include path.
    pub python_include: bool,

    /// Extra include directories. Relative paths resolve against the settings directory.
    pub include_dirs: Vec<PathBuf>,

    /// Extra arguments passed to clang before `-S -emit-llvm`.
    pub clang_args: Vec<String>,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            cython: "cython".to_string(),
            clang: "clang".to_string(),
            python: "python3".to_string(),
            python_include: true,
            include_dirs: Vec::new(),
            clang_args: Vec::new(),
        }
    }
}

/// Declaration parser configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeclarationSettings {
    /// Keywords that introduce a declaration: ["cdef"], ["cdef", "cpdef"], ...
    pub introducers: Vec<String>,

    /// "naive" (split on every comma) or "nested" (respect brackets).
    pub param_split: ParamSplit,

    /// Treat a malformed declaration as fatal instead of skipping it.
    pub strict: bool,

    /// Extension of the declaration file next to the source module.
    pub extension: String,
}

impl Default for DeclarationSettings {
    fn default() -> Self {
        Self {
            introducers: ParseOptions::default().introducers,
            param_split: ParamSplit::default(),
            strict: false,
            extension: "pxd".to_string(),
        }
    }
}

impl DeclarationSettings {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            introducers: self.introducers.clone(),
            param_split: self.param_split,
        }
    }
}

/// Name lookup configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Also try the Cython-mangled C symbol for each declared name.
    pub cython_mangling: bool,

    /// Module name used for mangling. Defaults to the source file stem.
    pub module: Option<String>,
}

impl Settings {
    pub fn toolchain(&self) -> ToolchainSettings {
        self.toolchain.clone().unwrap_or_default()
    }

    pub fn declarations(&self) -> DeclarationSettings {
        self.declarations.clone().unwrap_or_default()
    }

    pub fn lookup(&self) -> LookupSettings {
        self.lookup.clone().unwrap_or_default()
    }

    /// Make relative include directories relative to `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if let Some(ref mut toolchain) = self.toolchain {
            for dir in toolchain.include_dirs.iter_mut() {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        self
    }
}

/// Failure to read or parse a settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl SettingsError {
    /// True when the file simply isn't there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SettingsError::Read { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

/// Read and parse a declmatch.toml file.
pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings from a declmatch.toml file.
///
/// Returns default settings if the file doesn't exist or can't be read or
/// parsed. Anything but a missing file is logged as a warning.
pub fn load_settings(path: &Path) -> Settings {
    read_settings(path).unwrap_or_else(|e| {
        if !e.is_not_found() {
            warn!("{}", e);
        }
        Settings::default()
    })
}

/// Load a settings file the user named explicitly.
///
/// Like [`load_settings`], but a missing file is also worth a warning.
pub fn load_explicit_settings(path: &Path) -> Settings {
    read_settings(path).unwrap_or_else(|e| {
        warn!("{}; using default settings", e);
        Settings::default()
    })
}

/// Discover declmatch.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found file (used for resolving relative paths).
/// If not found, returns `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            debug!("using settings from {}", candidate.display());
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    debug!("using settings from {}", candidate.display());
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
