//! Compilation of an annotated source module to textual LLVM IR.
//!
//! The pipeline only depends on the `Toolchain` trait. `CythonClang` drives
//! the real external tools; `PrebuiltIr` hands back an IR file that already
//! exists, which is what tests and `--ir` use.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::settings::ToolchainSettings;

/// Which external step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Source module to C.
    Cython,
    /// C to LLVM IR.
    Clang,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Cython => f.write_str("cython"),
            Stage::Clang => f.write_str("clang"),
        }
    }
}

/// Failures of the compile step. All of them abort the run.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("{stage} could not be started ({program}): {source}")]
    Spawn {
        stage: Stage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} exited with {status}:\n{stderr}")]
    Failed {
        stage: Stage,
        status: String,
        stderr: String,
    },

    #[error("{stage} did not produce {}", path.display())]
    MissingOutput { stage: Stage, path: PathBuf },
}

/// Something that turns a source module into an IR file.
pub trait Toolchain {
    /// Compile `source` with `include_dirs` on the include path and return the IR file.
    fn compile(&self, source: &Path, include_dirs: &[PathBuf]) -> Result<PathBuf, ToolchainError>;
}

/// An IR file produced ahead of time.
#[derive(Debug, Clone)]
pub struct PrebuiltIr {
    path: PathBuf,
}

impl PrebuiltIr {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Toolchain for PrebuiltIr {
    fn compile(&self, source: &Path, _include_dirs: &[PathBuf]) -> Result<PathBuf, ToolchainError> {
        debug!(
            "using prebuilt IR {} for {}",
            self.path.display(),
            source.display()
        );
        if self.path.is_file() {
            Ok(self.path.clone())
        } else {
            Err(ToolchainError::MissingOutput {
                stage: Stage::Clang,
                path: self.path.clone(),
            })
        }
    }
}

/// Runs `cython` then `clang -S -emit-llvm`.
#[derive(Debug, Clone)]
pub struct CythonClang {
    settings: ToolchainSettings,
}

impl CythonClang {
    pub fn new(settings: ToolchainSettings) -> Self {
        Self { settings }
    }

    /// Arguments for the cython step.
    pub fn cython_args(&self, source: &Path, c_file: &Path) -> Vec<String> {
        vec![
            "-3".to_string(),
            source.display().to_string(),
            "-o".to_string(),
            c_file.display().to_string(),
        ]
    }

    /// Arguments for the clang step.
    pub fn clang_args(
        &self,
        c_file: &Path,
        ir_file: &Path,
        include_dirs: &[PathBuf],
    ) -> Vec<String> {
        let mut args: Vec<String> = include_dirs
            .iter()
            .map(|dir| format!("-I{}", dir.display()))
            .collect();
        args.extend(self.settings.clang_args.iter().cloned());
        args.extend([
            "-S".to_string(),
            "-emit-llvm".to_string(),
            c_file.display().to_string(),
            "-o".to_string(),
            ir_file.display().to_string(),
        ]);
        args
    }

    /// Ask the configured Python for its C header directory.
    fn python_include(&self) -> Option<PathBuf> {
        let output = Command::new(&self.settings.python)
            .args([
                "-c",
                "import sysconfig; print(sysconfig.get_paths()['include'])",
            ])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!dir.is_empty()).then(|| PathBuf::from(dir))
            }
            Ok(output) => {
                warn!(
                    "{} could not report its include directory: {}",
                    self.settings.python,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                warn!("failed to run {}: {}", self.settings.python, e);
                None
            }
        }
    }

    fn run(
        &self,
        stage: Stage,
        program: &str,
        args: &[String],
        output: &Path,
    ) -> Result<(), ToolchainError> {
        info!("running {} {}", program, args.join(" "));
        let result = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ToolchainError::Spawn {
                stage,
                program: program.to_string(),
                source,
            })?;

        check_status(stage, &result)?;

        if !output.exists() {
            return Err(ToolchainError::MissingOutput {
                stage,
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}

impl Toolchain for CythonClang {
    fn compile(&self, source: &Path, include_dirs: &[PathBuf]) -> Result<PathBuf, ToolchainError> {
        let c_file = source.with_extension("c");
        let ir_file = source.with_extension("ll");

        let mut includes = include_dirs.to_vec();
        includes.extend(self.settings.include_dirs.iter().cloned());
        if self.settings.python_include {
            includes.extend(self.python_include());
        }

        self.run(
            Stage::Cython,
            &self.settings.cython,
            &self.cython_args(source, &c_file),
            &c_file,
        )?;
        self.run(
            Stage::Clang,
            &self.settings.clang,
            &self.clang_args(&c_file, &ir_file, &includes),
            &ir_file,
        )?;

        Ok(ir_file)
    }
}

fn check_status(stage: Stage, output: &Output) -> Result<(), ToolchainError> {
    if output.status.success() {
        return Ok(());
    }
    Err(ToolchainError::Failed {
        stage,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain() -> CythonClang {
        CythonClang::new(ToolchainSettings {
            clang_args: vec!["-O1".to_string()],
            ..ToolchainSettings::default()
        })
    }

    #[test]
    fn cython_arguments() {
        let args = toolchain().cython_args(Path::new("src/mod.pyx"), Path::new("src/mod.c"));
        assert_eq!(args, vec!["-3", "src/mod.pyx", "-o", "src/mod.c"]);
    }

    #[test]
    fn clang_arguments_put_includes_first() {
        let args = toolchain().clang_args(
            Path::new("mod.c"),
            Path::new("mod.ll"),
            &[PathBuf::from("/usr/include/python3"), PathBuf::from("inc")],
        );
        assert_eq!(
            args,
            vec![
                "-I/usr/include/python3",
                "-Iinc",
                "-O1",
                "-S",
                "-emit-llvm",
                "mod.c",
                "-o",
                "mod.ll",
            ]
        );
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let chain = CythonClang::new(ToolchainSettings {
            cython: "declmatch-no-such-cython".to_string(),
            python_include: false,
            ..ToolchainSettings::default()
        });
        let err = chain.compile(Path::new("mod.pyx"), &[]).unwrap_err();
        assert!(matches!(
            err,
            ToolchainError::Spawn {
                stage: Stage::Cython,
                ..
            }
        ));
        assert!(err.to_string().starts_with("cython could not be started"));
    }

    #[test]
    fn prebuilt_returns_existing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let chain = PrebuiltIr::new(file.path());
        assert_eq!(chain.compile(Path::new("x.pyx"), &[]).unwrap(), file.path());
    }

    #[test]
    fn prebuilt_missing_file_is_an_error() {
        let chain = PrebuiltIr::new("/nonexistent/module.ll");
        let err = chain.compile(Path::new("x.pyx"), &[]).unwrap_err();
        assert!(matches!(err, ToolchainError::MissingOutput { .. }));
        assert_eq!(err.to_string(), "clang did not produce /nonexistent/module.ll");
    }
}
