//! Cross-reference the public functions declared in a Cython `.pxd` file with
//! their definitions in the LLVM IR compiled from the matching module.
//!
//! The run is strictly sequential: compile, parse declarations, index the IR,
//! correlate, report. Any fatal failure stops the run before the report is
//! written.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

pub mod decl;
pub mod error;
pub mod ir;
pub mod report;
pub mod settings;
pub mod toolchain;

pub use decl::{
    parse_declarations, parse_declarations_with, DeclaredSignature, ParamSplit, ParseOptions,
};
pub use error::{Error, Result};
pub use ir::{CompiledDefinition, FunctionLookup, IrModule};
pub use report::{correlate, render_report, write_report, Correlation, NameResolver, Summary};
pub use settings::{discover_settings, load_explicit_settings, load_settings, Settings};
pub use toolchain::{CythonClang, PrebuiltIr, Toolchain};

/// One configured run over a single source module.
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: PathBuf,
    include_dirs: Vec<PathBuf>,
    declaration_file: PathBuf,
    options: ParseOptions,
    strict: bool,
    resolver: NameResolver,
}

impl Pipeline {
    /// Build a run for `source` from loaded settings.
    ///
    /// The declaration file sits next to the source with the configured extension.
    pub fn from_settings(source: &Path, settings: &Settings) -> Self {
        let declarations = settings.declarations();
        let lookup = settings.lookup();

        let resolver = if lookup.cython_mangling {
            let module = lookup.module.unwrap_or_else(|| {
                source
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            NameResolver::with_cython_module(module)
        } else {
            NameResolver::exact()
        };

        Self {
            source: source.to_path_buf(),
            include_dirs: Vec::new(),
            declaration_file: source.with_extension(&declarations.extension),
            options: declarations.parse_options(),
            strict: declarations.strict,
            resolver,
        }
    }

    pub fn with_include_dirs(mut self, include_dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = include_dirs;
        self
    }

    pub fn with_declaration_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.declaration_file = path.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_param_split(mut self, split: ParamSplit) -> Self {
        self.options.param_split = split;
        self
    }

    pub fn declaration_file(&self) -> &Path {
        &self.declaration_file
    }

    /// Parse the declaration file, failing on the first malformed record in strict mode.
    pub fn declarations(&self) -> Result<Vec<DeclaredSignature>> {
        let text = read_file(&self.declaration_file)?;
        let parsed = parse_declarations_with(&text, &self.options);

        if self.strict {
            if let Some(err) = parsed.errors.into_iter().next() {
                return Err(Error::Declaration {
                    path: self.declaration_file.clone(),
                    source: err,
                });
            }
        }

        info!(
            "{}: {} declarations",
            self.declaration_file.display(),
            parsed.signatures.len()
        );
        Ok(parsed.signatures)
    }

    /// Compile, correlate and write the report to `out`.
    pub fn run<T: Toolchain + ?Sized, W: Write>(
        &self,
        toolchain: &T,
        out: &mut W,
    ) -> Result<Summary> {
        let ir_path = toolchain.compile(&self.source, &self.include_dirs)?;
        info!("compiled {} to {}", self.source.display(), ir_path.display());

        let signatures = self.declarations()?;

        let ir_text = read_file(&ir_path)?;
        let module = IrModule::parse(&ir_text).map_err(|source| Error::Ir {
            path: ir_path.clone(),
            source,
        })?;
        info!("{}: {} functions", ir_path.display(), module.len());

        let correlations = correlate(&signatures, &module, &self.resolver);
        let report = render_report(&correlations);
        out.write_all(report.as_bytes())?;
        out.flush()?;

        Ok(Summary::of(&correlations))
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_file_follows_source_stem() {
        let pipeline =
            Pipeline::from_settings(Path::new("src/objective_function.pyx"), &Settings::default());
        assert_eq!(
            pipeline.declaration_file(),
            Path::new("src/objective_function.pxd")
        );
    }

    #[test]
    fn mangling_module_defaults_to_source_stem() {
        let settings: Settings = toml::from_str("[lookup]\ncython_mangling = true").unwrap();
        let pipeline = Pipeline::from_settings(Path::new("objective_function.pyx"), &settings);
        assert_eq!(
            pipeline.resolver,
            NameResolver::with_cython_module("objective_function")
        );
    }

    #[test]
    fn missing_declaration_file_is_a_read_error() {
        let pipeline =
            Pipeline::from_settings(Path::new("/nonexistent/mod.pyx"), &Settings::default());
        let err = pipeline.declarations().unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(err.to_string().starts_with("failed to read /nonexistent/mod.pxd"));
    }
}
