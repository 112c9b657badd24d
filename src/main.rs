//! declmatch CLI
//!
//! Command-line interface for cross-referencing `.pxd` declarations with
//! compiled LLVM IR.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use declmatch::settings::{self, Settings};
use declmatch::{CythonClang, ParamSplit, Pipeline, PrebuiltIr, Toolchain};

#[derive(Parser)]
#[command(name = "declmatch")]
#[command(version)]
#[command(about = "Show the compiled LLVM IR for every function declared in a .pxd file")]
struct Cli {
    /// Settings file (default: discover declmatch.toml from the source directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a module and report each declared function's compiled form
    Report {
        /// Cython source module (.pyx)
        source: PathBuf,

        /// Additional include directory for clang
        #[arg(short = 'I', long = "include")]
        include_dirs: Vec<PathBuf>,

        /// Use an existing LLVM IR file instead of compiling
        #[arg(long)]
        ir: Option<PathBuf>,

        /// Declaration file (default: source with the .pxd extension)
        #[arg(long)]
        decl: Option<PathBuf>,

        /// Fail on the first malformed declaration
        #[arg(long)]
        strict: bool,

        /// Do not split parameters on commas inside brackets
        #[arg(long)]
        nested_params: bool,
    },

    /// Parse a declaration file and print the recognized signatures
    Decls {
        /// Declaration file (.pxd)
        file: PathBuf,

        /// Do not split parameters on commas inside brackets
        #[arg(long)]
        nested_params: bool,
    },

    /// Compile a module to LLVM IR and print the output path
    Compile {
        /// Cython source module (.pyx)
        source: PathBuf,

        /// Additional include directory for clang
        #[arg(short = 'I', long = "include")]
        include_dirs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Report {
            source,
            include_dirs,
            ir,
            decl,
            strict,
            nested_params,
        } => {
            let settings = load(cli.config.as_deref(), &source);
            let mut pipeline = Pipeline::from_settings(&source, &settings)
                .with_include_dirs(include_dirs);
            if strict {
                pipeline = pipeline.with_strict(true);
            }
            if let Some(decl) = decl {
                pipeline = pipeline.with_declaration_file(decl);
            }
            if nested_params {
                pipeline = pipeline.with_param_split(ParamSplit::Nested);
            }

            let toolchain: Box<dyn Toolchain> = match ir {
                Some(path) => Box::new(PrebuiltIr::new(path)),
                None => Box::new(CythonClang::new(settings.toolchain())),
            };

            let mut stdout = io::stdout().lock();
            let summary = pipeline
                .run(toolchain.as_ref(), &mut stdout)
                .with_context(|| format!("failed to report on {}", source.display()))?;
            tracing::debug!("{} found, {} missing", summary.found, summary.missing);
        }

        Commands::Decls {
            file,
            nested_params,
        } => {
            let settings = load(cli.config.as_deref(), &file);
            let mut options = settings.declarations().parse_options();
            if nested_params {
                options.param_split = ParamSplit::Nested;
            }

            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let parsed = declmatch::parse_declarations_with(&text, &options);
            for signature in &parsed.signatures {
                println!("{}:{}: {}", file.display(), signature.line, signature);
            }
            for err in &parsed.errors {
                eprintln!("{}: {}", file.display(), err);
            }
        }

        Commands::Compile {
            source,
            include_dirs,
        } => {
            let settings = load(cli.config.as_deref(), &source);
            let ir = CythonClang::new(settings.toolchain())
                .compile(&source, &include_dirs)
                .with_context(|| format!("failed to compile {}", source.display()))?;
            println!("{}", ir.display());
        }
    }

    Ok(())
}

/// Explicit settings file, or discovery from the input's directory.
fn load(config: Option<&Path>, input: &Path) -> Settings {
    match config {
        Some(path) => {
            let base = path.parent().unwrap_or(Path::new("."));
            settings::load_explicit_settings(path).resolve_paths(base)
        }
        None => {
            let start = input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let (settings, dir) = settings::discover_settings(start);
            settings.resolve_paths(&dir)
        }
    }
}
