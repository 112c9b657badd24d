//! Correlation of declared signatures with compiled definitions, and the
//! text report built from it.

use std::io::{self, Write};

use tracing::{debug, info};

use crate::decl::DeclaredSignature;
use crate::ir::{CompiledDefinition, FunctionLookup};

/// Maps a declared name to the symbol names to try, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameResolver {
    /// Module whose Cython-mangled symbols are tried after the exact name.
    cython_module: Option<String>,
}

impl NameResolver {
    /// Exact-name lookup only.
    pub fn exact() -> Self {
        Self::default()
    }

    /// Exact name first, then the Cython C symbol for a function of `module`.
    pub fn with_cython_module(module: impl Into<String>) -> Self {
        Self {
            cython_module: Some(module.into()),
        }
    }

    pub fn candidates(&self, name: &str) -> Vec<String> {
        let mut names = vec![name.to_string()];
        if let Some(module) = &self.cython_module {
            names.push(cython_symbol(module, name));
        }
        names
    }
}

/// C symbol Cython gives a `cdef` function: `__pyx_f_<len><part>_..._<name>`.
pub fn cython_symbol(module: &str, name: &str) -> String {
    let mut symbol = String::from("__pyx_f_");
    for part in module.split('.') {
        symbol.push_str(&format!("{}{}_", part.len(), part));
    }
    symbol.push_str(name);
    symbol
}

/// One declared signature paired with what the compiled module holds for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation<'a> {
    pub declared: &'a DeclaredSignature,
    pub compiled: Option<&'a CompiledDefinition>,
}

impl Correlation<'_> {
    pub fn is_found(&self) -> bool {
        self.compiled.is_some()
    }
}

/// Counts over a set of correlations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub found: usize,
    pub missing: usize,
}

impl Summary {
    pub fn of(correlations: &[Correlation<'_>]) -> Self {
        let found = correlations.iter().filter(|c| c.is_found()).count();
        Self {
            found,
            missing: correlations.len() - found,
        }
    }
}

/// Pair each declared signature with its compiled definition, keeping declared order.
///
/// A name with no compiled counterpart yields an entry with `compiled: None`.
pub fn correlate<'a, L: FunctionLookup + ?Sized>(
    signatures: &'a [DeclaredSignature],
    module: &'a L,
    resolver: &NameResolver,
) -> Vec<Correlation<'a>> {
    let correlations: Vec<Correlation<'a>> = signatures
        .iter()
        .map(|declared| {
            let compiled = resolver
                .candidates(&declared.name)
                .iter()
                .find_map(|candidate| module.lookup(candidate));
            if compiled.is_none() {
                debug!(name = %declared.name, "no compiled definition");
            }
            Correlation { declared, compiled }
        })
        .collect();

    let summary = Summary::of(&correlations);
    info!(
        "correlated {} declarations: {} found, {} missing",
        correlations.len(),
        summary.found,
        summary.missing
    );
    correlations
}

/// Write one block per correlation: a `# (params) -> ret` marker line, then the
/// compiled text or a `; not found: name` line. Blocks are separated by a blank line.
pub fn write_report<W: Write>(out: &mut W, correlations: &[Correlation<'_>]) -> io::Result<()> {
    for (i, correlation) in correlations.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "# {}", correlation.declared.arrow_signature())?;
        match correlation.compiled {
            Some(definition) => writeln!(out, "{}", definition)?,
            None => writeln!(out, "; not found: {}", correlation.declared.name)?,
        }
    }
    Ok(())
}

/// Render the report into a string.
pub fn render_report(correlations: &[Correlation<'_>]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_report(&mut buf, correlations);
    String::from_utf8_lossy(&buf).into_owned()
}
