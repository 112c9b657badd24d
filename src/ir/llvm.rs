//! IR indexing through LLVM's assembly parser (the `llvm` feature).
//!
//! The module is parsed and verified by LLVM itself, every function is
//! printed back to text, and the context is dropped before returning, so the
//! resulting index owns plain strings only.

use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use tracing::debug;

use super::module::{CompiledDefinition, DefinitionKind, IrParseError};

/// Parse `source` with LLVM and collect every function by name.
pub(crate) fn parse_functions(
    source: &str,
) -> Result<HashMap<String, CompiledDefinition>, IrParseError> {
    let context = Context::create();
    let buffer = MemoryBuffer::create_from_memory_range_copy(source.as_bytes(), "declmatch");
    let module = context
        .create_module_from_ir(buffer)
        .map_err(|e| IrParseError::Llvm {
            message: e.to_string(),
        })?;
    module.verify().map_err(|e| IrParseError::Llvm {
        message: e.to_string(),
    })?;

    let mut functions = HashMap::new();
    for function in module.get_functions() {
        let name = function.get_name().to_string_lossy().into_owned();
        let kind = if function.count_basic_blocks() == 0 {
            DefinitionKind::Declaration
        } else {
            DefinitionKind::Definition
        };
        let text = function.print_to_string().to_string();
        debug!(name = %name, "indexed IR function");
        functions.insert(
            name.clone(),
            CompiledDefinition::new(name, kind, text.trim().to_string()),
        );
    }

    Ok(functions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_struct_returning_function() {
        let source = "\
define { double, double } @cplx(double %0) {
  %2 = insertvalue { double, double } undef, double %0, 0
  ret { double, double } %2
}

declare i32 @puts(ptr)
";
        let functions = parse_functions(source).unwrap();
        assert_eq!(functions.len(), 2);

        let cplx = &functions["cplx"];
        assert_eq!(cplx.kind(), DefinitionKind::Definition);
        assert!(cplx.text().contains("ret { double, double } %2"));
        assert!(functions["puts"].is_declaration());
    }

    #[test]
    fn rejects_text_that_is_not_ir() {
        let err = parse_functions("this is not LLVM IR\n}}} garbage {{{\n").unwrap_err();
        assert!(matches!(err, IrParseError::Llvm { .. }));
    }
}
