//! Prelude synthesis (spec §4.2.7, §2 item 5).
//!
//! Ported from `PatchVisitor.build_setup_prelude` in
//! `original_source/src/rt_preproc/visitors/patch/patch.py`.

use std::collections::BTreeSet;

use crate::lower::context::MacroType;
use crate::lower::symbols::SymbolTracker;

/// Render the fixed C preamble: includes, one `UNDEFINED_<Type>` sentinel
/// per encountered macro type, one global per macro, and `setup_env_vars`.
pub fn build_setup_prelude(symbols: &SymbolTracker) -> String {
    let mut buf = String::new();
    buf.push_str("#include <stdio.h>\n#include <stdlib.h>\n#include <assert.h>\n\n");

    let types: BTreeSet<MacroType> = symbols.macros.values().copied().collect();
    for ty in &types {
        buf.push_str(&format!("#define {} 0xdeadbeef\n", ty.sentinel_name()));
    }

    let mut macro_names: Vec<&String> = symbols.macros.keys().collect();
    macro_names.sort();
    for name in &macro_names {
        let ty = symbols.macros[*name];
        buf.push_str(&format!("{} {} = {};\n", ty.c_name(), name, ty.sentinel_name()));
    }

    buf.push_str("\nint setup_env_vars() {\n");
    for name in &macro_names {
        buf.push_str(&format!("  char* {name}_env_str = getenv(\"{name}\");\n"));
        buf.push_str(&format!("  if ({name}_env_str) {name} = strtol({name}_env_str, NULL, 10);\n"));
    }
    buf.push_str("  return 0;\n}\n\n");

    buf
}

/// The guard injected at the top of `main` (spec §4.2.5).
pub const SETUP_ENV_VARS_CALL: &str = "if (setup_env_vars() != 0) {\n    printf(\"Error setting up environment variables\\n\");\n    return 1;\n  }\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::context::MacroType;

    #[test]
    fn prelude_declares_sentinel_and_getenv_lookup() {
        let mut symbols = SymbolTracker::new();
        symbols.record_macro("FOO", MacroType::Int);
        let prelude = build_setup_prelude(&symbols);
        assert!(prelude.contains("#define UNDEFINED_Int 0xdeadbeef"));
        assert!(prelude.contains("int FOO = UNDEFINED_Int;"));
        assert!(prelude.contains("getenv(\"FOO\")"));
        assert!(prelude.contains("strtol(FOO_env_str, NULL, 10)"));
    }
}
