//! Emission of the JavaScript harness used by fuzzing drivers to execute a
//! generated module and log what every export does.

use std::fmt::Write;

use crate::ast::ValType;
use crate::module::Module;

pub(crate) fn print_wrapper(module: &Module, out: &mut dyn Write) -> std::fmt::Result {
    out.write_str("// Test harness generated by fuzz2wasm.\n")?;
    out.write_str("// Usage: node wrapper.js <module.wasm>\n")?;
    out.write_str("const fs = require('fs');\n")?;
    out.write_str("const binary = fs.readFileSync(process.argv[2]);\n\n")?;
    out.write_str("function report(name, run) {\n")?;
    out.write_str("  try {\n")?;
    out.write_str("    console.log(name + ' => ' + run());\n")?;
    out.write_str("  } catch (e) {\n")?;
    out.write_str("    console.log(name + ' !> ' + e);\n")?;
    out.write_str("  }\n")?;
    out.write_str("}\n\n")?;
    out.write_str("WebAssembly.instantiate(binary, {}).then(({ instance }) => {\n")?;

    for export in &module.exports {
        let func = &module.functions[export.func.0 as usize];
        write!(out, "  report('{}', () => instance.exports['{}'](", export.name, export.name)?;
        for (index, param) in func.params.iter().enumerate() {
            if index > 0 {
                out.write_str(", ")?;
            }
            // i64 arguments cross the boundary as BigInt
            out.write_str(if *param == ValType::I64 { "0n" } else { "0" })?;
        }
        out.write_str("));\n")?;
    }

    out.write_str("});\n")
}
