//! Tests for the binary serializer, pinning the exact encoding of a tiny
//! hand-built module.

use fuzz2wasm_translate::ast::{Expr, FuncId, Literal, ValType};
use fuzz2wasm_translate::module::{Export, Function, Module};
use fuzz2wasm_translate::{verify, DebugInfo};

fn constant_module() -> Module {
    let mut module = Module::new();
    let body = module.arena.alloc(Expr::Const(Literal::I32(5)));
    module.functions.push(Function {
        name: "func_0".to_owned(),
        result: ValType::I32,
        params: Vec::new(),
        vars: Vec::new(),
        body,
    });
    module.exports.push(Export {
        name: "func_0".to_owned(),
        func: FuncId(0),
    });
    module
}

#[test]
fn encodes_a_constant_function_exactly() {
    let binary = constant_module()
        .to_binary(DebugInfo::Omit)
        .expect("encoding cannot fail on a well-formed module");

    let expected: &[u8] = &[
        0x00, 0x61, 0x73, 0x6D, // magic
        0x01, 0x00, 0x00, 0x00, // version
        0x01, 0x05, 0x01, 0x60, 0x00, 0x01, 0x7F, // type: () -> i32
        0x03, 0x02, 0x01, 0x00, // function: one entry of type 0
        0x05, 0x04, 0x01, 0x01, 0x01, 0x01, // memory: 1..=1 pages
        0x07, 0x0A, 0x01, 0x06, b'f', b'u', b'n', b'c', b'_', b'0', 0x00,
        0x00, // export "func_0"
        0x0A, 0x06, 0x01, 0x04, 0x00, 0x41, 0x05, 0x0B, // code: i32.const 5
    ];
    assert_eq!(binary, expected, "binary was {binary:02X?}");
}

#[test]
fn debug_info_appends_a_name_section() {
    let module = constant_module();
    let bare = module.to_binary(DebugInfo::Omit).unwrap();
    let named = module.to_binary(DebugInfo::Full).unwrap();

    assert!(named.len() > bare.len());
    assert_eq!(&named[..bare.len()], bare.as_slice());
    verify(&named).expect("a name section must not break validation");
}
