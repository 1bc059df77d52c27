//! End-to-end tests for the translator: every input must come out the other
//! end as a structurally valid module, and the shape of what was generated
//! must hold up under an independent walk of the expression trees.

use fuzz2wasm_translate::ast::{Expr, ExprId, LabelId, ValType};
use fuzz2wasm_translate::module::{Function, Module};
use fuzz2wasm_translate::{verify, DebugInfo, Translate};

fn generate(input: &[u8]) -> Module {
    Translate::new().module(input)
}

fn translate(input: &[u8]) -> Vec<u8> {
    Translate::new()
        .translate(input)
        .expect("translate-to-fuzz must always generate a valid module")
}

/// A deterministic pseudo-random byte sequence for corpus-style tests.
fn seeded_bytes(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 24) as u8
        })
        .collect()
}

/// Walks a function body with its own scope stack, re-checking everything the
/// synthesizer promised: branch targets in scope, local indices and types in
/// range, call signatures respected, statement positions statement-typed.
#[derive(Default)]
struct Walk {
    scopes: Vec<LabelId>,
    max_depth: usize,
    loops: usize,
    calls: usize,
}

impl Walk {
    fn assert_in_scope(&self, label: LabelId, func: &Function) {
        assert!(
            self.scopes.contains(&label),
            "{} branches to {label} which is not in scope (open: {:?})",
            func.name,
            self.scopes,
        );
    }

    fn assert_statement(module: &Module, id: ExprId, func: &Function) {
        let ty = module.arena.ty(id);
        assert!(
            matches!(ty, ValType::None | ValType::Unreachable),
            "{} has a {ty}-typed expression in statement position",
            func.name,
        );
    }

    fn expr(&mut self, module: &Module, func: &Function, id: ExprId, depth: usize) {
        self.max_depth = self.max_depth.max(depth);

        match module.arena.get(id) {
            Expr::Block {
                label,
                children,
                ty,
            } => {
                let (last, statements) = children
                    .split_last()
                    .expect("a block always has a final child");
                self.scopes.push(*label);
                for child in statements {
                    Self::assert_statement(module, *child, func);
                    self.expr(module, func, *child, depth + 1);
                }
                if ty.is_concrete() {
                    let last_ty = module.arena.ty(*last);
                    assert!(
                        last_ty == *ty || last_ty == ValType::Unreachable,
                        "{} has a {ty} block ending in a {last_ty} expression",
                        func.name,
                    );
                }
                self.expr(module, func, *last, depth + 1);
                self.scopes.pop();
            }
            Expr::Loop { label, body } => {
                self.loops += 1;
                self.scopes.push(*label);
                self.expr(module, func, *body, depth + 1);
                self.scopes.pop();
            }
            Expr::If {
                condition,
                if_true,
                if_false,
            } => {
                let condition_ty = module.arena.ty(*condition);
                assert!(
                    matches!(condition_ty, ValType::I32 | ValType::Unreachable),
                    "{} has an if condition typed {condition_ty}",
                    func.name,
                );
                self.expr(module, func, *condition, depth + 1);
                self.expr(module, func, *if_true, depth + 1);
                self.expr(module, func, *if_false, depth + 1);
            }
            Expr::Break {
                target,
                value,
                condition,
            } => {
                self.assert_in_scope(*target, func);
                if let Some(value) = value {
                    self.expr(module, func, *value, depth + 1);
                }
                if let Some(condition) = condition {
                    self.expr(module, func, *condition, depth + 1);
                }
            }
            Expr::Switch {
                targets,
                default,
                condition,
                value,
            } => {
                for target in targets {
                    self.assert_in_scope(*target, func);
                }
                self.assert_in_scope(*default, func);
                if let Some(value) = value {
                    self.expr(module, func, *value, depth + 1);
                }
                self.expr(module, func, *condition, depth + 1);
            }
            Expr::Call {
                target,
                operands,
                ty,
            } => {
                self.calls += 1;
                let callee = module
                    .functions
                    .get(target.0 as usize)
                    .unwrap_or_else(|| panic!("{} calls missing {target}", func.name));
                assert_eq!(
                    *ty, callee.result,
                    "{} calls {target} but records the wrong result type",
                    func.name,
                );
                assert_eq!(
                    operands.len(),
                    callee.params.len(),
                    "{} calls {target} with the wrong arity",
                    func.name,
                );
                for (operand, param) in operands.iter().zip(&callee.params) {
                    let operand_ty = module.arena.ty(*operand);
                    assert!(
                        operand_ty == *param || operand_ty == ValType::Unreachable,
                        "{} calls {target} passing {operand_ty} where {param} is expected",
                        func.name,
                    );
                    self.expr(module, func, *operand, depth + 1);
                }
            }
            Expr::GetLocal { local, ty } => {
                assert_eq!(
                    func.local_ty(local.0),
                    Some(*ty),
                    "{} reads local {} at the wrong type",
                    func.name,
                    local.0,
                );
            }
            Expr::SetLocal { local, value } => {
                let declared = func
                    .local_ty(local.0)
                    .unwrap_or_else(|| panic!("{} writes missing local {}", func.name, local.0));
                let value_ty = module.arena.ty(*value);
                assert!(
                    value_ty == declared || value_ty == ValType::Unreachable,
                    "{} stores {value_ty} into a {declared} local",
                    func.name,
                );
                self.expr(module, func, *value, depth + 1);
            }
            Expr::TeeLocal { local, value, ty } => {
                assert_eq!(
                    func.local_ty(local.0),
                    Some(*ty),
                    "{} tees local {} at the wrong type",
                    func.name,
                    local.0,
                );
                let value_ty = module.arena.ty(*value);
                assert!(
                    value_ty == *ty || value_ty == ValType::Unreachable,
                    "{} tees {value_ty} into a {ty} local",
                    func.name,
                );
                self.expr(module, func, *value, depth + 1);
            }
            Expr::Load {
                bytes, align, ptr, ..
            } => {
                assert!(
                    align.is_power_of_two() && *align <= u32::from(*bytes),
                    "{} loads with alignment {align} over width {bytes}",
                    func.name,
                );
                self.expr(module, func, *ptr, depth + 1);
            }
            Expr::Store {
                bytes,
                align,
                ptr,
                value,
                ..
            } => {
                assert!(
                    align.is_power_of_two() && *align <= u32::from(*bytes),
                    "{} stores with alignment {align} over width {bytes}",
                    func.name,
                );
                self.expr(module, func, *ptr, depth + 1);
                self.expr(module, func, *value, depth + 1);
            }
            Expr::Const(_) | Expr::Nop | Expr::Unreachable => {}
            Expr::Unary { operand, .. } => self.expr(module, func, *operand, depth + 1),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(module, func, *lhs, depth + 1);
                self.expr(module, func, *rhs, depth + 1);
            }
            Expr::Select {
                condition,
                if_true,
                if_false,
                ..
            } => {
                self.expr(module, func, *condition, depth + 1);
                self.expr(module, func, *if_true, depth + 1);
                self.expr(module, func, *if_false, depth + 1);
            }
            Expr::Drop { value } => self.expr(module, func, *value, depth + 1),
            Expr::Return { value } => {
                if let Some(value) = value {
                    let value_ty = module.arena.ty(*value);
                    assert!(
                        value_ty == func.result || value_ty == ValType::Unreachable,
                        "{} returns {value_ty} but declares {}",
                        func.name,
                        func.result,
                    );
                    self.expr(module, func, *value, depth + 1);
                }
            }
            Expr::Sequence { first, second } => {
                self.expr(module, func, *first, depth + 1);
                self.expr(module, func, *second, depth + 1);
            }
        }
    }
}

/// Runs the scope walker over every function and checks module-wide shape:
/// memory limits, export pairing, and body typing discipline.
fn check_module(module: &Module) -> Walk {
    assert_eq!(module.memory.initial, 1, "memory must span exactly one page");
    assert_eq!(module.memory.max, 1, "memory must span exactly one page");

    assert_eq!(
        module.exports.len(),
        module.functions.len(),
        "every function is exported exactly once"
    );
    for (index, (export, func)) in module.exports.iter().zip(&module.functions).enumerate() {
        assert_eq!(export.func.0 as usize, index);
        assert_eq!(export.name, func.name);
        assert_eq!(func.name, format!("func_{index}"));
    }

    let mut walk = Walk::default();
    for func in &module.functions {
        assert!(
            func.result.is_reachable(),
            "{} declares an impossible result type",
            func.name
        );
        let body_ty = module.arena.ty(func.body);
        assert!(
            body_ty == func.result || body_ty == ValType::Unreachable,
            "{} has a {body_ty} body but declares {}",
            func.name,
            func.result,
        );
        walk.expr(module, func, func.body, 1);
        assert!(walk.scopes.is_empty(), "scope stack left unbalanced");
    }
    walk
}

#[test]
fn empty_input_yields_one_exported_function() {
    let module = generate(&[]);
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].name, "func_0");
    check_module(&module);

    verify(&translate(&[])).expect("empty input must produce a valid module");
}

#[test]
fn single_zero_byte_exhausts_after_one_function() {
    let module = generate(&[0x00]);
    assert_eq!(
        module.functions.len(),
        1,
        "the stream exhausts while building the first function"
    );
    check_module(&module);
    verify(&translate(&[0x00])).unwrap();
}

#[test]
fn short_zeroed_input_stays_shallow() {
    let module = generate(&[0x00; 8]);
    let walk = check_module(&module);
    assert!(
        walk.max_depth <= 21,
        "expected trivial trees, got depth {}",
        walk.max_depth
    );
    verify(&translate(&[0x00; 8])).unwrap();
}

#[test]
fn all_ones_input_validates_and_scopes_check() {
    let input = [0xFF; 16];
    let module = generate(&input);
    check_module(&module);
    verify(&translate(&input)).unwrap();
}

#[test]
fn counter_input_is_deterministic_and_well_formed() {
    let input: Vec<u8> = (0..=255).collect();
    let module = generate(&input);
    check_module(&module);

    let first = translate(&input);
    let second = translate(&input);
    assert_eq!(first, second, "repeated runs must serialize identically");
}

#[test]
fn zeroed_page_is_reproducible() {
    let input = vec![0u8; 4096];
    let module = generate(&input);
    assert!(!module.functions.is_empty());
    check_module(&module);

    assert_eq!(translate(&input), translate(&input));
}

#[test]
fn saturated_page_respects_the_nesting_cap() {
    let input = vec![0xFFu8; 4096];
    let module = generate(&input);
    let walk = check_module(&module);

    // the synthesizer cuts to leaves 21 levels in; a single level emits at
    // most three tree nodes, plus a small tail for the leaf itself
    assert!(
        walk.max_depth <= 70,
        "expression tree depth {} escaped the nesting cap",
        walk.max_depth
    );
    verify(&translate(&input)).unwrap();
}

#[test]
fn large_seeded_input_exercises_loops_and_calls() {
    // a quiet prefix keeps early functions small, so the module is guaranteed
    // to hold several before the noisy tail funds one large body
    let mut input = vec![0u8; 1024];
    input.extend(seeded_bytes(0x7345_6789, 3072));

    let module = generate(&input);
    assert!(
        module.functions.len() >= 2,
        "4 KiB of entropy must fund several functions, got {}",
        module.functions.len()
    );

    let walk = check_module(&module);
    assert!(walk.loops > 0, "expected at least one loop");
    assert!(walk.calls > 0, "expected at least one call");

    verify(&translate(&input)).unwrap();
}

#[test]
fn random_corpus_validates() {
    for seed in 0..24u32 {
        let len = (seed as usize * 37) % 301;
        let input = seeded_bytes(seed ^ 0xDEAD_BEEF, len);
        let module = generate(&input);
        check_module(&module);

        let binary = translate(&input);
        assert_eq!(binary, translate(&input), "seed {seed} was not deterministic");
    }
}

#[test]
fn debug_info_keeps_modules_valid() {
    let input = seeded_bytes(42, 512);
    let binary = Translate::new()
        .debug_info(DebugInfo::Full)
        .translate(&input)
        .expect("name sections must not break validation");
    verify(&binary).unwrap();
}

#[test]
fn text_output_parses_and_validates() {
    for input in [&b""[..], &[0x00], &[0xFF; 16], &seeded_bytes(7, 700)] {
        let module = generate(input);
        let mut text = Vec::new();
        module.write_text(&mut text).expect("printing cannot fail");
        let text = String::from_utf8(text).expect("text output is UTF-8");

        let parsed = wat::parse_str(&text)
            .unwrap_or_else(|error| panic!("text output failed to parse: {error}\n{text}"));
        verify(&parsed).unwrap_or_else(|error| {
            panic!("text output failed to validate: {error:#}\n{text}")
        });
    }
}

#[test]
fn js_wrapper_names_every_export() {
    let module = generate(&seeded_bytes(9, 256));
    let mut wrapper = Vec::new();
    module.write_js_wrapper(&mut wrapper).unwrap();
    let wrapper = String::from_utf8(wrapper).unwrap();

    for export in &module.exports {
        assert!(
            wrapper.contains(&format!("instance.exports['{}']", export.name)),
            "wrapper does not call {}",
            export.name
        );
    }
}

#[test]
fn local_indices_cover_params_then_vars() {
    let mut module = Module::new();
    let body = module.arena.alloc(Expr::Nop);
    let func = Function {
        name: "func_0".to_owned(),
        result: ValType::None,
        params: vec![ValType::I32, ValType::F64],
        vars: vec![ValType::I64],
        body,
    };

    assert_eq!(func.local_count(), 3);
    assert_eq!(func.local_ty(0), Some(ValType::I32));
    assert_eq!(func.local_ty(1), Some(ValType::F64));
    assert_eq!(func.local_ty(2), Some(ValType::I64));
    assert_eq!(func.local_ty(3), None);
}

#[test]
fn garbage_binaries_are_rejected() {
    assert!(verify(&[0x00, 0x61, 0x73]).is_err());
    assert!(verify(b"definitely not wasm").is_err());
}
