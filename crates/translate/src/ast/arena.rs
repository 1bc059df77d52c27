/// A handle to an [`Expr`] stored in an [`Arena`].
///
/// [`Expr`]: crate::ast::Expr
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct ExprId(u32);

/// An arena containing every expression of a module.
///
/// Nodes are never freed individually; they live exactly as long as the
/// [`Module`] owning the arena.
///
/// [`Module`]: crate::module::Module
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<crate::ast::Expr>,
}

impl Arena {
    pub(crate) const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Allocates a node, returning its handle.
    pub fn alloc(&mut self, expr: crate::ast::Expr) -> ExprId {
        let id = u32::try_from(self.nodes.len()).expect("arena exceeded u32::MAX nodes");
        self.nodes.push(expr);
        ExprId(id)
    }

    /// Gets the expression behind a handle.
    pub fn get(&self, id: ExprId) -> &crate::ast::Expr {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: ExprId) -> &mut crate::ast::Expr {
        &mut self.nodes[id.0 as usize]
    }

    /// Computes the value type of an expression.
    ///
    /// This implements the WebAssembly typing rules the synthesizer relies on:
    /// an operator with an `unreachable` operand is itself `unreachable`, a
    /// sequence takes the type of its final statement, and control constructs
    /// report the type recorded when they were finalized.
    pub fn ty(&self, id: ExprId) -> crate::ast::ValType {
        use crate::ast::{Expr, ValType};

        let unreachable_child = |children: &[ExprId]| {
            children
                .iter()
                .any(|child| self.ty(*child) == ValType::Unreachable)
        };

        match self.get(id) {
            Expr::Block { ty, .. } => *ty,
            Expr::Loop { body, .. } => self.ty(*body),
            Expr::If {
                condition,
                if_true,
                if_false,
            } => {
                if self.ty(*condition) == ValType::Unreachable {
                    ValType::Unreachable
                } else {
                    let on_true = self.ty(*if_true);
                    let on_false = self.ty(*if_false);
                    if on_true == ValType::Unreachable {
                        on_false
                    } else if on_false == ValType::Unreachable {
                        on_true
                    } else {
                        debug_assert_eq!(on_true, on_false, "if arms disagree");
                        on_true
                    }
                }
            }
            Expr::Break {
                value, condition, ..
            } => match condition {
                None => ValType::Unreachable,
                Some(condition) => {
                    if self.ty(*condition) == ValType::Unreachable
                        || value.is_some_and(|value| self.ty(value) == ValType::Unreachable)
                    {
                        ValType::Unreachable
                    } else {
                        value.map_or(ValType::None, |value| self.ty(value))
                    }
                }
            },
            Expr::Switch { .. } | Expr::Return { .. } | Expr::Unreachable => ValType::Unreachable,
            Expr::Call { operands, ty, .. } => {
                if unreachable_child(operands) {
                    ValType::Unreachable
                } else {
                    *ty
                }
            }
            Expr::GetLocal { ty, .. } => *ty,
            Expr::SetLocal { value, .. } => {
                if self.ty(*value) == ValType::Unreachable {
                    ValType::Unreachable
                } else {
                    ValType::None
                }
            }
            Expr::TeeLocal { value, ty, .. } => {
                if self.ty(*value) == ValType::Unreachable {
                    ValType::Unreachable
                } else {
                    *ty
                }
            }
            Expr::Load { ptr, ty, .. } => {
                if self.ty(*ptr) == ValType::Unreachable {
                    ValType::Unreachable
                } else {
                    *ty
                }
            }
            Expr::Store { ptr, value, .. } => {
                if unreachable_child(&[*ptr, *value]) {
                    ValType::Unreachable
                } else {
                    ValType::None
                }
            }
            Expr::Const(literal) => literal.type_of(),
            Expr::Unary { operand, ty, .. } => {
                if self.ty(*operand) == ValType::Unreachable {
                    ValType::Unreachable
                } else {
                    *ty
                }
            }
            Expr::Binary { lhs, rhs, ty, .. } => {
                if unreachable_child(&[*lhs, *rhs]) {
                    ValType::Unreachable
                } else {
                    *ty
                }
            }
            Expr::Select {
                condition,
                if_true,
                if_false,
                ty,
            } => {
                if unreachable_child(&[*condition, *if_true, *if_false]) {
                    ValType::Unreachable
                } else {
                    *ty
                }
            }
            Expr::Drop { value } => {
                if self.ty(*value) == ValType::Unreachable {
                    ValType::Unreachable
                } else {
                    ValType::None
                }
            }
            Expr::Nop => ValType::None,
            Expr::Sequence { second, .. } => self.ty(*second),
        }
    }
}
