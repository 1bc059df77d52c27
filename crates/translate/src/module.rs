//! Containers for the module under construction.

use crate::ast::{Arena, ExprId, FuncId, ValType};

/// A generated function.
#[derive(Debug)]
pub struct Function {
    /// Always `func_<index>`.
    pub name: String,
    /// The declared result type; never [`ValType::Unreachable`].
    pub result: ValType,
    pub params: Vec<ValType>,
    pub vars: Vec<ValType>,
    pub body: ExprId,
}

impl Function {
    /// The number of addressable locals (parameters followed by variables).
    pub fn local_count(&self) -> u32 {
        (self.params.len() + self.vars.len()) as u32
    }

    /// The declared type of a local, if the index is in range. Indices
    /// `0..|params|` refer to parameters, the rest to variables.
    pub fn local_ty(&self, index: u32) -> Option<ValType> {
        let index = index as usize;
        if index < self.params.len() {
            Some(self.params[index])
        } else {
            self.vars.get(index - self.params.len()).copied()
        }
    }
}

/// A function export. Every generated function gets exactly one, under the
/// function's own name.
#[derive(Debug)]
pub struct Export {
    pub name: String,
    pub func: FuncId,
}

/// The module's linear memory. The generator pins it to a single page so most
/// masked addresses land in bounds.
#[derive(Clone, Copy, Debug)]
pub struct Memory {
    /// Initial size in 64 KiB pages.
    pub initial: u32,
    /// Maximum size in pages.
    pub max: u32,
}

/// A WebAssembly module under construction. Owns the expression arena; every
/// node allocated during generation lives until the module is dropped.
#[derive(Debug)]
pub struct Module {
    pub arena: Arena,
    pub memory: Memory,
    pub functions: Vec<Function>,
    pub exports: Vec<Export>,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            memory: Memory { initial: 1, max: 1 },
            functions: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Serializes the module to the binary format.
    ///
    /// # Errors
    ///
    /// Fails only if the module is malformed in a way the encoder cannot
    /// express, such as a branch to a label that is not in scope; generated
    /// modules never are.
    pub fn to_binary(&self, debug_info: crate::DebugInfo) -> crate::Result<Vec<u8>> {
        crate::encode::encode(self, debug_info)
    }

    /// Writes the module in the text format.
    ///
    /// # Errors
    ///
    /// Fails if writing to `output` fails.
    pub fn write_text(&self, output: &mut dyn std::io::Write) -> crate::Result<()> {
        use anyhow::Context;

        let mut text = String::new();
        crate::text::print_module(self, &mut text)?;
        output
            .write_all(text.as_bytes())
            .context("could not write text output")
    }

    /// Writes a JavaScript harness that instantiates the module's binary and
    /// calls every export once with zeroed arguments.
    ///
    /// # Errors
    ///
    /// Fails if writing to `output` fails.
    pub fn write_js_wrapper(&self, output: &mut dyn std::io::Write) -> crate::Result<()> {
        use anyhow::Context;

        let mut text = String::new();
        crate::wrapper::print_wrapper(self, &mut text)?;
        output
            .write_all(text.as_bytes())
            .context("could not write the JavaScript wrapper")
    }
}
