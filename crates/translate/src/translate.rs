//! The module driver: spends the entropy stream on functions until it is
//! exhausted, then hands the result to the validator.

mod expr;

use crate::entropy::InputStream;
use crate::module::Module;

/// Indicates whether serialized output carries a `name` section mapping
/// function indices back to their generated names.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DebugInfo {
    /// Do not emit a `name` section.
    #[default]
    Omit,
    /// Emit a `name` section naming every function.
    Full,
}

/// Options for translating a byte buffer into a WebAssembly module.
///
/// Translation is deterministic: the same input always produces the same
/// module, and it cannot fail — an empty input is treated as a single zero
/// byte, and an exhausted input winds generation down to trivial leaves.
#[derive(Clone, Copy, Debug, Default)]
pub struct Translate {
    debug_info: DebugInfo,
}

impl Translate {
    /// Gets the default options.
    pub fn new() -> Self {
        Self {
            debug_info: DebugInfo::Omit,
        }
    }

    /// Sets whether serialized output carries a `name` section.
    pub fn debug_info(mut self, debug_info: DebugInfo) -> Self {
        self.debug_info = debug_info;
        self
    }

    /// Translates the input bytes into a module.
    ///
    /// The returned module always validates; [`translate`](Self::translate)
    /// checks that post-condition as well.
    pub fn module(&self, input: &[u8]) -> Module {
        let mut stream = InputStream::new(input);
        let mut module = Module::new();

        // use one page of memory
        module.memory.initial = 1;
        module.memory.max = 1;

        // keep adding functions until we run out of input
        while !stream.finished() {
            expr::FuncGen::new(&mut module, &mut stream).run();
        }

        module
    }

    /// Translates the input bytes all the way to a serialized, validated
    /// binary module.
    ///
    /// # Errors
    ///
    /// Fails only when the generated module does not validate, which is a bug
    /// in the translator rather than a property of the input.
    pub fn translate(&self, input: &[u8]) -> crate::Result<Vec<u8>> {
        use anyhow::Context;

        let binary = self.module(input).to_binary(self.debug_info)?;
        verify(&binary).context("translate-to-fuzz must always generate a valid module")?;
        Ok(binary)
    }
}

/// Checks a binary module against the WebAssembly 1.0 feature set the
/// translator targets.
///
/// # Errors
///
/// Fails when the module does not parse or does not validate.
pub fn verify(binary: &[u8]) -> crate::Result<()> {
    // The set of WebAssembly features generated modules may rely on.
    let supported_features: wasmparser::WasmFeatures = wasmparser::WasmFeaturesInflated {
        mutable_global: true,
        saturating_float_to_int: false,
        sign_extension: false,
        reference_types: false,
        multi_value: false,
        bulk_memory: false,
        simd: false,
        relaxed_simd: false,
        threads: false,
        shared_everything_threads: false,
        tail_call: false,
        floats: true,
        multi_memory: false,
        exceptions: false,
        memory64: false,
        extended_const: false,
        component_model: false,
        function_references: false,
        memory_control: false,
        gc: false,
        custom_page_sizes: false,
        component_model_values: false,
        component_model_nested_names: false,
    }
    .into();

    let mut validator = wasmparser::Validator::new_with_features(supported_features);
    validator.validate_all(binary)?;
    Ok(())
}
