//! Core library for `fuzz2wasm`, translating arbitrary byte buffers into
//! [WebAssembly modules] that are always structurally valid.
//!
//! The translator is deterministic and cannot fail: the input bytes act as an
//! entropy stream steering a type-directed expression synthesizer, and when
//! they run out the stream replays itself under an incrementing xor mask until
//! generation winds down. The interesting guarantee is the post-condition —
//! every module produced here [validates] — which the [`Translate::translate`]
//! entry point also asserts.
//!
//! [WebAssembly modules]: https://webassembly.github.io/spec/core/syntax/modules.html
//! [validates]: https://webassembly.github.io/spec/core/valid/index.html

#![deny(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_debug_implementations)]

pub mod ast;
pub mod entropy;
pub mod module;

mod encode;
mod text;
mod translate;
mod wrapper;

#[doc(no_inline)]
pub use anyhow::{Error, Result};

pub use translate::{verify, DebugInfo, Translate};
