//! The `fuzz2wasm` command line interface.

use std::io::Write as _;

use anyhow::Context;
use fuzz2wasm_translate::DebugInfo;

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Arguments {
    /// Translate the input bytes into a valid WebAssembly module, *somehow*.
    ///
    /// Without this flag the input is parsed as an ordinary module, in either
    /// the binary format (`.wasm`) or the text format (`.wat`), and validated.
    #[arg(long)]
    translate_to_fuzz: bool,
    /// Emit text instead of binary for the output file.
    #[arg(short = 'S', long)]
    emit_text: bool,
    /// Emit a names section naming every function.
    #[arg(short = 'g', long = "debuginfo")]
    debug_info: bool,
    /// Output file (stdout if not specified).
    #[arg(short, long)]
    output: Option<std::path::PathBuf>,
    /// Serialize the generated module a second time and check both round
    /// trips agree, helping fuzzing find binary format bugs.
    #[arg(long = "fuzz-binary")]
    fuzz_binary: bool,
    /// Emit a JavaScript wrapper file that can run the wasm with some test
    /// values, useful for fuzzing.
    #[arg(long = "emit-js-wrapper", value_name = "FILE")]
    emit_js_wrapper: Option<std::path::PathBuf>,
    /// Path to the input file.
    infile: std::path::PathBuf,
}

fn write_output(
    path: Option<&std::path::Path>,
    write: impl FnOnce(&mut dyn std::io::Write) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("could not create output file {path:?}"))?;
            let mut out = std::io::BufWriter::with_capacity(4096, file);
            write(&mut out)?;
            out.flush().context("could not flush the output file")
        }
        None => write(&mut std::io::stdout().lock()),
    }
}

/// Rewrites the single-dash spellings `-ttf`, `-fb`, and `-ejw` to their long
/// forms. Clap reads a dash followed by several letters as bundled short
/// options, so these have to be handled before parsing.
fn rewrite_single_dash_flags(
    args: impl Iterator<Item = std::ffi::OsString>,
) -> impl Iterator<Item = std::ffi::OsString> {
    args.map(|arg| match arg.to_str() {
        Some("-ttf") => "--translate-to-fuzz".into(),
        Some("-fb") => "--fuzz-binary".into(),
        Some("-ejw") => "--emit-js-wrapper".into(),
        _ => arg,
    })
}

pub fn main() -> anyhow::Result<std::process::ExitCode> {
    let arguments =
        <Arguments as clap::Parser>::parse_from(rewrite_single_dash_flags(std::env::args_os()));
    let output = arguments.output.as_deref();

    if arguments.translate_to_fuzz {
        let input = std::fs::read(&arguments.infile)
            .with_context(|| format!("could not read {:?}", arguments.infile))?;

        let debug_info = if arguments.debug_info {
            DebugInfo::Full
        } else {
            DebugInfo::Omit
        };

        let module = fuzz2wasm_translate::Translate::new().module(&input);
        let binary = module.to_binary(debug_info)?;
        fuzz2wasm_translate::verify(&binary)
            .context("translate-to-fuzz must always generate a valid module")?;

        if arguments.fuzz_binary {
            let again = module.to_binary(debug_info)?;
            anyhow::ensure!(
                binary == again,
                "serialization round trip produced differing bytes"
            );
        }

        if arguments.emit_text {
            write_output(output, |out| module.write_text(out))?;
        } else {
            write_output(output, |out| {
                out.write_all(&binary)
                    .context("could not write binary output")
            })?;
        }

        if let Some(path) = &arguments.emit_js_wrapper {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("could not create wrapper file {path:?}"))?;
            module.write_js_wrapper(&mut file)?;
        }
    } else {
        anyhow::ensure!(
            !arguments.emit_text && arguments.emit_js_wrapper.is_none() && !arguments.fuzz_binary,
            "re-emitting an ordinary module requires --translate-to-fuzz"
        );

        let wasm = wat::parse_file(&arguments.infile)
            .with_context(|| format!("could not parse {:?}", arguments.infile))?;
        fuzz2wasm_translate::verify(&wasm).context("error validating input")?;

        if output.is_some() {
            write_output(output, |out| {
                out.write_all(&wasm)
                    .context("could not write binary output")
            })?;
        }
    }

    Ok(std::process::ExitCode::SUCCESS)
}
