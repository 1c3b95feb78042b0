//! Assembly to binary-image compiler CLI.
//!
//! Reads an assembly source file and compiles it to a flat `.fb` word
//! image. Every problem in the source is reported in one run; if any
//! were reported, no output file is written or overwritten.
//!
//! # Usage
//! ```text
//! assembler <source-file> [output-file]
//! ```
//!
//! # Arguments
//! - `source-file`: Assembly source to compile
//! - `output-file`: Image path, must end in `.fb` (defaults to `a.fb`)
//!
//! # Exit codes
//! - 0: success (or problems reported, with emission suppressed)
//! - 1: wrong argument count
//! - 2: source file inaccessible
//! - 3: allocation failure

use std::env;
use std::process;
use wordvm::assembler::assemble_file;
use wordvm::errors::AsmError;
use wordvm::image::IMAGE_EXTENSION;
use wordvm::{error, info};

/// Output path used when none is supplied.
const DEFAULT_OUTPUT: &str = "a.fb";

const USAGE: &str = "\
Assembler

USAGE:
    {program} <source-file> [output-file]

ARGS:
    <source-file>    Assembly source file to compile
    [output-file]    Image path ending in '.fb' (defaults to a.fb)

No output is written if any problem was reported during assembly.
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() == 2 && (args[1] == "--help" || args[1] == "-h") {
        print_usage(&args[0]);
        process::exit(0);
    }

    if !(2..=3).contains(&args.len()) {
        error!("incorrect number of arguments");
        print_usage(&args[0]);
        process::exit(1);
    }

    let assembly = match assemble_file(&args[1]) {
        Ok(assembly) => assembly,
        Err(e @ AsmError::SourceUnreadable { .. }) => {
            error!("{}", e);
            process::exit(2);
        }
        Err(e @ AsmError::OutOfMemory { .. }) => {
            error!("{}", e);
            process::exit(3);
        }
    };

    let mut suppressed = !assembly.is_clean();

    let output_path = match args.get(2) {
        Some(path) if !path.ends_with(IMAGE_EXTENSION) => {
            error!("output filename does not end with '{}'", IMAGE_EXTENSION);
            suppressed = true;
            DEFAULT_OUTPUT
        }
        Some(path) => path.as_str(),
        None => DEFAULT_OUTPUT,
    };

    if suppressed {
        error!("problems were reported, so no output binary was written");
        return;
    }

    // is_clean() held above, so the image is always present here.
    let Some(image) = assembly.image() else {
        return;
    };

    if let Err(e) = image.write_file(output_path) {
        error!("could not write output file '{}': {}", output_path, e);
        process::exit(2);
    }

    info!("wrote {} words to {}", image.len(), output_path);
}
