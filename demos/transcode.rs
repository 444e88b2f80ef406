//! Converts an image file (PNG, JPEG, ...) into `<input>.qoi`, or into the
//! second argument when given.
//!
//! `RUST_LOG=debug cargo run --example transcode -- input.png` prints chunk
//! statistics.

use std::path::PathBuf;

fn main() {
    env_logger::init();

    let mut args = std::env::args_os().skip(1);
    let input = PathBuf::from(
        args.next()
            .unwrap_or_else(|| panic!("Expects an input file as first argument")),
    );
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.with_extension("qoi"));

    let stats = qoi_encoder::transcode_file(&input, &output).unwrap();
    println!(
        "{} -> {}: {} pixels, {} bytes",
        input.display(),
        output.display(),
        stats.pixels,
        stats.bytes
    );
}
