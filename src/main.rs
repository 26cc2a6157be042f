use log::info;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Instant;
use vexport::{ExportError, ExportOptions, export_scene_file};

/// A simple CLI that exports a JSON scene to a vector document.
fn main() -> Result<(), ExportError> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!("Exports a JSON scene to PostScript, EPS, PDF, SVG or a LaTeX overlay.");
        eprintln!();
        eprintln!("Usage: {} <path/to/scene.json> <path/to/output.(ps|eps|pdf|svg|tex)> [path/to/options.json]", args[0]);
        eprintln!();
        eprintln!("Set RUST_LOG=debug for a trace of the export.");
        std::process::exit(1);
    }

    let scene_path = Path::new(&args[1]);
    let output_path = Path::new(&args[2]);
    let options = match args.get(3) {
        Some(options_path) => ExportOptions::from_json(&fs::read_to_string(options_path)?)?,
        None => ExportOptions::default(),
    };

    let start = Instant::now();
    let written = export_scene_file(scene_path, output_path, options)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    info!("Export finished in {:.2?}", start.elapsed());
    Ok(())
}
