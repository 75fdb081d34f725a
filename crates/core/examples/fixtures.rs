use std::{fs, path::PathBuf};

use clap::Parser;
use flow_strip::{SourceMapMode, StripOptions, strip};

#[derive(Parser, Debug)]
#[command(name = "fixtures")]
#[command(about = "Create or validate fixture files", long_about = None)]
struct Args {
    /// Write fixtures instead of validating them
    #[arg(long, short)]
    write: bool,

    /// Path to the fixtures directory (defaults to "./fixtures")
    #[arg(long, default_value = "fixtures")]
    dir: PathBuf,

    /// Delete stripped code and collapse the blank lines left behind
    #[arg(long, short)]
    pretty: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Read all files in the fixtures directory
    let entries = fs::read_dir(&args.dir)?;

    let mut input_files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("invalid filename")?;

        // Skip .out. files and anything that is not JavaScript
        if filename.contains(".out.") || !filename.ends_with(".js") {
            continue;
        }

        input_files.push(path);
    }

    input_files.sort();

    let suffix = if args.pretty { "pretty.out" } else { "out" };
    let mut mismatches = Vec::new();

    println!(
        "{} fixtures...",
        if args.write { "Creating" } else { "Validating" }
    );
    for input_path in &input_files {
        let filename = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("invalid filename")?;
        let basename = filename
            .strip_suffix(".js")
            .ok_or("filename missing extension")?;

        let source = fs::read_to_string(input_path)?;
        let options = StripOptions {
            pretty: args.pretty,
            source_maps: SourceMapMode::External,
            source_filename: Some(filename.to_owned()),
            ..Default::default()
        };
        let res = strip(&source, &options)?;
        let map = res.source_map.unwrap_or_default();

        // Determine output paths
        let out_path = args.dir.join(format!("{basename}.{suffix}.js"));
        let out_map_path = args.dir.join(format!("{basename}.{suffix}.js.map"));

        if args.write {
            fs::write(&out_path, &res.code)?;
            fs::write(&out_map_path, &map)?;

            println!(
                "  Created {} and {}",
                out_path.display(),
                out_map_path.display()
            );
            continue;
        }

        for (path, actual, what) in [
            (&out_path, res.code.as_bytes(), "code"),
            (&out_map_path, map.as_bytes(), "sourcemap"),
        ] {
            if !path.exists() {
                mismatches.push(format!("{filename}: missing output file {}", path.display()));
            } else if fs::read(path)? != actual {
                mismatches.push(format!("{filename}: {what} mismatch"));
            }
        }

        if !mismatches.iter().any(|m| m.starts_with(filename)) {
            println!("  ✓ {filename}");
        }
    }

    if !mismatches.is_empty() {
        eprintln!("\nValidation failed:");
        for mismatch in &mismatches {
            eprintln!("  ✗ {mismatch}");
        }
        return Err(format!("{} validation error(s)", mismatches.len()).into());
    }

    println!("\nDone with {} fixtures.", input_files.len());

    Ok(())
}
