use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use clap::Parser;
use flow_strip::{SourceMapMode, StripOptions, strip};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "strip")]
#[command(about = "Remove Flow type annotations while preserving line/col as much as possible", long_about = None)]
struct Args {
    /// Path to the source file to transform (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Output path for transformed source (defaults to stdout)
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Output path for the sourcemap (defaults to <out>.map if --out and --sourcemaps are given)
    #[arg(long)]
    out_sourcemap: Option<PathBuf>,

    /// Emit a sourcemap
    #[arg(long, short = 'm')]
    sourcemaps: bool,

    /// Append the sourcemap to the output as a data URL comment
    #[arg(long, conflicts_with = "sourcemaps")]
    inline_sourcemap: bool,

    /// Delete stripped code and collapse the blank lines left behind
    #[arg(long, short)]
    pretty: bool,

    /// Strip files without an @flow pragma too
    #[arg(long, short)]
    all: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let source = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let source_maps = if args.inline_sourcemap {
        SourceMapMode::Inline
    } else if args.sourcemaps {
        SourceMapMode::External
    } else {
        SourceMapMode::None
    };
    let options = StripOptions {
        pretty: args.pretty,
        ignore_pragma: args.all,
        source_maps,
        source_filename: args
            .input
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_owned),
    };

    let res = strip(&source, &options).map_err(io::Error::other)?;

    if let Some(map) = &res.source_map {
        let out_map_path = args.out_sourcemap.clone().or_else(|| {
            args.out
                .as_ref()
                .map(|out| PathBuf::from(format!("{}.map", out.display())))
        });
        match out_map_path {
            Some(path) => fs::write(path, map)?,
            None => eprintln!("{map}"),
        }
    }

    match &args.out {
        None => {
            print!("{}", res.code);
        }
        Some(out) => {
            fs::write(out, res.code)?;
        }
    }

    Ok(())
}
