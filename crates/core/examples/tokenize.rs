use std::{fs, path::PathBuf};

use clap::Parser;
use flow_strip::lexer::tokenize;

#[derive(Parser, Debug)]
#[command(name = "tokenize")]
#[command(about = "Tokenize a source file and print the token stream", long_about = None)]
struct Args {
    /// Path to the source file to tokenize
    input: PathBuf,

    /// Leave comment tokens out of the dump
    #[arg(long)]
    skip_comments: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let source = fs::read_to_string(&args.input)?;
    let tokens = tokenize(&source).map_err(std::io::Error::other)?;

    for token in tokens
        .iter()
        .filter(|t| !(args.skip_comments && t.is_comment()))
    {
        let text = token.text(&source).replace('\n', "\\n");
        println!(
            "{kind:?} [{start_byte}..{end_byte}] ({sl}:{sc})..({el}:{ec}){nl} \"{text}\"",
            kind = token.kind,
            start_byte = token.span.start,
            end_byte = token.span.end,
            sl = token.start.line,
            sc = token.start.column,
            el = token.end.line,
            ec = token.end.column,
            nl = if token.newline_before { " \\n" } else { "" },
            text = truncate(&text, 120),
        );
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    // Try to truncate on a UTF-8 boundary.
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
