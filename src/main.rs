use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use tidemark::{OutputMode, Settings, parse_document, render};

/// Convert CommonMark markdown to HTML.
#[derive(Debug, Parser)]
#[command(name = "tidemark", version, about)]
struct Args {
    /// Input files; reads stdin when none are given.
    files: Vec<PathBuf>,

    /// Print the parsed tree instead of HTML.
    #[arg(long)]
    ast: bool,

    /// Print the document as JSON instead of HTML.
    #[arg(long, conflicts_with = "ast")]
    json: bool,

    /// Re-emit normalized markdown instead of HTML.
    #[arg(long, conflicts_with_all = ["ast", "json"])]
    markdown: bool,

    /// Enable all extension flags (tables, strikethrough, heading ids, ...).
    #[arg(long)]
    extended: bool,

    /// Add data-sourcepos attributes to HTML output.
    #[arg(long)]
    sourcepos: bool,

    /// Placeholder substitution, `token:url`; repeatable.
    #[arg(long = "subst", value_name = "TOKEN:URL")]
    subst: Vec<String>,

    /// Parse the input N times and report the timing to stderr.
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "100")]
    bench: Option<u32>,

    /// Write output to a file instead of stdout.
    #[arg(long, short, value_name = "FILE")]
    out: Option<PathBuf>,
}

fn settings_from(args: &Args) -> Result<Settings, String> {
    let mut builder = Settings::builder();
    if args.extended {
        builder = builder
            .strikethrough(true)
            .sub_superscript(true)
            .emphasis_in_code(true)
            .heading_ids(true)
            .front_matter(true)
            .pipe_tables(true);
    }
    if args.sourcepos {
        builder = builder.track_positions(true);
    }
    if !args.subst.is_empty() {
        let mut pairs = Vec::with_capacity(args.subst.len());
        for entry in &args.subst {
            let (token, url) = entry
                .split_once(':')
                .ok_or_else(|| format!("invalid --subst {entry:?}, expected TOKEN:URL"))?;
            pairs.push((token.to_string(), url.to_string()));
        }
        builder = builder.placeholder_resolver(move |token: &str| {
            pairs
                .iter()
                .find(|(t, _)| t == token)
                .map(|(_, url)| url.clone())
        });
    }
    Ok(builder.build())
}

fn read_input(files: &[PathBuf]) -> io::Result<String> {
    if files.is_empty() {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    let mut input = String::new();
    for path in files {
        input.push_str(&fs::read_to_string(path)?);
    }
    Ok(input)
}

fn run(args: &Args) -> Result<String, String> {
    let settings = settings_from(args)?;
    let input = read_input(&args.files).map_err(|e| e.to_string())?;
    if let Some(rounds) = args.bench {
        let started = std::time::Instant::now();
        for _ in 0..rounds {
            parse_document(&input, &settings).map_err(|e| e.to_string())?;
        }
        let elapsed = started.elapsed();
        eprintln!(
            "parsed {rounds} times in {elapsed:?} ({:?}/round)",
            elapsed / rounds.max(1)
        );
    }
    let doc = parse_document(&input, &settings).map_err(|e| e.to_string())?;
    if args.json {
        return serde_json::to_string_pretty(&doc).map_err(|e| e.to_string());
    }
    let mode = if args.ast {
        OutputMode::DebugTree
    } else if args.markdown {
        OutputMode::Markdown
    } else {
        OutputMode::Html
    };
    render(&doc, &settings, mode).map_err(|e| e.to_string())
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(output) => {
            let result = match &args.out {
                Some(path) => fs::write(path, output),
                None => io::stdout().write_all(output.as_bytes()),
            };
            if let Err(e) = result {
                eprintln!("tidemark: {e}");
                process::exit(1);
            }
        }
        Err(message) => {
            eprintln!("tidemark: {message}");
            process::exit(1);
        }
    }
}
