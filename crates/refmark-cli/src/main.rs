//! Refmark CLI - render chat messages to HTML.

use clap::{Parser, Subcommand};
use refmark::html::code::theme_names;
use refmark::html::standalone;
use refmark::transforms::normalize;
use refmark::{
    ConversionResult, FetchError, MessageRenderer, ReferenceIndex, RenderOptions, ThumbnailSource,
};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "refmark")]
#[command(author, version, about = "Render chat messages with citation markers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a message to sanitized HTML
    Render {
        /// Input file (use - for stdin)
        input: PathBuf,

        /// Reference index JSON (chunks and doc_aggs)
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Thumbnails JSON: an object mapping document ids to image URLs
        #[arg(short, long)]
        thumbnails: Option<PathBuf>,

        /// Render options TOML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit a complete HTML document instead of a fragment
        #[arg(short, long)]
        standalone: bool,

        /// Output file (use - for stdout, or omit to use stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the normalized marker dialect of a message
    Normalize {
        /// Input file (use - for stdin)
        input: PathBuf,
    },

    /// List available highlight themes
    Themes,
}

/// Thumbnails read from a JSON file.
struct ThumbnailFile(PathBuf);

impl ThumbnailSource for ThumbnailFile {
    fn fetch(&self, doc_ids: &[String]) -> Result<HashMap<String, String>, FetchError> {
        let json = fs::read_to_string(&self.0)?;
        let all: HashMap<String, String> = serde_json::from_str(&json)?;
        all.fetch(doc_ids)
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            reference,
            thumbnails,
            config,
            standalone,
            output,
        } => {
            render(
                &input,
                reference.as_deref(),
                thumbnails.map(ThumbnailFile),
                config.as_deref(),
                standalone,
                output.as_deref(),
            )?;
        }
        Commands::Normalize { input } => {
            let content = read_input(&input)?;
            io::stdout().write_all(normalize(&content).as_bytes())?;
        }
        Commands::Themes => {
            for name in theme_names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn render(
    input: &Path,
    reference: Option<&Path>,
    thumbnails: Option<ThumbnailFile>,
    config: Option<&Path>,
    standalone_document: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = match config {
        Some(path) => RenderOptions::load(path)?,
        None => RenderOptions::default(),
    };
    let content = read_input(input)?;

    let mut renderer = MessageRenderer::new(options);

    if let Some(path) = reference {
        // A broken reference file degrades to unresolved popovers.
        let result = fs::read_to_string(path)
            .map_err(|e| refmark::ReferenceError::Unavailable(format!("{}: {e}", path.display())))
            .and_then(|json| ReferenceIndex::from_json(&json));
        if let Some(request) = renderer.set_reference_result(result)
            && let Some(source) = &thumbnails
        {
            let result = source.fetch(&request.ids);
            if !renderer.receive_thumbnails(&request, result) {
                log::info!("rendering without thumbnails");
            }
        }
    }

    let result = renderer.render(&content);
    let html = report(result);
    let html = if standalone_document {
        standalone(&html)
    } else {
        html
    };

    match output {
        Some(path) if path.as_os_str() != "-" => {
            fs::write(path, html)?;
        }
        _ => {
            io::stdout().write_all(html.as_bytes())?;
        }
    }

    Ok(())
}

fn read_input(input: &Path) -> io::Result<String> {
    if input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(input)
    }
}

fn report(result: ConversionResult<String>) -> String {
    // Report warnings to stderr
    for warning in &result.warnings {
        eprintln!("warning: {}", warning.message);
    }
    result.value
}
