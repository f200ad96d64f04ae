//! CLI tool for turning a PPTX deck into narration scripts, SSML and audio.

use anyhow::{bail, Context, Result};
use clap::Parser;
use deck_core::{
    DeckFormat, GenerationMode, NarrationOutput, NarrationPipeline, Oracles, PipelineConfig,
};
use deck_openai::{GoogleSpeech, OpenAiClient, OpenAiConfig, SpeechConfig};
use deck_pptx::PptxParser;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Generate presenter narration for a slide deck.
#[derive(Parser, Debug)]
#[command(name = "deck-narrate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input deck (.pptx)
    input: PathBuf,

    /// File holding the whole-document summary
    #[arg(short, long)]
    summary: PathBuf,

    /// Keyword to steer emphasis (repeatable)
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Slides per generation call
    #[arg(short, long)]
    chunk_size: Option<usize>,

    /// Number of emphasized words
    #[arg(short, long)]
    top_k: Option<usize>,

    /// Generate one slide per call instead of chunks
    #[arg(long)]
    per_slide: bool,

    /// Narration language, e.g. "Korean" (match the speech voice)
    #[arg(short = 'l', long)]
    language: Option<String>,

    /// Earlier narrations shown to each generation call
    #[arg(short, long)]
    window_size: Option<usize>,

    /// Skip image descriptions
    #[arg(long)]
    no_describe: bool,

    /// JSON config file with `pipeline`, `openai` and `speech` sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output JSON file (default: <input stem>.narration.json next to the input)
    #[arg(short, long, conflicts_with = "print")]
    output: Option<PathBuf>,

    /// Print the JSON result to stdout instead of writing a file
    #[arg(short, long)]
    print: bool,

    /// Synthesize speech and write page_<n>.wav files here
    #[arg(short, long)]
    audio_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunConfig {
    pipeline: PipelineConfig,
    openai: OpenAiConfig,
    speech: SpeechConfig,
}

impl RunConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Command-line flags win over the config file.
    fn apply_args(mut self, args: &Args) -> Self {
        if let Some(size) = args.chunk_size {
            self.pipeline = self.pipeline.with_chunk_size(size);
        }
        if let Some(top_k) = args.top_k {
            self.pipeline = self.pipeline.with_top_k(top_k);
        }
        if args.per_slide {
            self.pipeline = self.pipeline.with_mode(GenerationMode::PerSlide);
        }
        if let Some(language) = &args.language {
            self.pipeline = self.pipeline.with_language(language.as_str());
        }
        if let Some(size) = args.window_size {
            self.pipeline = self.pipeline.with_window_size(size);
        }
        if args.no_describe {
            self.pipeline = self.pipeline.with_describe_images(false);
        }
        self
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = RunConfig::load(args.config.as_deref())?.apply_args(&args);
    let output = process_file(&args, &config)?;

    if output.has_warnings() {
        eprintln!("{}", warning_report(&output));
    }

    let json = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
    if args.print {
        println!("{}", json);
    } else {
        let output_path = get_output_path(&args.input, args.output.as_ref());
        write_output(&output_path, json.as_bytes())?;
        if args.verbose {
            eprintln!("Written to: {}", output_path.display());
        }
    }

    Ok(())
}

/// Narrate a single deck, and voice it when an audio directory is given.
fn process_file(args: &Args, config: &RunConfig) -> Result<NarrationOutput> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let format = DeckFormat::from_magic(&bytes).or_else(|| {
        args.input
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DeckFormat::from_extension)
    });
    match format {
        Some(format) => log::debug!("Detected {:?} deck", format),
        None => bail!("Could not detect file format of {}", args.input.display()),
    }

    let summary = fs::read_to_string(&args.summary)
        .with_context(|| format!("Failed to read summary {}", args.summary.display()))?;

    let client = OpenAiClient::new(config.openai.clone().apply_env())
        .context("Failed to set up the OpenAI client")?;
    let oracles = Oracles {
        generator: &client,
        classifier: &client,
        describer: Some(&client),
        embedder: &client,
    };
    let pipeline = NarrationPipeline::new(oracles, config.pipeline.clone())?;

    let output = pipeline.process_document(&PptxParser::new(), &bytes, &summary, &args.keywords)?;

    if args.verbose {
        eprintln!("  Narrated {} slides", output.narrations.len());
    }

    if let Some(dir) = &args.audio_dir {
        let speech = GoogleSpeech::new(config.speech.clone().apply_env())
            .context("Failed to set up the speech client")?;
        let audio = pipeline.synthesize_speech(&speech, &output);
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create audio directory: {}", dir.display()))?;
        for (page, data) in &audio.audio {
            write_output(&dir.join(audio_file_name(*page)), data)?;
        }
        for warning in &audio.warnings {
            eprintln!("  audio: {}", warning.message);
        }
        if args.verbose {
            eprintln!("  Wrote {} audio files to {}", audio.audio.len(), dir.display());
        }
    }

    Ok(output)
}

/// Human-readable list of the warnings in `output`.
fn warning_report(output: &NarrationOutput) -> String {
    let mut report = format!("Completed with {} warning(s):", output.warnings.len());
    for warning in &output.warnings {
        match warning.slide {
            Some(n) => report.push_str(&format!("\n  slide {}: {}", n, warning.message)),
            None => report.push_str(&format!("\n  {}", warning.message)),
        }
    }
    report
}

fn audio_file_name(page: usize) -> String {
    format!("page_{}.wav", page)
}

/// Determine the output path for a processed deck.
fn get_output_path(input_path: &Path, output: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = output {
        return path.clone();
    }

    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let output_filename = format!("{}.narration.json", stem);

    match input_path.parent() {
        Some(parent) => parent.join(output_filename),
        None => PathBuf::from(output_filename),
    }
}

/// Write output to a file.
fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
