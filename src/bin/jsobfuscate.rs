use clap::{Parser, ValueEnum};
use js_obfuscate_rs::{Obfuscator, Options, Preset};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Obfuscate JavaScript source", long_about = None)]
struct Args {
    /// Input file, or `-` / nothing to read stdin
    input: Option<PathBuf>,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON options file (camelCase keys)
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Start from a built-in preset
    #[arg(short, long, value_enum)]
    preset: Option<PresetArg>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Indent the output instead of printing it compact
    #[arg(long)]
    pretty: bool,

    /// Parse the input as an ES module
    #[arg(long)]
    module: bool,

    /// Skip re-parsing the generated code
    #[arg(long)]
    no_verify: bool,

    /// Log skipped values and per-pass progress
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PresetArg {
    Low,
    Medium,
    High,
}

impl From<PresetArg> for Preset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Low => Self::Low,
            PresetArg::Medium => Self::Medium,
            PresetArg::High => Self::High,
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_options(args: &Args) -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = if let Some(path) = &args.config {
        Options::from_json(&fs::read_to_string(path)?)?
    } else if let Some(preset) = args.preset {
        Options::preset(preset.into())
    } else {
        Options::default()
    };

    if args.seed.is_some() {
        options.seed = args.seed;
    }
    if args.pretty {
        options.compact = false;
    }
    if args.module {
        options.module = true;
    }
    if args.no_verify {
        options.verify = false;
    }
    if args.verbose {
        options.verbose = true;
    }
    Ok(options)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let code = match &args.input {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)?,
        _ => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let options = load_options(&args)?;
    let obfuscated = Obfuscator::new(options)?.obfuscate(&code)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, obfuscated)?;
        eprintln!("Obfuscated code written to {}", output_path.display());
    } else {
        println!("{}", obfuscated);
    }

    Ok(())
}
