//! sitecfg CLI
//!
//! Entry point for the `sitecfg` command-line tool.

use clap::{Args, Parser, Subcommand, ValueEnum};
use sitecfg::manifest::{base_dir_of, LayerEntry, LoadedManifest, Manifest};
use sitecfg::{Capabilities, LookupError, ResolvedConfiguration};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter
const LOG_ENV: &str = "SITECFG_LOG";

#[derive(Parser)]
#[command(name = "sitecfg")]
#[command(about = "Resolve layered compile-time configuration flags", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all layers and print the configuration
    Resolve {
        #[command(flatten)]
        inputs: Inputs,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Include guard for header output
        #[arg(long, default_value = "__SITECFG_RESOLVED_H__")]
        guard: String,

        /// Write output to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print a single flag's value (exit code 2 if unknown)
    Get {
        /// Flag name
        flag: String,

        #[command(flatten)]
        inputs: Inputs,
    },

    /// Show where a flag's value comes from
    Explain {
        /// Flag name
        flag: String,

        #[command(flatten)]
        inputs: Inputs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate inputs and report sources, digest and diagnostics
    Check {
        #[command(flatten)]
        inputs: Inputs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Header,
    Capabilities,
}

/// Where layers come from
#[derive(Args)]
struct Inputs {
    /// Path to a resolution manifest (sitecfg.toml)
    #[arg(long, short = 'm')]
    manifest: Option<PathBuf>,

    /// Layer file as PRIORITY=PATH (.h or .toml); repeatable
    #[arg(long, short = 'l', value_parser = parse_layer_arg, allow_hyphen_values = true)]
    layer: Vec<(i32, PathBuf)>,

    /// Built-in layer as PRIORITY=NAME (host-detect, ios); repeatable
    #[arg(long, short = 'b', value_parser = parse_builtin_arg, allow_hyphen_values = true)]
    builtin: Vec<(i32, String)>,

    /// Treat redefinitions without undef as errors
    #[arg(long)]
    strict: bool,

    /// Skip the built-in endianness / cpu-arch exclusion groups
    #[arg(long)]
    no_builtin_groups: bool,
}

fn split_priority(arg: &str) -> Result<(i32, &str), String> {
    let (priority, rest) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected PRIORITY=VALUE, got '{}'", arg))?;
    let priority = priority
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid priority '{}': {}", priority, e))?;
    if rest.is_empty() {
        return Err(format!("missing value after '=' in '{}'", arg));
    }
    Ok((priority, rest))
}

fn parse_layer_arg(arg: &str) -> Result<(i32, PathBuf), String> {
    split_priority(arg).map(|(p, path)| (p, PathBuf::from(path)))
}

fn parse_builtin_arg(arg: &str) -> Result<(i32, String), String> {
    split_priority(arg).map(|(p, name)| (p, name.to_string()))
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Resolve {
            inputs,
            format,
            guard,
            output,
        } => run_resolve(&inputs, format, &guard, output.as_deref()),
        Commands::Get { flag, inputs } => run_get(&flag, &inputs),
        Commands::Explain { flag, inputs, json } => run_explain(&flag, &inputs, json),
        Commands::Check { inputs, json } => run_check(&inputs, json),
    }
}

/// Build the session from a manifest and/or command-line layers.
fn load_inputs(inputs: &Inputs) -> Result<LoadedManifest, String> {
    let (mut manifest, base_dir, manifest_digest) = match &inputs.manifest {
        Some(path) => {
            let (manifest, digest) = Manifest::read(path).map_err(|e| e.to_string())?;
            (manifest, base_dir_of(path).to_path_buf(), Some(digest))
        }
        None => (Manifest::default(), PathBuf::from("."), None),
    };

    // Command-line layer paths are relative to the working directory
    let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
    for (priority, path) in &inputs.layer {
        manifest.layers.push(LayerEntry::file(*priority, cwd.join(path)));
    }
    for (priority, name) in &inputs.builtin {
        manifest.layers.push(LayerEntry::builtin(*priority, name.clone()));
    }
    if inputs.strict {
        manifest.options.strict = true;
    }
    if inputs.no_builtin_groups {
        manifest.options.builtin_groups = false;
    }

    if manifest.layers.is_empty() {
        return Err("no layers given; use --manifest, --layer or --builtin".to_string());
    }

    manifest.validate().map_err(|e| e.to_string())?;
    let mut loaded = manifest.into_loaded(&base_dir).map_err(|e| e.to_string())?;
    loaded.manifest_digest = manifest_digest;
    Ok(loaded)
}

fn resolve_or_exit(inputs: &Inputs) -> (LoadedManifest, ResolvedConfiguration) {
    let loaded = match load_inputs(inputs) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    match loaded.resolve() {
        Ok(config) => (loaded, config),
        Err(e) => {
            // Ambiguous configuration must stop the build step
            eprintln!("Resolution failed: {}", e);
            process::exit(1);
        }
    }
}

fn run_resolve(inputs: &Inputs, format: Format, guard: &str, output: Option<&Path>) {
    let (_, config) = resolve_or_exit(inputs);

    if let (Format::Json, Some(path)) = (format, output) {
        if let Err(e) = config.write_to_file(path) {
            eprintln!("Error writing {}: {}", path.display(), e);
            process::exit(1);
        }
        eprintln!("Wrote: {}", path.display());
        return;
    }

    let rendered = match format {
        Format::Text => Ok(render_text(&config)),
        Format::Json => config.to_json().map_err(|e| e.to_string()),
        Format::Header => Ok(config.to_header(guard)),
        Format::Capabilities => Capabilities::from_config(&config)
            .map_err(|e| e.to_string())
            .and_then(|caps| serde_json::to_string_pretty(&caps).map_err(|e| e.to_string())),
    };

    let rendered = match rendered {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error rendering output: {}", e);
            process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &rendered) {
                eprintln!("Error writing {}: {}", path.display(), e);
                process::exit(1);
            }
            eprintln!("Wrote: {}", path.display());
        }
        None => print!("{}", rendered),
    }
}

fn render_text(config: &ResolvedConfiguration) -> String {
    let mut out = String::new();
    for (name, flag) in config.flags() {
        let marker = if flag.detected { " (detected)" } else { "" };
        out.push_str(&format!("{} = {}  [{}{}]\n", name, flag.value, flag.source, marker));
    }
    out
}

fn run_get(flag: &str, inputs: &Inputs) {
    let (_, config) = resolve_or_exit(inputs);

    match config.get(flag) {
        Ok(value) => println!("{}", value),
        Err(LookupError::UnknownFlag(name)) => {
            eprintln!("Unknown flag: {}", name);
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_explain(flag: &str, inputs: &Inputs, json_output: bool) {
    let (_, config) = resolve_or_exit(inputs);

    let explanation = match config.explain(flag) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    if json_output {
        match serde_json::to_string_pretty(&explanation) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", explanation.to_human());
    }
}

fn run_check(inputs: &Inputs, json_output: bool) {
    let (loaded, config) = resolve_or_exit(inputs);

    let digest = match config.digest() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error computing digest: {}", e);
            process::exit(1);
        }
    };

    if json_output {
        let output = serde_json::json!({
            "ok": true,
            "digest": digest,
            "manifest_digest": loaded.manifest_digest,
            "sources": loaded.sources,
            "flag_count": config.len(),
            "diagnostics": config.diagnostics(),
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Configuration resolved: {} flags", config.len());
    println!("  Digest: {}", digest);
    println!();
    println!("Layers (applied in order):");
    let mut sources = loaded.sources.clone();
    sources.sort_by_key(|s| s.priority);
    for source in &sources {
        match &source.path {
            Some(path) => println!("  {:>6}  {} ({})", source.priority, source.layer, path),
            None => println!("  {:>6}  {} ({:?})", source.priority, source.layer, source.origin),
        }
    }

    if !config.diagnostics().is_empty() {
        println!();
        println!("Diagnostics:");
        for diagnostic in config.diagnostics() {
            match diagnostic {
                sitecfg::resolved::Diagnostic::Redefinition {
                    flag,
                    previous_layer,
                    previous,
                    layer,
                    value,
                } => println!(
                    "  {} redefined by {} ({} -> {}) without undef; was set by {}",
                    flag, layer, previous, value, previous_layer
                ),
            }
        }
    }
}
