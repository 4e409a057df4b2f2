//! sq: Sift Query - CLI for checking and compiling search filters.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sq")]
#[command(about = "Sift Query - check and compile metadata search filters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a filter into OR-of-AND search rules
    #[command(visible_alias = "c")]
    Compile {
        /// Filter file (.json, .yaml, .yml). Reads stdin if not provided or "-"
        input: Option<String>,

        /// Inline filter JSON (alternative to INPUT)
        #[arg(short = 'e', long = "expr", conflicts_with = "input")]
        expr: Option<String>,

        /// Compile a saved preset (see `sq preset list`)
        #[arg(short = 'p', long = "preset", conflicts_with_all = ["input", "expr"])]
        preset: Option<String>,

        /// Output format: pretty, json, clauses
        #[arg(short = 'f', long = "format", default_value = "pretty")]
        format: String,

        /// Don't add the default "not soft-deleted" rule (overrides config)
        #[arg(long = "no-default-status")]
        no_default_status: bool,

        /// Print only the payload fingerprint
        #[arg(long = "fingerprint")]
        fingerprint: bool,
    },

    /// Validate a filter and print its canonical form
    #[command(visible_alias = "k")]
    Check {
        /// Filter file (.json, .yaml, .yml). Reads stdin if not provided or "-"
        input: Option<String>,

        /// Inline filter JSON (alternative to INPUT)
        #[arg(short = 'e', long = "expr", conflicts_with = "input")]
        expr: Option<String>,

        /// Output format: json, yaml
        #[arg(short = 'f', long = "format", default_value = "json")]
        format: String,
    },

    /// Manage named filter presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Quick reference for the filter syntax
    #[command(name = "quick-help", visible_alias = "?")]
    QuickHelp,
}

#[derive(Subcommand)]
enum PresetAction {
    /// List presets
    List {
        /// Glob pattern on preset names (e.g., "prod-*")
        pattern: Option<String>,
    },

    /// Save a filter as a preset
    Add {
        /// Preset name (letters, digits, '-', '_')
        name: String,

        /// Filter file (.json, .yaml, .yml). Reads stdin if not provided or "-"
        input: Option<String>,

        /// Inline filter JSON (alternative to INPUT)
        #[arg(short = 'e', long = "expr", conflicts_with = "input")]
        expr: Option<String>,

        /// Replace an existing preset with the same name
        #[arg(long)]
        force: bool,
    },

    /// Remove a preset
    Remove {
        /// Name of the preset to remove
        name: String,
    },

    /// Show a preset's filter
    Show {
        /// Name of the preset to show
        name: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            expr,
            preset,
            format,
            no_default_status,
            fingerprint,
        } => {
            let source = commands::FilterSource::resolve(
                input.as_deref(),
                expr.as_deref(),
                preset.as_deref(),
            );
            let opts = commands::CompileArgs {
                format,
                no_default_status,
                fingerprint,
            };
            commands::compile(&source, &opts)
        }
        Commands::Check { input, expr, format } => {
            let source = commands::FilterSource::resolve(input.as_deref(), expr.as_deref(), None);
            commands::check(&source, &format)
        }
        Commands::Preset { action } => match action {
            PresetAction::List { pattern } => commands::preset_list(pattern.as_deref()),
            PresetAction::Add {
                name,
                input,
                expr,
                force,
            } => {
                let source =
                    commands::FilterSource::resolve(input.as_deref(), expr.as_deref(), None);
                commands::preset_add(&name, &source, force)
            }
            PresetAction::Remove { name } => commands::preset_remove(&name),
            PresetAction::Show { name } => commands::preset_show(&name),
        },
        Commands::QuickHelp => commands::quick_help(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
