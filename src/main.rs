use clap::{Parser as ClapParser, Subcommand};
use std::io::{self, Read};
use std::path::PathBuf;
use tillscript::cli::{self, CheckOptions, CliError};
use tillscript::{Engine, EngineConfig};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "till")]
#[command(about = "tillscript - formulas, rules and templates for point-of-sale hosts")]
#[command(version)]
struct Cli {
    /// JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression and print the result as JSON
    Eval {
        /// The expression to evaluate
        expression: String,

        /// JSON data whose fields become globals (reads from stdin if not provided)
        #[arg(short, long)]
        data: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Execute a script (or script file) and print its `result` variable
    Run {
        /// Script text or path to a script file
        script: String,

        /// JSON data whose fields become globals
        #[arg(short, long)]
        data: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Replace [=expression] placeholders in a template
    Template {
        /// The template text
        text: String,

        /// JSON data whose fields become globals (reads from stdin if not provided)
        #[arg(short, long)]
        data: Option<String>,

        /// Placeholder regex; capture group 1 is the expression
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Validate script syntax without running it
    Check {
        /// The script to validate
        script: String,
    },

    /// List registered functions, or describe one
    Functions {
        /// Function name or alias
        name: Option<String>,
    },

    /// List documentation categories
    Docs,

    /// Show documentation for a specific category
    Doc {
        /// Category name (use 'till docs' to list categories)
        category: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_ref()).and_then(|config| run(cli.command, Engine::with_config(config)));
    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, CliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

/// Explicit data, else piped stdin, else nothing.
fn read_data(data: Option<String>) -> Result<Option<String>, CliError> {
    match data {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer).filter(|b| !b.trim().is_empty()))
        }
        None => Ok(None),
    }
}

fn run(command: Commands, mut engine: Engine) -> Result<String, CliError> {
    match command {
        Commands::Eval {
            expression,
            data,
            pretty,
        } => {
            let options = CheckOptions {
                source: expression,
                data: read_data(data)?,
                pretty,
            };
            Ok(cli::eval_expression(&engine, &options)?.render(pretty))
        }
        Commands::Run { script, data, pretty } => {
            let options = CheckOptions {
                source: script,
                data,
                pretty,
            };
            Ok(cli::run_script(&mut engine, &options)?.render(pretty))
        }
        Commands::Template { text, data, pattern } => {
            let options = CheckOptions {
                source: text,
                data: read_data(data)?,
                pretty: false,
            };
            Ok(cli::render_template(&engine, &options, pattern.as_deref())?.render(false))
        }
        Commands::Check { script } => Ok(cli::check_syntax(&engine, &script)?.render(false)),
        Commands::Functions { name } => cli::get_function_docs(engine.functions(), name.as_deref()),
        Commands::Docs => Ok(cli::get_docs_overview().to_string()),
        Commands::Doc { category } => cli::get_doc_category(&category).map(str::to_string),
    }
}
