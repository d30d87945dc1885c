//! ASCII Art CLI - Invocation harness
//!
//! Commands: invoke, resolve
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when the pipeline reports a failure

use std::io::Read;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use asciiart_core::{
    logging::init_logging, options::resolve_with, Config, InvocationRequest, RenderOptions,
    S3Pipeline,
};

#[derive(Parser)]
#[command(name = "asciiart-cli")]
#[command(about = "ASCII Art CLI - fetch, render and publish a stored image")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one invocation against the configured store
    Invoke {
        /// JSON payload (InvocationRequest); read from stdin when omitted
        #[arg(short, long)]
        payload: Option<String>,

        /// Also report `ok` and `error_kind`
        #[arg(long)]
        detailed: bool,
    },

    /// Show the options a payload resolves to, without any I/O
    Resolve {
        /// JSON payload (InvocationRequest); read from stdin when omitted
        #[arg(short, long)]
        payload: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", serde_json::json!({ "error": format!("Invalid configuration: {}", e) }));
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Invoke { payload, detailed } => {
            let request = match read_request(payload) {
                Ok(r) => r,
                Err(e) => {
                    println!("{}", serde_json::json!({ "body": format!("Invalid payload: {}", e) }));
                    return ExitCode::FAILURE;
                }
            };

            let pipeline = S3Pipeline::from_config(&config);
            let outcome = pipeline.handle_detailed(&request);
            let ok = outcome.ok;

            let printed = if detailed {
                serde_json::to_string_pretty(&outcome)
            } else {
                serde_json::to_string_pretty(&asciiart_core::InvocationResult::from(outcome))
            };
            match printed {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
                    return ExitCode::FAILURE;
                }
            }

            if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Resolve { payload } => {
            let request = match read_request(payload) {
                Ok(r) => r,
                Err(e) => {
                    println!("{}", serde_json::json!({ "error": format!("Invalid payload: {}", e) }));
                    return ExitCode::FAILURE;
                }
            };

            let defaults = RenderOptions::staged_in(&config.staging.dir);
            match resolve_with(&request, &defaults) {
                Ok(resolved) => match serde_json::to_string_pretty(&resolved) {
                    Ok(text) => {
                        println!("{}", text);
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
                        ExitCode::FAILURE
                    }
                },
                Err(e) => {
                    let output = serde_json::json!({
                        "error": e.to_string(),
                        "error_kind": e.kind(),
                    });
                    println!("{}", output);
                    ExitCode::from(2)
                }
            }
        }
    }
}

fn read_request(payload: Option<String>) -> Result<InvocationRequest, String> {
    let raw = match payload {
        Some(p) => p,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| e.to_string())?;
            buf
        }
    };
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}
