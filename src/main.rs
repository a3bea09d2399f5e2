use log_tail::{FollowConfig, follow};
use std::env;
use std::process;
use tokio_stream::StreamExt;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Splits `argv` into the followed path and the startup timeout in seconds.
fn parse_args<I: IntoIterator<Item = String>>(argv: I) -> Result<(String, u64), String> {
    let mut argv = argv.into_iter();
    let program = argv.next().unwrap_or_else(|| "log-tail".to_string());
    let rest: Vec<String> = argv.collect();

    if rest.is_empty() || rest.len() > 2 {
        return Err(format!(
            "Usage: {} <file_path> [startup_timeout_secs]",
            program
        ));
    }

    let timeout_secs = match rest.get(1) {
        None => 0,
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| format!("Invalid startup timeout '{}': {}", raw, e))?,
    };
    Ok((rest[0].clone(), timeout_secs))
}

#[tokio::main]
async fn main() {
    init_tracing();

    let (file_path, timeout_secs) = match parse_args(env::args()) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(1);
        }
    };

    match follow(&file_path, FollowConfig::new(timeout_secs)).await {
        Ok(mut lines) => {
            while let Some(line_result) = lines.next().await {
                match line_result {
                    Ok(line) => println!("{}", line),
                    Err(e) => {
                        eprintln!("Error following file: {}", e);
                        process::exit(1);
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("Error opening {}: {}", file_path, e);
            process::exit(1);
        }
    }
}
