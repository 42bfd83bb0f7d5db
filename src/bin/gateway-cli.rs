use clap::{Parser, Subcommand};
use serde_json::Value;
use url::Url;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client CLI for the request gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show breaker state per service
    Health,
    /// Call a method on a service and print the reply
    Call {
        service: String,
        method: String,
        /// Payload sent as the request body
        #[arg(short, long, default_value = "")]
        data: String,
    },
}

/// `{base}/{service}/{method}` with both names escaped as single path segments.
fn call_url(base: &str, service: &str, method: &str) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("gateway url '{base}' cannot take a path"))?
        .pop_if_empty()
        .extend([service, method]);
    Ok(url)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{base}/healthz")).send().await?;
            let status = res.status();
            let json: Value = res.json().await?;
            if !status.is_success() {
                eprintln!("Error: gateway returned status {status}");
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Call { service, method, data } => {
            let res = client
                .post(call_url(&cli.url, &service, &method)?)
                .body(data)
                .send()
                .await?;
            let status = res.status();
            let body = res.bytes().await?;
            if status.is_success() {
                println!("{}", String::from_utf8_lossy(&body));
            } else {
                eprintln!("Error: gateway returned status {status}");
                eprintln!("Response: {}", String::from_utf8_lossy(&body));
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
