use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Management CLI for the channel router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:10090")]
    url: String,

    #[arg(short, long, env = "ROUTER_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show router version and configured scopes
    Status,
    /// Show channels, in-flight counts and queue length of a scope
    State { scope: String },
    /// Show the health record of a channel
    Health { scope: String, channel: String },
    /// Clear quarantine and backoff of a channel
    Reset { scope: String, channel: String },
}

impl Commands {
    fn request(&self) -> (Method, String) {
        match self {
            Commands::Status => (Method::GET, "/admin/status".to_string()),
            Commands::State { scope } => (Method::GET, format!("/admin/scopes/{}", scope)),
            Commands::Health { scope, channel } => (
                Method::GET,
                format!("/admin/scopes/{}/channels/{}/health", scope, channel),
            ),
            Commands::Reset { scope, channel } => (
                Method::POST,
                format!("/admin/scopes/{}/channels/{}/health/reset", scope, channel),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path) = cli.command.request();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
