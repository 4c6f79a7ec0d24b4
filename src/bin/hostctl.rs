use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "hostctl")]
#[command(about = "Command line client for the hostd API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "https://localhost:8443")]
    url: String,

    /// Session token from `login` or `register`.
    #[arg(short, long, env = "HOSTD_TOKEN")]
    token: Option<String>,

    /// Accept self-signed daemon certificates.
    #[arg(long)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the administrator account (bootstrap only)
    Register { username: String, password: String },
    /// Open a session and print its token
    Login { username: String, password: String },
    /// Finish bootstrap and switch the daemon to normal mode
    Init,
    /// Show daemon version and mode
    Info,
    /// List every resource on the host
    Resources,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(cli.insecure)
        .build()?;

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
    }

    let request = match &cli.command {
        Commands::Register { username, password } => client
            .post(format!("{}/api/v1/auth/register", cli.url))
            .json(&json!({ "username": username, "password": password })),
        Commands::Login { username, password } => client
            .post(format!("{}/api/v1/auth/login", cli.url))
            .json(&json!({ "username": username, "password": password })),
        Commands::Init => client.post(format!("{}/api/v1/e/init", cli.url)),
        Commands::Info => client.get(format!("{}/api/v1/e/info", cli.url)),
        Commands::Resources => client.get(format!("{}/api/v1/e/resources", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: hostd returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
