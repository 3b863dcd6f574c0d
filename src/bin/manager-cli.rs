use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "manager-cli")]
#[command(about = "Command-line client for the ZBProxy management API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// API key, when the manager has one configured.
    #[arg(short, long, env = "ZBPROXY_MANAGER_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show process state, PID, uptime and resource usage
    Status,
    /// Start ZBProxy
    Start,
    /// Stop ZBProxy
    Stop,
    /// Restart ZBProxy
    Restart,
    /// Print the whole configuration, or one value (e.g. Services.0.Listen)
    Config { path: Option<String> },
    /// Set a configuration value; VALUE is parsed as JSON, falling back to a string
    Set { path: String, value: String },
    /// Print the last lines of a log file
    Tail {
        file: String,
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Reset the executable's permissions to 755
    FixPermissions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))?,
        );
    }

    let base = cli.url.trim_end_matches('/');
    let request = |method: Method, path: &str| -> RequestBuilder {
        client
            .request(method, format!("{}{}", base, path))
            .headers(headers.clone())
    };

    let builder = match cli.command {
        Commands::Status => request(Method::GET, "/status"),
        Commands::Start => request(Method::POST, "/start"),
        Commands::Stop => request(Method::POST, "/stop"),
        Commands::Restart => request(Method::POST, "/restart"),
        Commands::Config { path: None } => request(Method::GET, "/config"),
        Commands::Config { path: Some(path) } => {
            request(Method::GET, &format!("/config/{}", path))
        }
        Commands::Set { path, value } => {
            let value: Value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            request(Method::PUT, "/config").json(&json!({ "path": path, "value": value }))
        }
        Commands::Tail { file, lines } => {
            let builder = request(Method::GET, &format!("/logs/tail/{}", file));
            match lines {
                Some(n) => builder.query(&[("lines", n)]),
                None => builder,
            }
        }
        Commands::FixPermissions => request(Method::POST, "/fix-permissions"),
    };

    let ok = print_response(builder.send().await?).await?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: manager returned status {}", status);
        let text = res.text().await.unwrap_or_default();
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => match body.get("detail").and_then(Value::as_str) {
                Some(detail) => eprintln!("{}", detail),
                None => eprintln!("{}", body),
            },
            Err(_) if !text.is_empty() => eprintln!("Response: {}", text),
            Err(_) => {}
        }
        return Ok(false);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(json.get("success").and_then(Value::as_bool).unwrap_or(true))
}
