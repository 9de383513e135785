use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the quota gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List client quotas
    Clients,
    /// Create a client quota
    Create {
        client_id: String,
        #[arg(long)]
        capacity: Option<i64>,
        #[arg(long)]
        rate_per_sec: Option<i64>,
    },
    /// Update a client quota
    Update {
        client_id: String,
        #[arg(long)]
        capacity: i64,
        #[arg(long)]
        rate_per_sec: i64,
    },
    /// Delete a client quota
    Delete { client_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Clients => {
            let res = client.get(format!("{}/clients", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Create {
            client_id,
            capacity,
            rate_per_sec,
        } => {
            let mut body = json!({ "client_id": client_id });
            if let Some(capacity) = capacity {
                body["capacity"] = json!(capacity);
            }
            if let Some(rate) = rate_per_sec {
                body["rate_per_sec"] = json!(rate);
            }
            let res = client
                .post(format!("{}/clients", cli.url))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Update {
            client_id,
            capacity,
            rate_per_sec,
        } => {
            let res = client
                .put(format!("{}/clients/{}", cli.url, client_id))
                .json(&json!({ "capacity": capacity, "rate_per_sec": rate_per_sec }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Delete { client_id } => {
            let res = client
                .delete(format!("{}/clients/{}", cli.url, client_id))
                .send()
                .await?;
            let status = res.status();
            if status.is_success() {
                println!("deleted");
            } else {
                eprintln!("Error: gateway returned status {}", status);
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
