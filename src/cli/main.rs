use clap::{Parser, Subcommand};
use reqwest::Client;
use std::error::Error;

#[derive(Parser)]
#[command(name = "correlator-cli")]
#[command(about = "Telemetry correlator CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correlate a firing alert
    Correlate {
        #[arg(value_name = "ALERT_NAME")]
        alertname: String,

        /// Pivot through an exemplar into traces, logs and profiles
        #[arg(short = 'x', long)]
        exemplar: bool,
    },

    /// Recognize a backend UI URL
    Recognize {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    let request = match cli.command {
        Commands::Correlate {
            alertname,
            exemplar,
        } => client
            .get(format!("{}/v1/correlate", cli.endpoint))
            .query(&[("alertname", alertname), ("exemplar", exemplar.to_string())]),

        Commands::Recognize { url } => client
            .get(format!("{}/v1/recognize", cli.endpoint))
            .query(&[("url", url)]),

        Commands::Health => client.get(format!("{}/health", cli.endpoint)),
    };

    let response = request.send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
