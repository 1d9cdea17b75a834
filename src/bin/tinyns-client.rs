//! tinyns client
//!
//! Sends one query to a tinyns server and prints what comes back.

use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use tinyns::dns::client::{render_response, response_to_json, ClientError, DnsNetworkClient};
use tinyns::dns::protocol::QueryType;

/// Query a tinyns server once
#[derive(Parser)]
#[command(name = "tinyns-client")]
#[command(version)]
#[command(about = "Send a single query to a tinyns server", long_about = None)]
struct Cli {
    /// Server port
    port: u16,

    /// Name to look up
    name: String,

    /// Record type (A, NS or CNAME)
    qtype: QueryType,

    /// Seconds to wait for the response
    timeout: u64,

    /// Server address
    #[arg(short = 'H', long, env = "TINYNS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(ValueEnum, Clone)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(e) = simple_logger::init_with_level(log::Level::Warn) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = Cli::parse();

    let client = match DnsNetworkClient::new(Duration::from_secs(cli.timeout)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            process::exit(1);
        }
    };

    let response = match client.send_query(&cli.name, cli.qtype, (cli.host.as_str(), cli.port)) {
        Ok(response) => response,
        Err(ClientError::TimeOut) => {
            println!("timed out");
            return;
        }
        Err(e) => {
            eprintln!("Query failed: {}", e);
            process::exit(1);
        }
    };

    match cli.output {
        OutputFormat::Text => print!("{}", render_response(&response)),
        OutputFormat::Json => match response_to_json(&response) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize response: {}", e);
                process::exit(1);
            }
        },
    }
}
