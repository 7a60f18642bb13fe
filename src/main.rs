// RawCom - Paced raw command sender for networked and serial devices
use clap::Parser;
use rawcom::cli::{execute_command, Args};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = execute_command(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
