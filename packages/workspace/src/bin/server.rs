use std::path::PathBuf;
use std::sync::Arc;

use codraft_store::{DocumentStore, FsDocumentStore};
use codraft_workspace::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let mut port: u16 = 3030;
    let mut data_dir = std::env::current_dir()?.join("data");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().expect("Invalid port number");
                    i += 2;
                } else {
                    eprintln!("--port requires a value");
                    std::process::exit(1);
                }
            }
            "--data-dir" => {
                if i + 1 < args.len() {
                    data_dir = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("--data-dir requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("Usage: codraft-server [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>       Port to listen on (default: 3030)");
                println!("  --data-dir <DIR>        Document store directory (default: ./data)");
                println!("  -h, --help              Show this help message");
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                std::process::exit(1);
            }
        }
    }

    println!("Starting Codraft sync server...");
    println!("Data directory: {:?}", data_dir);
    println!("Listening on 127.0.0.1:{}", port);

    let store: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::open(&data_dir)?);
    let state = Arc::new(AppState::new(store));
    let app = router(state);

    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("sync server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
