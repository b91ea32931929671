use physiocase::{cli, logger, ui};

#[tokio::main]
async fn main() {
    // A missing .env file is fine; keys may come from the real environment
    let _ = dotenvy::dotenv();

    if let Err(e) = logger::init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = cli::main().await {
        ui::print_error(&format!("Error: {e:#}"));
        std::process::exit(1);
    }
}
