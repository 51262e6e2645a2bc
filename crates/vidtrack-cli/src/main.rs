//! Thin entrypoint for the `vidtrack` command-line client.

#[tokio::main]
async fn main() {
    let code = vidtrack_cli::run().await;
    std::process::exit(code);
}
