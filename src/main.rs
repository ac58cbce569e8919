#[tokio::main]
async fn main() {
    if let Err(e) = kidneycare_lib::run().await {
        eprintln!("kidneycare: {e}");
        std::process::exit(1);
    }
}
