#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stock::start_server().await
}
