mod app;
mod gateway;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
