#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    price_tracker_lib::run().await
}
