#![allow(async_fn_in_trait)]

mod args;
mod cmd;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cmd::run().await
}
