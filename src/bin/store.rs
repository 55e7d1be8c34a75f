//! Development message store
//!
//! Serves an in-memory store on `STARTSMART_STORE_ADDR` (default
//! `127.0.0.1:5000`). Tokens are registered from `STARTSMART_DEV_TOKENS`,
//! formatted as `token=user,token=user`.

use anyhow::Context;
use startsmart_chat::{server::StoreServer, store::MemoryStore};
use std::net::SocketAddr;

/// Parse `token=user` pairs, skipping malformed entries
fn parse_tokens(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (token, user) = pair.split_once('=')?;
            let (token, user) = (token.trim(), user.trim());
            (!token.is_empty() && !user.is_empty()).then(|| (token.to_string(), user.to_string()))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    startsmart_chat::init();

    let addr: SocketAddr = std::env::var("STARTSMART_STORE_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
        .parse()
        .context("Invalid STARTSMART_STORE_ADDR")?;

    let store = MemoryStore::new();
    let tokens = std::env::var("STARTSMART_DEV_TOKENS").unwrap_or_default();
    let tokens = parse_tokens(&tokens);
    if tokens.is_empty() {
        tracing::warn!("No tokens registered; every request will be rejected");
    }
    for (token, user) in &tokens {
        store.register_token(token, user).await;
    }

    let mut server = StoreServer::new(store);
    let bound = server.start(addr).await?;
    tracing::info!("Development store ready at http://{}", bound);

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    Ok(())
}
