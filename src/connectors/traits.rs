use crate::types::{AssetQuote, PriceTick, TechnicalSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Any source of a full market snapshot. Implementations are interchangeable;
/// the planner never cares which one produced the quotes.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_quotes(&self) -> Result<Vec<AssetQuote>>;
}

#[async_trait]
pub trait TechnicalSource: Send + Sync {
    async fn snapshot(&self, symbol: &str) -> Result<TechnicalSnapshot>;
}

/// Hosted text generator. Fails closed on quota, timeout or transport errors.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, prompt: &str) -> Result<String>;
}

/// Live trade stream. The returned task runs until the connection drops or
/// the handle is aborted.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn subscribe_ticker(
        &self,
        symbol: &str,
        sender: mpsc::Sender<PriceTick>,
    ) -> Result<JoinHandle<()>>;
}
