// src/storage/mod.rs
use crate::config::UserSettings;
use crate::core::operations::TradingOperation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub operations: Vec<TradingOperation>,
    #[serde(default)]
    pub settings: UserSettings,
}

/// Whole-state JSON file, rewritten after every mutation.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// None when no state has been written yet.
    pub async fn load(&self) -> Result<Option<PersistedState>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let state: PersistedState = serde_json::from_str(&data)
            .with_context(|| format!("Corrupt state file {}", self.path.display()))?;
        info!(
            "Restored {} operations from {}",
            state.operations.len(),
            self.path.display()
        );
        Ok(Some(state))
    }

    /// Writes to a sibling temp file and renames it over the target.
    pub async fn save(&self, state: &PersistedState) -> Result<()> {
        let data = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            error!("Failed to replace state file: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operations::OperationBook;
    use crate::types::{Direction, DurationEstimate, ScalpingPlan};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn temp_store() -> StateStore {
        let path = std::env::temp_dir().join(format!("scalp_planner_{}.json", uuid::Uuid::new_v4()));
        StateStore::new(path)
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let store = temp_store();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = temp_store();
        let plan = ScalpingPlan {
            symbol: "LINKUSDT".to_string(),
            direction: Direction::Short,
            entry_price: dec!(26.8),
            exit_price: dec!(26.666),
            stop_loss: dec!(26.8804),
            leverage: 15,
            investment: dec!(40),
            target_profit_percent: dec!(0.5),
            stop_loss_percent: dec!(0.3),
            expected_profit: dec!(3),
            risk_reward: dec!(1.67),
            duration: DurationEstimate::Slow,
            success_rate: dec!(64),
            fees: dec!(0.48),
            net_profit: dec!(2.52),
            funding_cost: Decimal::ZERO,
        };
        let mut book = OperationBook::default();
        let id = book.add(&plan, "SHORT bias".into(), Utc::now());
        book.start(&id, Utc::now()).unwrap();

        let state = PersistedState {
            operations: book.all().to_vec(),
            settings: UserSettings {
                initial_capital: dec!(2500),
                ..UserSettings::default()
            },
        };
        store.save(&state).await.unwrap();

        let restored = store.load().await.unwrap().unwrap();
        assert_eq!(restored, state);
        tokio::fs::remove_file(store.path()).await.ok();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let store = temp_store();
        tokio::fs::write(store.path(), "{not json").await.unwrap();
        assert!(store.load().await.is_err());
        tokio::fs::remove_file(store.path()).await.ok();
    }
}
