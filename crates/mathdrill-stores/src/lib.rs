//! mathdrill-stores — Store backends for the question cache, attempt
//! history, leaderboards and user directory.
//!
//! In-memory implementations of every store trait, a SQLite attempt history,
//! and a fault-injecting wrapper for exercising degraded paths.

pub mod memory;
pub mod mock;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{Context, Result};

use mathdrill_core::config::{DrillConfig, HistoryConfig};
use mathdrill_core::generator::ProblemGenerator;
use mathdrill_core::ledger::ScoreLedger;
use mathdrill_core::service::DrillService;
use mathdrill_core::traits::{HistoryStore, QuestionCache, RankStore, UserDirectory};

pub use memory::{MemoryHistoryStore, MemoryQuestionCache, MemoryRankStore, StaticUserDirectory};
pub use mock::Faulty;
pub use sqlite::SqliteHistoryStore;

/// Create the history store selected by configuration.
pub fn create_history_store(config: &HistoryConfig) -> Result<Arc<dyn HistoryStore>> {
    match config {
        HistoryConfig::Memory => Ok(Arc::new(MemoryHistoryStore::new())),
        HistoryConfig::Sqlite { path } => {
            let store = SqliteHistoryStore::open(path)
                .with_context(|| format!("failed to open history at {}", path.display()))?;
            tracing::debug!("history stored in {}", path.display());
            Ok(Arc::new(store))
        }
    }
}

/// The four stores a drill service runs against.
#[derive(Clone)]
pub struct Stores {
    pub cache: Arc<dyn QuestionCache>,
    pub history: Arc<dyn HistoryStore>,
    pub ranks: Arc<dyn RankStore>,
    pub directory: Arc<dyn UserDirectory>,
}

impl Stores {
    /// Everything in memory with an empty user directory.
    pub fn in_memory() -> Self {
        Self {
            cache: Arc::new(MemoryQuestionCache::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            ranks: Arc::new(MemoryRankStore::new()),
            directory: Arc::new(StaticUserDirectory::new()),
        }
    }

    /// In-memory stores, with history taken from configuration.
    pub fn from_config(config: &DrillConfig) -> Result<Self> {
        Ok(Self {
            history: create_history_store(&config.history)?,
            ..Self::in_memory()
        })
    }

    /// Wire a generator, ledger and service over these stores.
    pub fn into_service(self, config: &DrillConfig) -> Result<DrillService> {
        let generator = ProblemGenerator::new(config.generator.clone())
            .context("invalid generator configuration")?;
        let ledger = ScoreLedger::new(
            Arc::clone(&self.ranks),
            Arc::clone(&self.history),
            config.ledger.clone(),
        )
        .context("invalid ledger configuration")?;

        Ok(DrillService::new(
            generator,
            self.cache,
            self.history,
            Arc::new(ledger),
            self.directory,
            config.service.clone(),
        ))
    }
}
