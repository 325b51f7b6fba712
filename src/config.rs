//! Configuration for tablekv
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a [`TableAccessor`](crate::TableAccessor)
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Connection string of the target storage account
    ///
    /// Examples:
    ///   UseDevelopmentStorage=true
    ///   AccountName=dev;TableEndpoint=memory://dev
    ///   AccountName=dev;TableEndpoint=file:///var/lib/tablekv
    pub connection_string: String,

    /// Create tables on first reference instead of failing with TableNotFound
    pub auto_create_tables: bool,

    // -------------------------------------------------------------------------
    // Local Store Configuration (file:// endpoints)
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL size (in bytes) after which the store writes a snapshot and
    /// truncates the WAL
    pub checkpoint_threshold: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_string: "UseDevelopmentStorage=true".to_string(),
            auto_create_tables: true,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            checkpoint_threshold: 4 * 1024 * 1024, // 4 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the connection string
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.config.connection_string = connection_string.into();
        self
    }

    /// Create missing tables on first reference
    pub fn auto_create_tables(mut self, enabled: bool) -> Self {
        self.config.auto_create_tables = enabled;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the checkpoint threshold (in bytes of WAL)
    pub fn checkpoint_threshold(mut self, bytes: u64) -> Self {
        self.config.checkpoint_threshold = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
