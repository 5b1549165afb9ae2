// 9.0 config.rs: all settings in one place. denomination, engine timing, fees,
// store backend, admins, and the creators to onboard at startup.
// 9.1 loaded from TOML, then KEYS_* environment variables override single fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::creator::Creator;
use crate::curve::CurveConfig;
use crate::engine::EngineConfig;
use crate::store::{LedgerStore, MemoryStore, SnapshotStore, StoreError};
use crate::types::{CreatorId, Denomination, SharePercent, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    // How long a trade waits for its creator's lock
    pub lock_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { lock_timeout_ms: 250 }
    }
}

/** 9.2: fee settings. buys always split their full notional; sells only split this fee */
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    // Percent of sell proceeds withheld and split. 0 = sells are fee free
    pub sell_fee_percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Snapshot,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "snapshot" => Ok(StoreBackend::Snapshot),
            other => Err(ConfigError::InvalidStore {
                reason: format!("unknown backend {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    // Snapshot file, only read for the snapshot backend
    pub snapshot_path: PathBuf,
    // Trade commits between snapshot writes
    pub snapshot_every: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            snapshot_path: PathBuf::from("data/ledger.json"),
            snapshot_every: 100,
        }
    }
}

/// A creator to onboard at startup, with prices in major units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorSeed {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub chat_room_name: Option<String>,
    #[serde(default)]
    pub chat_room_description: String,
    pub base_price: Decimal,
    pub price_increment: Decimal,
    #[serde(default)]
    pub max_supply: Option<u64>,
    pub revenue_share_percent: u8,
}

impl CreatorSeed {
    pub fn to_creator(&self, denomination: &Denomination) -> Result<Creator, ConfigError> {
        let to_minor = |field: &str, value: Decimal| {
            denomination
                .to_minor(value)
                .ok_or_else(|| ConfigError::InvalidCreator {
                    id: self.id.clone(),
                    reason: format!("{field} {value} is not representable in {}", denomination.symbol),
                })
        };
        let curve = CurveConfig::new(
            to_minor("base_price", self.base_price)?,
            to_minor("price_increment", self.price_increment)?,
            self.max_supply,
        );
        let share = SharePercent::new(self.revenue_share_percent).ok_or_else(|| {
            ConfigError::InvalidCreator {
                id: self.id.clone(),
                reason: format!("revenue share {} exceeds 100", self.revenue_share_percent),
            }
        })?;

        let mut creator = Creator::new(CreatorId::new(self.id.clone()), self.username.clone(), curve, share);
        if let Some(name) = &self.chat_room_name {
            creator = creator.with_room(name.clone(), self.chat_room_description.clone());
        } else {
            creator.chat_room_description = self.chat_room_description.clone();
        }
        creator.validate().map_err(|e| ConfigError::InvalidCreator {
            id: self.id.clone(),
            reason: e.to_string(),
        })?;
        Ok(creator)
    }
}

// The complete configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub denomination: Denomination,
    pub engine: EngineSettings,
    pub fees: FeeConfig,
    pub store: StoreConfig,
    pub admins: Vec<String>,
    pub creators: Vec<CreatorSeed>,
}

impl Config {
    // Local preset: in-memory store, one admin, the three demo creators
    pub fn development() -> Self {
        let seed = |id: &str, username: &str, room: &str, description: &str, base: Decimal, inc: Decimal, share: u8| {
            CreatorSeed {
                id: id.to_string(),
                username: username.to_string(),
                chat_room_name: Some(room.to_string()),
                chat_room_description: description.to_string(),
                base_price: base,
                price_increment: inc,
                max_supply: None,
                revenue_share_percent: share,
            }
        };

        Self {
            admins: vec!["admin".to_string()],
            creators: vec![
                seed(
                    "1",
                    "techguru",
                    "Tech Innovation Hub",
                    "Discussions about cutting-edge technology, startups, and innovation trends.",
                    Decimal::new(1, 3),  // 0.001
                    Decimal::new(1, 4),  // 0.0001
                    10,
                ),
                seed(
                    "2",
                    "cryptowhale",
                    "Crypto Alpha Group",
                    "Exclusive insights on DeFi, NFTs, and emerging crypto opportunities.",
                    Decimal::new(5, 3),  // 0.005
                    Decimal::new(5, 4),  // 0.0005
                    15,
                ),
                seed(
                    "3",
                    "designpro",
                    "Design & UX Collective",
                    "A community for designers to share work, get feedback, and discuss trends.",
                    Decimal::new(2, 3),  // 0.002
                    Decimal::new(2, 4),  // 0.0002
                    12,
                ),
            ],
            ..Self::default()
        }
    }

    // Durable preset: snapshot after every commit, longer lock wait
    pub fn production() -> Self {
        let mut config = Self::default();
        config.store.backend = StoreBackend::Snapshot;
        config.store.snapshot_every = 1;
        config.engine.lock_timeout_ms = 1_000;
        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Defaults with any `KEYS_*` variables applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    // 9.3: overrides read through `lookup` so tests don't touch the process env
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::Env {
                key: key.to_string(),
                value: value.to_string(),
            })
        }

        if let Some(v) = lookup("KEYS_LOCK_TIMEOUT_MS") {
            self.engine.lock_timeout_ms = parse("KEYS_LOCK_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("KEYS_SELL_FEE_PERCENT") {
            self.fees.sell_fee_percent = parse("KEYS_SELL_FEE_PERCENT", &v)?;
        }
        if let Some(v) = lookup("KEYS_STORE") {
            self.store.backend = v.parse()?;
        }
        if let Some(v) = lookup("KEYS_SNAPSHOT_PATH") {
            self.store.snapshot_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KEYS_SNAPSHOT_EVERY") {
            self.store.snapshot_every = parse("KEYS_SNAPSHOT_EVERY", &v)?;
        }
        if let Some(v) = lookup("KEYS_ADMINS") {
            self.admins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("KEYS_DENOMINATION_SYMBOL") {
            self.denomination.symbol = v;
        }
        if let Some(v) = lookup("KEYS_DENOMINATION_DECIMALS") {
            self.denomination.decimals = parse("KEYS_DENOMINATION_DECIMALS", &v)?;
        }
        Ok(())
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.denomination.decimals > Denomination::MAX_DECIMALS {
            return Err(ConfigError::InvalidDenomination {
                reason: format!(
                    "{} decimals, at most {} supported",
                    self.denomination.decimals,
                    Denomination::MAX_DECIMALS
                ),
            });
        }
        if self.denomination.symbol.trim().is_empty() {
            return Err(ConfigError::InvalidDenomination {
                reason: "symbol is empty".to_string(),
            });
        }

        if self.engine.lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "lock timeout must be positive".to_string(),
            });
        }

        if SharePercent::new(self.fees.sell_fee_percent).is_none() {
            return Err(ConfigError::InvalidFees {
                reason: format!("sell fee {}% exceeds 100%", self.fees.sell_fee_percent),
            });
        }

        if self.store.backend == StoreBackend::Snapshot {
            if self.store.snapshot_every == 0 {
                return Err(ConfigError::InvalidStore {
                    reason: "snapshot_every must be positive".to_string(),
                });
            }
            if self.store.snapshot_path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidStore {
                    reason: "snapshot path is empty".to_string(),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for seed in &self.creators {
            if !seen.insert(seed.id.as_str()) {
                return Err(ConfigError::InvalidCreator {
                    id: seed.id.clone(),
                    reason: "listed twice".to_string(),
                });
            }
            seed.to_creator(&self.denomination)?;
        }

        Ok(())
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let sell_fee = SharePercent::new(self.fees.sell_fee_percent).ok_or_else(|| ConfigError::InvalidFees {
            reason: format!("sell fee {}% exceeds 100%", self.fees.sell_fee_percent),
        })?;
        Ok(EngineConfig {
            lock_timeout: Duration::from_millis(self.engine.lock_timeout_ms),
            sell_fee,
            admins: self.admins.iter().map(|a| UserId::new(a.clone())).collect(),
            denomination: self.denomination.clone(),
        })
    }

    pub fn open_store(&self) -> Result<Arc<dyn LedgerStore>, ConfigError> {
        Ok(match self.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Snapshot => Arc::new(SnapshotStore::open(
                &self.store.snapshot_path,
                self.store.snapshot_every,
            )?),
        })
    }

    pub fn seed_creators(&self) -> Result<Vec<Creator>, ConfigError> {
        self.creators
            .iter()
            .map(|seed| seed.to_creator(&self.denomination))
            .collect()
    }
}

// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Cannot parse config: {0}")]
    Parse(String),

    #[error("Bad value for {key}: {value:?}")]
    Env { key: String, value: String },

    #[error("Invalid denomination: {reason}")]
    InvalidDenomination { reason: String },

    #[error("Invalid engine settings: {reason}")]
    InvalidEngine { reason: String },

    #[error("Invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("Invalid store settings: {reason}")]
    InvalidStore { reason: String },

    #[error("Invalid creator {id}: {reason}")]
    InvalidCreator { id: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
