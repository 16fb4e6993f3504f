pub mod cache;
pub mod loader;
pub mod schema;

pub use cache::ConfigCache;
pub use loader::{find_chain_for_merchant, load_store_config, ConfigError};
pub use schema::{
    CheckRules, HeaderRules, Identification, ItemRules, ItemsStartRule, Markers, SkewRules,
    StoreConfig, WashRules,
};
