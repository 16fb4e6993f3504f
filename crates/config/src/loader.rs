use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::schema::StoreConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no config for chain '{0}'")]
    UnknownChain(String),
}

/// Load `<dir>/<chain_id>.toml`. The file's own `chain_id` field wins;
/// when absent the filename stem is used.
pub fn load_store_config(dir: &Path, chain_id: &str) -> Result<StoreConfig, ConfigError> {
    let path = dir.join(format!("{chain_id}.toml"));
    if !path.is_file() {
        return Err(ConfigError::UnknownChain(chain_id.to_string()));
    }
    let text = fs::read_to_string(&path)?;
    let mut cfg: StoreConfig = toml::from_str(&text)?;
    if cfg.chain_id.is_empty() {
        cfg.chain_id = chain_id.to_string();
    }
    debug!(chain_id = %cfg.chain_id, path = %path.display(), "loaded store config");
    Ok(cfg)
}

/// Scan the config directory for a chain whose identification matches the
/// merchant text. Returns the chain id (filename stem). Malformed files
/// are skipped, not fatal.
pub fn find_chain_for_merchant(dir: &Path, merchant: &str) -> Option<String> {
    if merchant.trim().is_empty() {
        return None;
    }
    let mut paths: Vec<_> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(cfg) = toml::from_str::<StoreConfig>(&text) else {
            debug!(path = %path.display(), "skipping malformed store config");
            continue;
        };
        if cfg.identification.matches(merchant) {
            let stem = path.file_stem()?.to_string_lossy().to_string();
            return Some(stem);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, name: &str, body: &str) {
        let mut f = fs::File::create(dir.join(format!("{name}.toml"))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn load_by_chain_id() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "tnt_supermarket_us",
            r#"
[identification]
primary_name = "T&T Supermarket US"
"#,
        );
        let cfg = load_store_config(dir.path(), "tnt_supermarket_us").unwrap();
        // chain_id defaults to the filename stem.
        assert_eq!(cfg.chain_id, "tnt_supermarket_us");
    }

    #[test]
    fn missing_chain_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_store_config(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownChain(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "broken", "chain_id = [not toml");
        let err = load_store_config(dir.path(), "broken").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn merchant_lookup_matches_alias() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "tnt_supermarket_us",
            r#"
[identification]
primary_name = "T&T Supermarket US"
aliases = ["T AND T"]
"#,
        );
        write_config(
            dir.path(),
            "islandmart",
            r#"
[identification]
primary_name = "Island Gourmet Markets"
"#,
        );
        assert_eq!(
            find_chain_for_merchant(dir.path(), "T AND T SUPERMARKET #23"),
            Some("tnt_supermarket_us".to_string())
        );
        assert_eq!(
            find_chain_for_merchant(dir.path(), "ISLAND GOURMET MARKETS"),
            Some("islandmart".to_string())
        );
        assert_eq!(find_chain_for_merchant(dir.path(), "SAFEWAY"), None);
        assert_eq!(find_chain_for_merchant(dir.path(), ""), None);
    }
}
