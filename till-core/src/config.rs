//! Till runtime configuration
//!
//! All settings come from environment variables (a `.env` file is
//! honored if present) with working defaults, so a bare checkout runs
//! against the local cache and a noop printer.

/// Till configuration
///
/// | Environment variable | Default | Meaning |
/// |----------------------|---------|---------|
/// | TILL_WORK_DIR | ./data | directory for the local cache database |
/// | TILL_CACHE_FILE | till.redb | cache file name inside the work dir |
/// | TILL_DEFAULT_ZONE | Sala | zone assigned to unzoned tables |
/// | TILL_PRINT_RECEIPTS | true | render receipts on settlement |
#[derive(Debug, Clone)]
pub struct TillConfig {
    /// Directory holding the local cache database
    pub work_dir: String,
    /// Cache file name inside `work_dir`
    pub cache_file: String,
    /// Zone assigned to tables created without one
    pub default_zone: String,
    /// Whether settlement renders receipts
    pub print_receipts: bool,
}

impl TillConfig {
    /// Load configuration from the environment
    ///
    /// Unset variables fall back to defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            work_dir: std::env::var("TILL_WORK_DIR").unwrap_or_else(|_| "./data".into()),
            cache_file: std::env::var("TILL_CACHE_FILE").unwrap_or_else(|_| "till.redb".into()),
            default_zone: std::env::var("TILL_DEFAULT_ZONE").unwrap_or_else(|_| "Sala".into()),
            print_receipts: std::env::var("TILL_PRINT_RECEIPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }

    /// Full path of the cache database file
    pub fn cache_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.work_dir).join(&self.cache_file)
    }
}

impl Default for TillConfig {
    fn default() -> Self {
        Self {
            work_dir: "./data".into(),
            cache_file: "till.redb".into(),
            default_zone: "Sala".into(),
            print_receipts: true,
        }
    }
}
