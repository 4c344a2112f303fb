use std::path::Path;

use chrono::Duration;
use tracing::{error, info, warn};

use crate::errors::CoreError;
use crate::models::portfolio::PortfolioBook;
use crate::models::price::PriceCache;

use super::format;

/// Where a save ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written to the primary file.
    Primary,
    /// The primary write failed; the book was written to the backup file instead.
    EmergencyBackup,
}

/// High-level storage operations: portfolios and the price cache as JSON files.
///
/// Loading never fails outright: a corrupt or missing primary file falls
/// back to the backup, then to an empty book. A missing or corrupt cache
/// file is a cold cache.
pub struct StorageManager;

impl StorageManager {
    /// Read and validate one portfolio file.
    pub fn read_portfolios(path: &Path) -> Result<PortfolioBook, CoreError> {
        let json = std::fs::read_to_string(path)?;
        format::decode_portfolios(&json)
    }

    /// Load portfolios: primary → backup → empty.
    pub fn load_portfolios(primary: &Path, backup: &Path) -> PortfolioBook {
        match Self::read_portfolios(primary) {
            Ok(book) => {
                info!(path = %primary.display(), portfolios = book.len(), "Loaded portfolios");
                return book;
            }
            Err(CoreError::FileIO(e)) if !primary.exists() => {
                info!(path = %primary.display(), reason = %e, "No portfolio file yet");
            }
            Err(e) => {
                error!(path = %primary.display(), error = %e, "Error loading portfolios");
            }
        }

        if backup.exists() {
            warn!(path = %backup.display(), "Attempting to load backup");
            match Self::read_portfolios(backup) {
                Ok(book) => {
                    info!(path = %backup.display(), portfolios = book.len(), "Loaded portfolios from backup");
                    return book;
                }
                Err(e) => error!(path = %backup.display(), error = %e, "Error loading backup"),
            }
        }

        PortfolioBook::new()
    }

    pub fn write_portfolios(book: &PortfolioBook, path: &Path) -> Result<(), CoreError> {
        let json = format::encode_portfolios(book)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Save to the primary file, falling back to an emergency write of the backup.
    pub fn save_portfolios(
        book: &PortfolioBook,
        primary: &Path,
        backup: &Path,
    ) -> Result<SaveOutcome, CoreError> {
        match Self::write_portfolios(book, primary) {
            Ok(()) => Ok(SaveOutcome::Primary),
            Err(e) => {
                error!(path = %primary.display(), error = %e, "Error saving portfolios");
                Self::emergency_save(book, backup)?;
                Ok(SaveOutcome::EmergencyBackup)
            }
        }
    }

    /// Write the book to the backup file.
    pub fn emergency_save(book: &PortfolioBook, backup: &Path) -> Result<(), CoreError> {
        match Self::write_portfolios(book, backup) {
            Ok(()) => {
                warn!(path = %backup.display(), "Emergency backup saved");
                Ok(())
            }
            Err(e) => {
                error!(path = %backup.display(), error = %e, "Error during emergency save");
                Err(e)
            }
        }
    }

    /// Load the price cache; any failure yields an empty cache.
    pub fn load_cache(path: &Path, ttl: Duration) -> PriceCache {
        if !path.exists() {
            return PriceCache::new(ttl);
        }
        let loaded = std::fs::read_to_string(path)
            .map_err(CoreError::from)
            .and_then(|json| format::decode_cache(&json, ttl));

        match loaded {
            Ok(cache) => {
                info!(path = %path.display(), entries = cache.len(), "Loaded price cache");
                cache
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error loading price cache, starting cold");
                PriceCache::new(ttl)
            }
        }
    }

    /// Save the price cache. Returns whether the write succeeded; failures are only logged.
    pub fn persist_cache(cache: &PriceCache, path: &Path) -> bool {
        let result = format::encode_cache(cache).and_then(|json| {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)?;
            Ok(())
        });

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error saving price cache");
                false
            }
        }
    }
}
