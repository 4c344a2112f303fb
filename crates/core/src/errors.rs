use thiserror::Error;

/// Unified error type for the entire stock-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage / File ──────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No price provider registered")]
    NoProvider,

    #[error("Price not available for {symbol}")]
    PriceNotAvailable { symbol: String },

    #[error("Price lookup for {symbol} timed out after {seconds}s")]
    Timeout { symbol: String, seconds: u64 },

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Portfolio already exists: {0}")]
    PortfolioExists(String),

    #[error("Ticker {ticker} already exists in portfolio '{portfolio}'")]
    DuplicateTicker { portfolio: String, ticker: String },

    #[error("Holding index {index} out of range (portfolio has {len} holdings)")]
    HoldingIndexOutOfRange { index: usize, len: usize },

    #[error("Holding not found: {0}")]
    HoldingNotFound(String),

    // ── Undo / Redo ─────────────────────────────────────────────────
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    // ── Runtime ─────────────────────────────────────────────────────
    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),
}

impl CoreError {
    /// Whether this error came from the market-data side (network, provider,
    /// timeout). The fetcher absorbs these into an absent price.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            CoreError::Api { .. }
                | CoreError::Network(_)
                | CoreError::NoProvider
                | CoreError::PriceNotAvailable { .. }
                | CoreError::Timeout { .. }
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL, including the apikey query parameter.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
