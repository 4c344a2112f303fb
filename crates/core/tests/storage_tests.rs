// ═══════════════════════════════════════════════════════════════════
// Storage Tests — file format, StorageManager, cache persistence
// ═══════════════════════════════════════════════════════════════════

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use stock_tracker_core::errors::CoreError;
use stock_tracker_core::models::holding::{Holding, NewHolding};
use stock_tracker_core::models::portfolio::{Portfolio, PortfolioBook};
use stock_tracker_core::models::price::{PriceCache, PriceKey};
use stock_tracker_core::storage::format;
use stock_tracker_core::storage::manager::{SaveOutcome, StorageManager};

fn holding(ticker: &str, qty: f64, price: f64) -> Holding {
    Holding::new(NewHolding::new(
        format!("{ticker} Corp"),
        ticker,
        qty,
        price,
        NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
    ))
}

fn sample_book() -> PortfolioBook {
    let mut book = PortfolioBook::new();
    book.insert(
        Portfolio::from_holdings(
            "Long Term",
            vec![holding("INFY.NS", 10.0, 1500.0), holding("AAPL", 3.0, 170.0)],
        )
        .unwrap(),
    )
    .unwrap();
    book.insert(Portfolio::new("Empty")).unwrap();
    book
}

const RECORD: &str = r#"{
    "Stock Name": "Apple",
    "Ticker Symbol": "aapl",
    "Quantity": 2.0,
    "Purchase Price": 100.0,
    "Purchase Date": "2024-01-02",
    "Sector": "Tech",
    "Investment Value": 999.0
}"#;

// ═══════════════════════════════════════════════════════════════════
// Portfolio file format
// ═══════════════════════════════════════════════════════════════════

mod portfolio_format {
    use super::*;

    #[test]
    fn encode_then_decode_preserves_order_and_values() {
        let book = sample_book();
        let json = format::encode_portfolios(&book).unwrap();
        let decoded = format::decode_portfolios(&json).unwrap();
        assert_eq!(decoded, book);
        assert_eq!(
            decoded.get("Long Term").unwrap().tickers(),
            vec!["INFY.NS".to_string(), "AAPL".to_string()]
        );
    }

    #[test]
    fn file_uses_column_names() {
        let json = format::encode_portfolios(&sample_book()).unwrap();
        assert!(json.contains("\"Long Term\""));
        assert!(json.contains("\"Ticker Symbol\": \"INFY.NS\""));
        assert!(json.contains("\"Daily Return %\""));
    }

    #[test]
    fn decode_normalizes_and_recomputes() {
        let json = format!(r#"{{ "Main": [{RECORD}] }}"#);
        let book = format::decode_portfolios(&json).unwrap();
        let h = &book.get("Main").unwrap().holdings()[0];
        assert_eq!(h.ticker, "AAPL");
        assert_eq!(h.investment_value, 200.0);
    }

    #[test]
    fn duplicate_tickers_reject_the_file() {
        let json = format!(r#"{{ "Main": [{RECORD}, {RECORD}] }}"#);
        let err = format::decode_portfolios(&json).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFileFormat(ref m) if m.contains("AAPL")));
    }

    #[test]
    fn invalid_numbers_reject_the_file() {
        let negative = RECORD.replace("\"Quantity\": 2.0", "\"Quantity\": -2.0");
        let json = format!(r#"{{ "Main": [{negative}] }}"#);
        assert!(matches!(
            format::decode_portfolios(&json),
            Err(CoreError::InvalidFileFormat(_))
        ));

        let free = RECORD.replace("\"Purchase Price\": 100.0", "\"Purchase Price\": 0.0");
        let json = format!(r#"{{ "Main": [{free}] }}"#);
        assert!(format::decode_portfolios(&json).is_err());
    }

    #[test]
    fn overflowing_investment_rejects_the_file() {
        let huge = RECORD
            .replace("\"Quantity\": 2.0", "\"Quantity\": 1e200")
            .replace("\"Purchase Price\": 100.0", "\"Purchase Price\": 1e200");
        let json = format!(r#"{{ "Main": [{huge}] }}"#);
        assert!(matches!(
            format::decode_portfolios(&json),
            Err(CoreError::InvalidFileFormat(ref m)) if m.contains("out of range")
        ));
    }

    #[test]
    fn case_colliding_portfolio_names_reject_the_file() {
        let json = r#"{ "Main": [], "MAIN": [] }"#;
        assert!(matches!(
            format::decode_portfolios(json),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn day_first_purchase_dates_are_accepted() {
        let day_first = RECORD
            .replace("\"aapl\"", "\"MSFT\"")
            .replace("\"2024-01-02\"", "\"15-03-2023\"");
        let json = format!(r#"{{ "Main": [{RECORD}, {day_first}] }}"#);

        let book = format::decode_portfolios(&json).unwrap();
        let holdings = book.get("Main").unwrap().holdings();
        assert_eq!(holdings[0].purchase_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(holdings[1].purchase_date, NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());

        let saved = format::encode_portfolios(&book).unwrap();
        assert!(saved.contains("\"Purchase Date\": \"2023-03-15\""));
        assert!(!saved.contains("15-03-2023"));
    }

    #[test]
    fn unreadable_purchase_date_is_a_deserialization_error() {
        let bad = RECORD.replace("\"2024-01-02\"", "\"03/15/2023\"");
        let json = format!(r#"{{ "Main": [{bad}] }}"#);
        let err = format::decode_portfolios(&json).unwrap_err();
        assert!(matches!(err, CoreError::Deserialization(ref m) if m.contains("03/15/2023")));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            format::decode_portfolios("[1, 2"),
            Err(CoreError::Deserialization(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Cache file format
// ═══════════════════════════════════════════════════════════════════

mod cache_format {
    use super::*;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap()
    }

    #[test]
    fn previous_closes_use_suffixed_keys() {
        let mut cache = PriceCache::default();
        cache.put_at(PriceKey::current("AAPL"), 190.0, t0());
        cache.put_at(PriceKey::previous_close("AAPL"), 185.0, t0());

        let json = format::encode_cache(&cache).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["AAPL"]["price"], 190.0);
        assert_eq!(value["AAPL_prev"]["price"], 185.0);
        assert!(value["AAPL"]["fetched_at"].is_string());
    }

    #[test]
    fn decode_keeps_timestamps() {
        let mut cache = PriceCache::default();
        cache.put_at(PriceKey::current("AAPL"), 190.0, t0());
        let json = format::encode_cache(&cache).unwrap();

        let decoded = format::decode_cache(&json, Duration::minutes(15)).unwrap();
        assert_eq!(decoded.entry(&PriceKey::current("AAPL")).unwrap().fetched_at, t0());
        assert_eq!(decoded.get_at(&PriceKey::current("AAPL"), t0() + Duration::minutes(16)), None);
    }

    #[test]
    fn invalid_prices_are_skipped() {
        let json = r#"{
            "GOOD": { "price": 10.0, "fetched_at": "2024-05-01T14:00:00Z" },
            "ZERO": { "price": 0.0, "fetched_at": "2024-05-01T14:00:00Z" },
            "NEG_prev": { "price": -3.0, "fetched_at": "2024-05-01T14:00:00Z" }
        }"#;
        let cache = format::decode_cache(json, Duration::minutes(15)).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn case_collisions_keep_newest() {
        let json = r#"{
            "AAPL": { "price": 1.0, "fetched_at": "2024-05-01T14:00:00Z" },
            "aapl": { "price": 2.0, "fetched_at": "2024-05-01T15:00:00Z" }
        }"#;
        let cache = format::decode_cache(json, Duration::minutes(15)).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entry(&PriceKey::current("AAPL")).unwrap().price, 2.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// StorageManager — portfolios
// ═══════════════════════════════════════════════════════════════════

mod manager_portfolios {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("portfolios.json");
        let backup = dir.path().join("portfolios_backup.json");

        let outcome = StorageManager::save_portfolios(&sample_book(), &primary, &backup).unwrap();
        assert_eq!(outcome, SaveOutcome::Primary);
        assert!(!backup.exists());

        let loaded = StorageManager::load_portfolios(&primary, &backup);
        assert_eq!(loaded, sample_book());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("nested/data/portfolios.json");
        let backup = dir.path().join("nested/data/backup.json");
        StorageManager::save_portfolios(&sample_book(), &primary, &backup).unwrap();
        assert!(primary.exists());
    }

    #[test]
    fn missing_files_give_empty_book() {
        let dir = TempDir::new().unwrap();
        let book = StorageManager::load_portfolios(
            &dir.path().join("nope.json"),
            &dir.path().join("nope_backup.json"),
        );
        assert!(book.is_empty());
    }

    #[test]
    fn corrupt_primary_falls_back_to_backup() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("portfolios.json");
        let backup = dir.path().join("portfolios_backup.json");
        std::fs::write(&primary, "{ this is not json").unwrap();
        StorageManager::write_portfolios(&sample_book(), &backup).unwrap();

        let book = StorageManager::load_portfolios(&primary, &backup);
        assert_eq!(book, sample_book());
    }

    #[test]
    fn missing_primary_falls_back_to_backup() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("portfolios.json");
        let backup = dir.path().join("portfolios_backup.json");
        StorageManager::write_portfolios(&sample_book(), &backup).unwrap();

        let book = StorageManager::load_portfolios(&primary, &backup);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn both_corrupt_give_empty_book() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("portfolios.json");
        let backup = dir.path().join("portfolios_backup.json");
        std::fs::write(&primary, "garbage").unwrap();
        std::fs::write(&backup, "more garbage").unwrap();

        assert!(StorageManager::load_portfolios(&primary, &backup).is_empty());
    }

    #[test]
    fn unwritable_primary_triggers_emergency_backup() {
        let dir = TempDir::new().unwrap();
        // A directory where the primary file should be makes the write fail.
        let primary = dir.path().join("portfolios.json");
        std::fs::create_dir(&primary).unwrap();
        let backup = dir.path().join("portfolios_backup.json");

        let outcome = StorageManager::save_portfolios(&sample_book(), &primary, &backup).unwrap();
        assert_eq!(outcome, SaveOutcome::EmergencyBackup);
        assert_eq!(StorageManager::read_portfolios(&backup).unwrap(), sample_book());
    }

    #[test]
    fn both_unwritable_is_an_error() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("portfolios.json");
        let backup = dir.path().join("portfolios_backup.json");
        std::fs::create_dir(&primary).unwrap();
        std::fs::create_dir(&backup).unwrap();

        assert!(matches!(
            StorageManager::save_portfolios(&sample_book(), &primary, &backup),
            Err(CoreError::FileIO(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// StorageManager — price cache
// ═══════════════════════════════════════════════════════════════════

mod manager_cache {
    use super::*;

    #[test]
    fn persist_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("price_cache.json");
        let mut cache = PriceCache::default();
        cache.put(PriceKey::current("MSFT"), 410.0);
        cache.put(PriceKey::previous_close("MSFT"), 405.0);

        assert!(cache.persist_to_disk(&path));
        let loaded = PriceCache::load_from_disk(&path, Duration::minutes(15));

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&PriceKey::current("MSFT")), Some(410.0));
        assert_eq!(loaded.get(&PriceKey::previous_close("MSFT")), Some(405.0));
    }

    #[test]
    fn stale_entries_load_but_miss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("price_cache.json");
        let mut cache = PriceCache::default();
        cache.put_at(PriceKey::current("OLD"), 5.0, Utc::now() - Duration::hours(2));
        cache.persist_to_disk(&path);

        let loaded = PriceCache::load_from_disk(&path, Duration::minutes(15));
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&PriceKey::current("OLD")), None);
    }

    #[test]
    fn missing_file_is_cold_cache() {
        let dir = TempDir::new().unwrap();
        let cache = StorageManager::load_cache(&dir.path().join("none.json"), Duration::minutes(15));
        assert!(cache.is_empty());
        assert_eq!(cache.ttl(), Duration::minutes(15));
    }

    #[test]
    fn corrupt_file_is_cold_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("price_cache.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(StorageManager::load_cache(&path, Duration::minutes(15)).is_empty());
    }

    #[test]
    fn persist_failure_returns_false() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("price_cache.json");
        std::fs::create_dir(&path).unwrap();
        assert!(!PriceCache::default().persist_to_disk(&path));
    }
}
