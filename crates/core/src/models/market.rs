use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::Serialize;

use crate::models::price::Quote;

/// Which table of the snapshot an index belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Region {
    Indian,
    Global,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Indian => write!(f, "Indian"),
            Region::Global => write!(f, "Global"),
        }
    }
}

/// Exchange whose trading session decides whether an index is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Exchange {
    /// NSE / BSE, 09:15-15:30 IST.
    India,
    /// NYSE / Nasdaq, 09:30-16:00 US Eastern.
    UnitedStates,
    /// LSE, 08:00-16:30 UK time.
    London,
}

impl Exchange {
    /// Regular session, inclusive at both ends, in exchange-local time.
    pub fn session(&self) -> (NaiveTime, NaiveTime) {
        let (open, close) = match self {
            Exchange::India => ((9, 15), (15, 30)),
            Exchange::UnitedStates => ((9, 30), (16, 0)),
            Exchange::London => ((8, 0), (16, 30)),
        };
        (
            NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap_or_default(),
        )
    }

    pub fn hours_label(&self) -> &'static str {
        match self {
            Exchange::India => "09:15-15:30 IST",
            Exchange::UnitedStates => "09:30-16:00 ET",
            Exchange::London => "08:00-16:30 UK",
        }
    }

    /// Offset from UTC in minutes at the given instant, daylight saving included.
    pub fn utc_offset_minutes(&self, at: DateTime<Utc>) -> i64 {
        match self {
            Exchange::India => 330,
            Exchange::UnitedStates if us_daylight_saving(at) => -240,
            Exchange::UnitedStates => -300,
            Exchange::London if uk_summer_time(at) => 60,
            Exchange::London => 0,
        }
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.naive_utc() + Duration::minutes(self.utc_offset_minutes(at))
    }

    /// Weekday and inside the session in exchange-local time. Holidays are not modelled.
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let local = self.local_time(at);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let (open, close) = self.session();
        let time = local.time();
        open <= time && time <= close
    }
}

/// An index tracked by the market snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketIndex {
    pub name: &'static str,
    pub symbol: &'static str,
    pub region: Region,
    pub exchange: Exchange,
}

impl MarketIndex {
    pub const fn new(name: &'static str, symbol: &'static str, region: Region, exchange: Exchange) -> Self {
        Self {
            name,
            symbol,
            region,
            exchange,
        }
    }
}

pub const DEFAULT_INDICES: [MarketIndex; 8] = [
    MarketIndex::new("Nifty 50", "^NSEI", Region::Indian, Exchange::India),
    MarketIndex::new("Nifty Bank", "^NSEBANK", Region::Indian, Exchange::India),
    MarketIndex::new("Nifty Next 50", "^NSEMDCP50", Region::Indian, Exchange::India),
    MarketIndex::new("Sensex", "^BSESN", Region::Indian, Exchange::India),
    MarketIndex::new("S&P 500", "^GSPC", Region::Global, Exchange::UnitedStates),
    MarketIndex::new("NASDAQ", "^IXIC", Region::Global, Exchange::UnitedStates),
    MarketIndex::new("Dow Jones", "^DJI", Region::Global, Exchange::UnitedStates),
    MarketIndex::new("FTSE 100", "^FTSE", Region::Global, Exchange::London),
];

/// Level and day change of one index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexQuote {
    pub name: String,
    pub symbol: String,
    pub region: Region,
    pub price: f64,
    /// `price - previous close`, 0 when the previous close is unknown.
    pub change: f64,
    pub change_pct: f64,
    pub is_open: bool,
    pub market_hours: String,
}

impl IndexQuote {
    /// `None` when the index has no current level.
    pub fn from_quote(index: &MarketIndex, quote: Quote, at: DateTime<Utc>) -> Option<Self> {
        let price = quote.current?;
        let previous = quote.previous_close.unwrap_or(price);
        let change = price - previous;
        let change_pct = if previous > 0.0 {
            change / previous * 100.0
        } else {
            0.0
        };

        Some(Self {
            name: index.name.to_string(),
            symbol: index.symbol.to_string(),
            region: index.region,
            price,
            change,
            change_pct,
            is_open: index.exchange.is_open_at(at),
            market_hours: index.exchange.hours_label().to_string(),
        })
    }
}

/// Index levels at one moment, in configured order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub taken_at: DateTime<Utc>,
    pub indices: Vec<IndexQuote>,
    /// Names of indices whose level could not be resolved.
    pub unavailable: Vec<String>,
}

impl MarketSnapshot {
    pub fn region(&self, region: Region) -> impl Iterator<Item = &IndexQuote> {
        self.indices.iter().filter(move |q| q.region == region)
    }

    /// Whether any resolved index of the region is trading.
    pub fn is_region_open(&self, region: Region) -> bool {
        self.region(region).any(|q| q.is_open)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// US daylight time: second Sunday of March 07:00 UTC until first Sunday of November 06:00 UTC.
fn us_daylight_saving(at: DateTime<Utc>) -> bool {
    let year = at.year();
    let start = nth_sunday(year, 3, 2).and_then(|d| d.and_hms_opt(7, 0, 0));
    let end = nth_sunday(year, 11, 1).and_then(|d| d.and_hms_opt(6, 0, 0));
    within(at, start, end)
}

/// UK summer time: last Sunday of March until last Sunday of October, both at 01:00 UTC.
fn uk_summer_time(at: DateTime<Utc>) -> bool {
    let year = at.year();
    let start = last_sunday(year, 3).and_then(|d| d.and_hms_opt(1, 0, 0));
    let end = last_sunday(year, 10).and_then(|d| d.and_hms_opt(1, 0, 0));
    within(at, start, end)
}

fn within(at: DateTime<Utc>, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => {
            let now = at.naive_utc();
            start <= now && now < end
        }
        _ => false,
    }
}

fn nth_sunday(year: i32, month: u32, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 - first.weekday().num_days_from_sunday()) % 7;
    first.checked_add_signed(Duration::days(i64::from(offset + 7 * (n - 1))))
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next.pred_opt()?;
    last.checked_sub_signed(Duration::days(i64::from(last.weekday().num_days_from_sunday())))
}
