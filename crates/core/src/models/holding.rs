use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Accepted "Purchase Date" layouts. Dates are always written in the first.
pub const PURCHASE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%m-%Y"];

/// One position in a portfolio.
///
/// Serialized with the column names used by the portfolio file, so a
/// saved file reads the same as the tables the front ends display.
///
/// `investment_value` always equals `quantity * purchase_price`. The
/// `current_*`, profit/loss and daily fields are only meaningful right
/// after a valuation refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    #[serde(rename = "Stock Name")]
    pub name: String,

    /// Uppercased ticker, unique within its portfolio.
    #[serde(rename = "Ticker Symbol")]
    pub ticker: String,

    #[serde(rename = "Quantity")]
    pub quantity: f64,

    #[serde(rename = "Purchase Price")]
    pub purchase_price: f64,

    #[serde(rename = "Purchase Date", deserialize_with = "deserialize_purchase_date")]
    pub purchase_date: NaiveDate,

    #[serde(rename = "Sector", default)]
    pub sector: String,

    #[serde(rename = "Investment Value", default)]
    pub investment_value: f64,

    #[serde(rename = "Current Price", default)]
    pub current_price: f64,

    #[serde(rename = "Current Value", default)]
    pub current_value: f64,

    #[serde(rename = "Profit/Loss", default)]
    pub profit_loss: f64,

    #[serde(rename = "Profit/Loss %", default)]
    pub profit_loss_pct: f64,

    #[serde(rename = "Daily Return %", default)]
    pub daily_return_pct: f64,

    #[serde(rename = "Daily P/L", default)]
    pub daily_pl: f64,
}

impl Holding {
    /// Build a fresh holding from user input. Derived valuation fields start at zero.
    pub fn new(input: NewHolding) -> Self {
        let mut holding = Self {
            name: input.name.trim().to_string(),
            ticker: normalize_ticker(&input.ticker),
            quantity: input.quantity,
            purchase_price: input.purchase_price,
            purchase_date: input.purchase_date,
            sector: input.sector.trim().to_string(),
            investment_value: 0.0,
            current_price: 0.0,
            current_value: 0.0,
            profit_loss: 0.0,
            profit_loss_pct: 0.0,
            daily_return_pct: 0.0,
            daily_pl: 0.0,
        };
        holding.recompute_investment();
        holding
    }

    pub fn recompute_investment(&mut self) {
        self.investment_value = self.quantity * self.purchase_price;
    }

    /// Apply a partial update. The ticker is never changed here.
    pub fn apply_update(&mut self, update: &HoldingUpdate) {
        if let Some(name) = &update.name {
            self.name = name.trim().to_string();
        }
        if let Some(quantity) = update.quantity {
            self.quantity = quantity;
        }
        if let Some(price) = update.purchase_price {
            self.purchase_price = price;
        }
        if let Some(date) = update.purchase_date {
            self.purchase_date = date;
        }
        if let Some(sector) = &update.sector {
            self.sector = sector.trim().to_string();
        }
        self.recompute_investment();
    }
}

/// User-supplied fields for a new holding.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHolding {
    pub name: String,
    pub ticker: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub purchase_date: NaiveDate,
    pub sector: String,
}

impl NewHolding {
    pub fn new(
        name: impl Into<String>,
        ticker: impl Into<String>,
        quantity: f64,
        purchase_price: f64,
        purchase_date: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            ticker: ticker.into(),
            quantity,
            purchase_price,
            purchase_date,
            sector: String::new(),
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = sector.into();
        self
    }
}

/// Fields a modify command may change. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingUpdate {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub sector: Option<String>,
}

impl HoldingUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && self.purchase_price.is_none()
            && self.purchase_date.is_none()
            && self.sector.is_none()
    }

    /// Names of the fields this update touches, for change notices.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("Stock Name");
        }
        if self.quantity.is_some() {
            fields.push("Quantity");
        }
        if self.purchase_price.is_some() {
            fields.push("Purchase Price");
        }
        if self.purchase_date.is_some() {
            fields.push("Purchase Date");
        }
        if self.sector.is_some() {
            fields.push("Sector");
        }
        fields
    }
}

pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Parse a purchase date written as `YYYY-MM-DD` or `DD-MM-YYYY`.
pub fn parse_purchase_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    PURCHASE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn deserialize_purchase_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_purchase_date(&text).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid purchase date '{text}', expected YYYY-MM-DD or DD-MM-YYYY"
        ))
    })
}
