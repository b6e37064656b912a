//! Common types used across the ledger

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one stock balance: a product held in a warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
}

impl StockKey {
    pub fn new(warehouse_id: Uuid, product_id: Uuid) -> Self {
        Self {
            warehouse_id,
            product_id,
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.warehouse_id, self.product_id)
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, &'static str> {
        if end < start {
            return Err("Date range end must not precede its start");
        }
        Ok(Self { start, end })
    }

    /// First instant of `start`, UTC
    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// First instant after the last day of the range, UTC
    pub fn ends_before(&self) -> DateTime<Utc> {
        match self.end.succ_opt() {
            Some(next) => Utc.from_utc_datetime(&next.and_time(NaiveTime::MIN)),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at() && at < self.ends_before()
    }

    /// Whether a calendar day falls in the range
    pub fn includes(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }
}
