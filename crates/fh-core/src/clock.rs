//! # Clock implementations
//!
//! `BusinessClock` pins every "today" comparison to a single configurable
//! timezone; `ManualClock` lets tests drive the calendar by hand.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::traits::Clock;

/// Wall clock in a fixed business timezone.
pub struct BusinessClock {
    tz: Tz,
}

impl BusinessClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for BusinessClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

/// Hand-cranked clock for tests. Setting a date pins `now()` to noon
/// UTC of that day; minute-level advancement drives expiry windows.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { now: Mutex::new(noon(today)) }
    }

    pub fn set_today(&self, today: NaiveDate) {
        *self.now.lock().unwrap() = noon(today);
    }

    pub fn advance_days(&self, days: i64) {
        *self.now.lock().unwrap() += chrono::Duration::days(days);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        *self.now.lock().unwrap() += chrono::Duration::minutes(minutes);
    }
}

fn noon(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn today(&self) -> NaiveDate {
        self.now.lock().unwrap().date_naive()
    }
}
