use anyhow::Result;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::{parse_clock, OrchestratorConfig};

/// Timezone-aware market-hours gate: weekdays between open (inclusive) and
/// close (exclusive) in the venue's local time.
#[derive(Debug, Clone)]
pub struct MarketHours {
    tz: Tz,
    open_minutes: u32,
    close_minutes: u32,
}

impl MarketHours {
    pub fn new(tz: Tz, open: (u32, u32), close: (u32, u32)) -> Self {
        Self {
            tz,
            open_minutes: open.0 * 60 + open.1,
            close_minutes: close.0 * 60 + close.1,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let tz: Tz = config.market_timezone.parse().map_err(|_| {
            anyhow::anyhow!("unknown market timezone '{}'", config.market_timezone)
        })?;
        Ok(Self::new(
            tz,
            parse_clock(&config.market_open)?,
            parse_clock(&config.market_close)?,
        ))
    }

    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let local = self.tz.from_utc_datetime(&at.naive_utc());
        match local.weekday() {
            Weekday::Sat | Weekday::Sun => return false,
            _ => {}
        }
        let minutes = local.hour() * 60 + local.minute();
        minutes >= self.open_minutes && minutes < self.close_minutes
    }

    pub fn is_open_now(&self) -> bool {
        self.is_open_at(Utc::now())
    }
}
