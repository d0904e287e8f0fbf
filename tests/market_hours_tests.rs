use chrono::{TimeZone, Utc};

use quant_arena::config::OrchestratorConfig;
use quant_arena::hours::MarketHours;

fn nyse_hours() -> MarketHours {
    MarketHours::new("America/New_York".parse().expect("tz"), (9, 30), (16, 0))
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("valid timestamp")
}

#[test]
/// Verifies a mid-session weekday is open: Wed 2024-01-10 15:00 UTC is
/// 10:00 Eastern (EST, UTC-5).
fn weekday_mid_session_is_open() {
    assert!(nyse_hours().is_open_at(at(2024, 1, 10, 15, 0)));
}

#[test]
/// Verifies the open boundary is inclusive and the minute before is closed.
fn open_boundary_is_inclusive() {
    let hours = nyse_hours();
    // 14:30 UTC is exactly 09:30 Eastern in winter.
    assert!(hours.is_open_at(at(2024, 1, 10, 14, 30)));
    assert!(!hours.is_open_at(at(2024, 1, 10, 14, 29)));
}

#[test]
/// Verifies the close boundary is exclusive.
fn close_boundary_is_exclusive() {
    let hours = nyse_hours();
    // 21:00 UTC is exactly 16:00 Eastern in winter.
    assert!(!hours.is_open_at(at(2024, 1, 10, 21, 0)));
    assert!(hours.is_open_at(at(2024, 1, 10, 20, 59)));
}

#[test]
/// Verifies weekends are closed even during session hours.
fn weekend_is_closed() {
    let hours = nyse_hours();
    // Sat 2024-01-13 and Sun 2024-01-14, both at 15:00 UTC.
    assert!(!hours.is_open_at(at(2024, 1, 13, 15, 0)));
    assert!(!hours.is_open_at(at(2024, 1, 14, 15, 0)));
}

#[test]
/// Verifies daylight saving is handled by the venue timezone: in July the
/// open shifts to 13:30 UTC (EDT, UTC-4).
fn daylight_saving_shifts_the_utc_open() {
    let hours = nyse_hours();
    assert!(hours.is_open_at(at(2024, 7, 10, 13, 30)));
    assert!(!hours.is_open_at(at(2024, 7, 10, 13, 29)));
    // 20:00 UTC in summer is 16:00 Eastern, already closed.
    assert!(!hours.is_open_at(at(2024, 7, 10, 20, 0)));
}

#[test]
/// Verifies construction from config values, including rejection of an
/// unknown timezone.
fn builds_from_config_and_rejects_bad_timezone() {
    let mut config = OrchestratorConfig {
        cycle_interval_secs: 900,
        market_context_ttl_secs: 300,
        cycle_history_len: 100,
        provider_timeout_ms: 2000,
        market_timezone: "America/New_York".to_string(),
        market_open: "09:30".to_string(),
        market_close: "16:00".to_string(),
    };
    let hours = MarketHours::from_config(&config).expect("config should build");
    assert!(hours.is_open_at(at(2024, 1, 10, 15, 0)));

    config.market_timezone = "Mars/Olympus".to_string();
    assert!(MarketHours::from_config(&config).is_err());
}
