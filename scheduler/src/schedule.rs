//! Fire-time derivation and the misfire policy

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

/// Misfires within this window still run; older ones are skipped.
pub const MISFIRE_GRACE_SECS: i64 = 300;

/// What to do with a fire time that has already passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Run,
    Skip,
}

pub fn misfire_decision(scheduled: DateTime<Utc>, now: DateTime<Utc>) -> FireDecision {
    if now - scheduled > Duration::seconds(MISFIRE_GRACE_SECS) {
        FireDecision::Skip
    } else {
        FireDecision::Run
    }
}

/// What to do with a fire time persisted before a restart: keep it while
/// it is still upcoming or within the grace window, otherwise drop it.
pub fn recovered_fire(
    pending: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let at = pending?;
    match misfire_decision(at, now) {
        FireDecision::Run => Some(at),
        FireDecision::Skip => None,
    }
}

/// The next fire strictly after `after` for a schedule frequency.
///
/// `5m`/`15m` run on a fixed interval; `1h`/`4h` align to start-of-hour
/// boundaries; `1d` fires daily at `daily_hm`. Unknown frequencies get no
/// fire time.
pub fn next_fire(
    frequency: &str,
    after: DateTime<Utc>,
    daily_hm: (u32, u32),
) -> Option<DateTime<Utc>> {
    match frequency {
        "5m" => Some(after + Duration::minutes(5)),
        "15m" => Some(after + Duration::minutes(15)),
        "1h" => Some(next_hour_boundary(after, 1)),
        "4h" => Some(next_hour_boundary(after, 4)),
        "1d" => Some(next_daily(after, daily_hm)),
        _ => None,
    }
}

fn next_hour_boundary(after: DateTime<Utc>, every_hours: u32) -> DateTime<Utc> {
    let mut candidate = Utc
        .with_ymd_and_hms(after.year(), after.month(), after.day(), after.hour(), 0, 0)
        .unwrap();
    loop {
        candidate += Duration::hours(1);
        if candidate.hour() % every_hours == 0 && candidate > after {
            return candidate;
        }
    }
}

fn next_daily(after: DateTime<Utc>, (hour, minute): (u32, u32)) -> DateTime<Utc> {
    let today = Utc
        .with_ymd_and_hms(after.year(), after.month(), after.day(), hour, minute, 0)
        .unwrap();
    if today > after {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Parse `HH:MM` into hour and minute; defaults to 09:30 on bad input.
pub fn parse_daily_run_time(raw: &str) -> (u32, u32) {
    let mut parts = raw.splitn(2, ':');
    let hour = parts.next().and_then(|h| h.parse().ok());
    let minute = parts.next().and_then(|m| m.parse().ok());
    match (hour, minute) {
        (Some(h), Some(m)) if h < 24 && m < 60 => (h, m),
        _ => (9, 30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn minute_frequencies_are_fixed_intervals() {
        let now = at(10, 7, 30);
        assert_eq!(next_fire("5m", now, (9, 30)), Some(now + Duration::minutes(5)));
        assert_eq!(next_fire("15m", now, (9, 30)), Some(now + Duration::minutes(15)));
    }

    #[test]
    fn hourly_frequencies_align_to_hour_boundaries() {
        let now = at(10, 7, 30);
        assert_eq!(next_fire("1h", now, (9, 30)), Some(at(11, 0, 0)));
        assert_eq!(next_fire("4h", now, (9, 30)), Some(at(12, 0, 0)));
        // exactly on a boundary advances to the next one
        assert_eq!(next_fire("4h", at(12, 0, 0), (9, 30)), Some(at(16, 0, 0)));
    }

    #[test]
    fn daily_frequency_fires_at_the_configured_time() {
        assert_eq!(next_fire("1d", at(8, 0, 0), (9, 30)), Some(at(9, 30, 0)));
        let tomorrow = Utc.with_ymd_and_hms(2024, 3, 11, 9, 30, 0).unwrap();
        assert_eq!(next_fire("1d", at(10, 0, 0), (9, 30)), Some(tomorrow));
    }

    #[test]
    fn unknown_frequency_has_no_fire_time() {
        assert_eq!(next_fire("2h", at(10, 0, 0), (9, 30)), None);
    }

    #[test]
    fn misfires_respect_the_grace_window() {
        let scheduled = at(10, 0, 0);
        assert_eq!(misfire_decision(scheduled, at(10, 3, 0)), FireDecision::Run);
        assert_eq!(misfire_decision(scheduled, at(10, 5, 0)), FireDecision::Run);
        assert_eq!(misfire_decision(scheduled, at(10, 6, 0)), FireDecision::Skip);
    }

    #[test]
    fn recovery_keeps_pending_fires_inside_the_grace_window() {
        let now = at(10, 6, 0);
        // three minutes late is still inside the grace window
        let recent = at(10, 3, 0);
        assert_eq!(recovered_fire(Some(recent), now), Some(recent));
        // a fire still in the future survives a restart untouched
        let upcoming = at(10, 9, 0);
        assert_eq!(recovered_fire(Some(upcoming), now), Some(upcoming));
        // six minutes late is stale
        assert_eq!(recovered_fire(Some(at(10, 0, 0)), now), None);
        assert_eq!(recovered_fire(None, now), None);
    }

    #[test]
    fn daily_run_time_parses_or_defaults() {
        assert_eq!(parse_daily_run_time("09:30"), (9, 30));
        assert_eq!(parse_daily_run_time("23:59"), (23, 59));
        assert_eq!(parse_daily_run_time("25:00"), (9, 30));
        assert_eq!(parse_daily_run_time("garbage"), (9, 30));
    }
}
