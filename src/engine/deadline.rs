use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

/// Weekly cutoff for predictions. The deadline for a given instant is the
/// cutoff occurrence in the instant's own cycle: the configured weekday and
/// time, `0..=6` days ahead of the instant's date.
///
/// On the cutoff weekday itself the deadline is today's cutoff both before
/// and after the cutoff time. A closed window never rolls forward on its own;
/// the next calendar day starts the next cycle and reopens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlinePolicy {
    cutoff_weekday: Weekday,
    cutoff_time: NaiveTime,
}

impl DeadlinePolicy {
    pub fn new(cutoff_weekday: Weekday, cutoff_time: NaiveTime) -> Self {
        Self {
            cutoff_weekday,
            cutoff_time,
        }
    }

    /// The cutoff instant governing `now`.
    pub fn cycle_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days_ahead = (self.cutoff_weekday.num_days_from_monday() as i64
            - now.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);

        (now.date_naive() + Duration::days(days_ahead))
            .and_time(self.cutoff_time)
            .and_utc()
    }

    /// Strictly after the deadline. The cutoff instant itself still counts
    /// as open.
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        now > self.cycle_deadline(now)
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn policy() -> DeadlinePolicy {
        DeadlinePolicy::new(Weekday::Fri, NaiveTime::from_hms_opt(20, 0, 0).unwrap())
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn midweek_resolves_to_upcoming_cutoff() {
        // 2026-08-19 is a Wednesday
        let now = utc(2026, 8, 19, 10, 0, 0);
        assert_eq!(policy().cycle_deadline(now), utc(2026, 8, 21, 20, 0, 0));
        assert!(!policy().is_past(now));
    }

    #[test]
    fn cutoff_day_before_time_is_open() {
        let now = utc(2026, 8, 21, 10, 0, 0);
        assert_eq!(policy().cycle_deadline(now), utc(2026, 8, 21, 20, 0, 0));
        assert!(!policy().is_past(now));
    }

    #[test]
    fn cutoff_day_after_time_is_closed_not_rolled() {
        let now = utc(2026, 8, 21, 21, 0, 0);
        // still today's cutoff, not next week's
        assert_eq!(policy().cycle_deadline(now), utc(2026, 8, 21, 20, 0, 0));
        assert!(policy().is_past(now));
    }

    #[test]
    fn exact_cutoff_instant_is_still_open() {
        let now = utc(2026, 8, 21, 20, 0, 0);
        assert!(!policy().is_past(now));
        assert!(policy().is_past(now + Duration::seconds(1)));
    }

    #[test]
    fn day_after_cutoff_reopens_next_cycle() {
        // Saturday after a Friday cutoff
        let now = utc(2026, 8, 22, 9, 0, 0);
        assert_eq!(policy().cycle_deadline(now), utc(2026, 8, 28, 20, 0, 0));
        assert!(!policy().is_past(now));
    }

    #[test]
    fn weekday_arithmetic_wraps_across_the_week() {
        let monday_cutoff =
            DeadlinePolicy::new(Weekday::Mon, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        // Sunday 2026-08-23 resolves to Monday 2026-08-24
        let now = utc(2026, 8, 23, 8, 0, 0);
        assert_eq!(
            monday_cutoff.cycle_deadline(now),
            utc(2026, 8, 24, 12, 0, 0)
        );
    }
}
