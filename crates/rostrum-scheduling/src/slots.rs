//! Candidate slot generation.
//!
//! Slots are enumerated on a fixed grid - every 30 minutes, 09:00-18:00,
//! Monday-Friday - and scored by the share of participants with no busy
//! interval overlapping the slot. Generation is a pure function of its
//! inputs: identical inputs always yield the identical ordered list, so any
//! two clients regenerate the same slots. The grid is computed on the UTC
//! wall clock.

use crate::models::{AvailabilityWindow, ParticipantSchedule, TimeSlot, TimeWindow};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// First bookable hour of a business day.
pub const BUSINESS_START_HOUR: u32 = 9;

/// Hour by which a slot must have ended.
pub const BUSINESS_END_HOUR: u32 = 18;

/// Grid step in minutes.
pub const GRID_STEP_MINUTES: u32 = 30;

/// Maximum number of slots published per generation.
pub const MAX_SLOTS: usize = 10;

/// Generate scored candidate slots.
///
/// Enumeration starts at the next full hour after `from` and runs through
/// `window_days` days ahead; a candidate is kept only if `start + duration`
/// stays within business hours of the same day. Output is ordered by score
/// descending, ties broken by earliest start, and capped to [`MAX_SLOTS`].
pub fn generate_slots(
    from: DateTime<Utc>,
    duration_minutes: u32,
    window_days: u32,
    schedules: &[ParticipantSchedule],
) -> Vec<TimeSlot> {
    let first = ceil_to_hour(from);
    let horizon = from + Duration::days(window_days as i64);
    let duration = Duration::minutes(duration_minutes as i64);

    let mut slots = Vec::new();
    let mut date = from.date_naive();
    while date <= horizon.date_naive() {
        if !matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
            let day_start = date
                .and_hms_opt(BUSINESS_START_HOUR, 0, 0)
                .map(|dt| dt.and_utc());
            let day_end = date
                .and_hms_opt(BUSINESS_END_HOUR, 0, 0)
                .map(|dt| dt.and_utc());
            if let (Some(day_start), Some(day_end)) = (day_start, day_end) {
                let mut start = day_start;
                while start < day_end {
                    let end = start + duration;
                    if start >= first && start <= horizon && end <= day_end {
                        let window = TimeWindow::new(start, end);
                        slots.push(TimeSlot::new(start, end, availability_score(&window, schedules)));
                    }
                    start += Duration::minutes(GRID_STEP_MINUTES as i64);
                }
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    slots.sort_by(|a, b| b.score.cmp(&a.score).then(a.start.cmp(&b.start)));
    slots.truncate(MAX_SLOTS);
    slots
}

/// Percent of participants free for the whole window.
///
/// Zero participants score 100: no information means assume open.
pub fn availability_score(window: &TimeWindow, schedules: &[ParticipantSchedule]) -> u8 {
    if schedules.is_empty() {
        return 100;
    }
    let free = schedules.iter().filter(|s| s.is_free(window)).count();
    (100.0 * free as f64 / schedules.len() as f64).round() as u8
}

/// Turn declared availability into busy intervals within a horizon.
///
/// The declared windows are free time; everything else inside the horizon
/// becomes busy. No declared windows means no constraint at all - an empty
/// result, not an all-busy one.
pub fn invert_availability(windows: &[AvailabilityWindow], horizon: TimeWindow) -> Vec<TimeWindow> {
    if windows.is_empty() {
        return Vec::new();
    }

    // Clamp to the horizon, sort, and merge overlapping free windows.
    let mut free: Vec<TimeWindow> = windows
        .iter()
        .map(AvailabilityWindow::window)
        .filter(|w| w.overlaps(&horizon))
        .map(|w| TimeWindow::new(w.start.max(horizon.start), w.end.min(horizon.end)))
        .collect();
    if free.is_empty() {
        return vec![horizon];
    }
    free.sort_by_key(|w| w.start);
    let mut merged: Vec<TimeWindow> = Vec::new();
    for window in free {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => last.end = last.end.max(window.end),
            _ => merged.push(window),
        }
    }

    // Complement within the horizon.
    let mut busy = Vec::new();
    let mut cursor = horizon.start;
    for window in &merged {
        if cursor < window.start {
            busy.push(TimeWindow::new(cursor, window.start));
        }
        cursor = cursor.max(window.end);
    }
    if cursor < horizon.end {
        busy.push(TimeWindow::new(cursor, horizon.end));
    }
    busy
}

/// Round up to the next full hour; an exact hour stays put.
fn ceil_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    if t.minute() == 0 && t.second() == 0 && t.nanosecond() == 0 {
        return t;
    }
    let secs = t.timestamp();
    let rounded = secs - secs.rem_euclid(3600) + 3600;
    DateTime::from_timestamp(rounded, 0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AvailabilitySource;
    use chrono::TimeZone;
    use rostrum_store::WriterId;

    // 2026-08-03 is a Monday.
    fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, hour, minute, 0).unwrap()
    }

    fn sunday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).unwrap()
    }

    fn busy(writer: &str, windows: &[TimeWindow]) -> ParticipantSchedule {
        ParticipantSchedule {
            writer: WriterId::new(writer),
            busy: windows.to_vec(),
        }
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let schedules = vec![
            ParticipantSchedule::open(WriterId::new("alice")),
            busy("bob", &[TimeWindow::new(monday(10, 0), monday(12, 0))]),
        ];
        let first = generate_slots(sunday_noon(), 60, 14, &schedules);
        let second = generate_slots(sunday_noon(), 60, 14, &schedules);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn busy_morning_scores_half() {
        // Two participants, one fully free, one busy 10:00-12:00 on the
        // first business day.
        let schedules = vec![
            ParticipantSchedule::open(WriterId::new("alice")),
            busy("bob", &[TimeWindow::new(monday(10, 0), monday(12, 0))]),
        ];

        // A slot inside the busy block loses half the pool; an afternoon
        // slot keeps everyone.
        let in_conflict = TimeWindow::new(monday(10, 0), monday(11, 0));
        let afternoon = TimeWindow::new(monday(13, 0), monday(14, 0));
        assert_eq!(availability_score(&in_conflict, &schedules), 50);
        assert_eq!(availability_score(&afternoon, &schedules), 100);

        // The interval test is half-open: a meeting ending exactly at 10:00
        // does not collide with a busy block starting at 10:00.
        let before = TimeWindow::new(monday(9, 0), monday(10, 0));
        assert_eq!(availability_score(&before, &schedules), 100);

        // Full-score slots sort ahead of the conflicted ones.
        let slots = generate_slots(sunday_noon(), 60, 14, &schedules);
        assert_eq!(slots[0].start, monday(9, 0));
        assert_eq!(slots[0].score, 100);
        assert!(slots.iter().all(|s| s.score == 100));
    }

    #[test]
    fn orders_by_score_then_start_and_caps() {
        // One open participant, one busy all of Monday except 17:00-18:00.
        let schedules = vec![
            ParticipantSchedule::open(WriterId::new("alice")),
            busy("bob", &[TimeWindow::new(monday(9, 0), monday(17, 0))]),
        ];
        // Horizon of one day from Monday 08:00 keeps Tuesday out.
        let slots = generate_slots(monday(8, 0), 60, 1, &schedules);

        assert_eq!(slots.len(), MAX_SLOTS);
        assert_eq!(slots[0].start, monday(17, 0));
        assert_eq!(slots[0].score, 100);
        assert_eq!(slots[1].start, monday(9, 0));
        assert_eq!(slots[1].score, 50);
        assert_eq!(slots[2].start, monday(9, 30));
        for pair in slots.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].start < pair[1].start)
            );
        }
    }

    #[test]
    fn zero_participants_score_full() {
        let slots = generate_slots(sunday_noon(), 60, 5, &[]);
        assert!(!slots.is_empty());
        assert!(slots.iter().all(|s| s.score == 100));
    }

    #[test]
    fn grid_respects_business_hours_and_weekends() {
        // Friday 2026-08-07 at 16:10; next boundary is 17:00.
        let friday = Utc.with_ymd_and_hms(2026, 8, 7, 16, 10, 0).unwrap();
        let slots = generate_slots(friday, 60, 3, &[]);

        assert_eq!(slots[0].start, Utc.with_ymd_and_hms(2026, 8, 7, 17, 0, 0).unwrap());
        for slot in &slots {
            assert!(!matches!(
                slot.start.weekday(),
                chrono::Weekday::Sat | chrono::Weekday::Sun
            ));
            assert!(slot.start.hour() >= BUSINESS_START_HOUR);
            let day_end = slot
                .start
                .date_naive()
                .and_hms_opt(BUSINESS_END_HOUR, 0, 0)
                .unwrap()
                .and_utc();
            assert!(slot.end <= day_end);
        }
    }

    #[test]
    fn long_sessions_must_fit_before_close() {
        // A 4-hour session cannot start after 14:00.
        let slots = generate_slots(sunday_noon(), 240, 5, &[]);
        assert!(slots.iter().all(|s| s.start.hour() <= 14));
    }

    #[test]
    fn slot_ids_derive_from_start() {
        let slots = generate_slots(sunday_noon(), 60, 5, &[]);
        for slot in &slots {
            assert_eq!(slot.id, TimeSlot::id_for(slot.start));
        }
    }

    #[test]
    fn invert_availability_complements_within_horizon() {
        let horizon = TimeWindow::new(monday(9, 0), monday(18, 0));
        let declared = vec![AvailabilityWindow {
            start: monday(10, 0),
            end: monday(12, 0),
            source: AvailabilitySource::Manual,
        }];

        let busy = invert_availability(&declared, horizon);
        assert_eq!(
            busy,
            vec![
                TimeWindow::new(monday(9, 0), monday(10, 0)),
                TimeWindow::new(monday(12, 0), monday(18, 0)),
            ]
        );
    }

    #[test]
    fn invert_availability_empty_means_unconstrained() {
        let horizon = TimeWindow::new(monday(9, 0), monday(18, 0));
        assert!(invert_availability(&[], horizon).is_empty());
    }

    #[test]
    fn invert_availability_merges_overlapping_windows() {
        let horizon = TimeWindow::new(monday(9, 0), monday(18, 0));
        let declared = vec![
            AvailabilityWindow {
                start: monday(10, 0),
                end: monday(12, 0),
                source: AvailabilitySource::Manual,
            },
            AvailabilityWindow {
                start: monday(11, 0),
                end: monday(13, 0),
                source: AvailabilitySource::ExternalCalendar,
            },
        ];

        let busy = invert_availability(&declared, horizon);
        assert_eq!(
            busy,
            vec![
                TimeWindow::new(monday(9, 0), monday(10, 0)),
                TimeWindow::new(monday(13, 0), monday(18, 0)),
            ]
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn generation_is_reproducible(
                duration in prop::sample::select(vec![30u32, 60, 90, 120]),
                window_days in 1u32..21,
                busy_hour in 9u32..17,
            ) {
                let schedules = vec![
                    ParticipantSchedule::open(WriterId::new("alice")),
                    busy("bob", &[TimeWindow::new(
                        monday(busy_hour, 0),
                        monday(busy_hour + 1, 0),
                    )]),
                ];
                let first = generate_slots(sunday_noon(), duration, window_days, &schedules);
                let second = generate_slots(sunday_noon(), duration, window_days, &schedules);
                prop_assert_eq!(first, second);
            }

            #[test]
            fn output_never_exceeds_cap(window_days in 0u32..30) {
                let slots = generate_slots(sunday_noon(), 60, window_days, &[]);
                prop_assert!(slots.len() <= MAX_SLOTS);
            }
        }
    }
}
