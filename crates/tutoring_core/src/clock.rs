//! crates/tutoring_core/src/clock.rs
//!
//! Half-hour slot index arithmetic and timezone normalization. All stored
//! dates and slot indexes are UTC+0; the display layer runs a fixed +7h
//! ahead. Everything else in the engine builds on the conversions here, so
//! the round-trip guarantee (`to_storage_slot` inverts `to_display_time`)
//! is the load-bearing property of this module.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use chrono::Datelike;

use crate::error::CoreError;

/// Number of 30-minute slots in one calendar day.
pub const SLOTS_PER_DAY: u8 = 48;

/// Length of one slot in minutes.
pub const SLOT_MINUTES: i64 = 30;

/// Fixed offset between storage time (UTC+0) and display time (UTC+7).
pub const DISPLAY_OFFSET_HOURS: i64 = 7;

//=========================================================================================
// SlotIndex
//=========================================================================================

/// A validated index into the 48-slot day grid.
///
/// Invariant: the wrapped value is always in `0..=47`. Construction is the
/// only place raw integers are checked, so downstream arithmetic never has
/// to re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// Validates a raw index. Out-of-range values fail with
    /// [`CoreError::InvalidTimestamp`]; a malformed index must never be
    /// silently coerced into a wrong slot.
    pub fn new(raw: u8) -> Result<Self, CoreError> {
        if raw < SLOTS_PER_DAY {
            Ok(Self(raw))
        } else {
            Err(CoreError::InvalidTimestamp(format!(
                "slot index {} out of range 0..={}",
                raw,
                SLOTS_PER_DAY - 1
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All 48 indexes of a day, in order.
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOTS_PER_DAY).map(SlotIndex)
    }

    /// Minutes from midnight to the slot's start.
    pub fn minutes_from_midnight(self) -> i64 {
        self.0 as i64 * SLOT_MINUTES
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//=========================================================================================
// Storage-time arithmetic
//=========================================================================================

/// The UTC instant at which a stored `(date, slot)` begins.
pub fn slot_start_utc(date: NaiveDate, slot: SlotIndex) -> DateTime<Utc> {
    (date.and_time(NaiveTime::MIN) + Duration::minutes(slot.minutes_from_midnight())).and_utc()
}

/// The UTC instant at which a stored `(date, slot)` ends.
pub fn slot_end_utc(date: NaiveDate, slot: SlotIndex) -> DateTime<Utc> {
    slot_start_utc(date, slot) + Duration::minutes(SLOT_MINUTES)
}

/// Whether the slot lies in the past: its date is before today (UTC), or it
/// is today and its end time is at or before `now`. Both cases collapse to a
/// single comparison against the slot's end instant.
pub fn is_past(date: NaiveDate, slot: SlotIndex, now: DateTime<Utc>) -> bool {
    slot_end_utc(date, slot) <= now
}

/// Decomposes a UTC instant into its stored `(date, slot)` coordinates.
///
/// The instant must sit exactly on a half-hour boundary; anything else is a
/// malformed timestamp, not a candidate for rounding.
pub fn slot_of_utc(instant: DateTime<Utc>) -> Result<(NaiveDate, SlotIndex), CoreError> {
    let time = instant.time();
    if time.second() != 0 || time.nanosecond() != 0 || time.minute() % SLOT_MINUTES as u32 != 0 {
        return Err(CoreError::InvalidTimestamp(format!(
            "{} is not aligned to a {}-minute slot boundary",
            instant, SLOT_MINUTES
        )));
    }
    let index = (time.hour() * 2 + time.minute() / SLOT_MINUTES as u32) as u8;
    Ok((instant.date_naive(), SlotIndex::new(index)?))
}

//=========================================================================================
// Display-time projection (UTC+7)
//=========================================================================================

/// One slot as the display layer renders it: the calendar date it falls on
/// in display time, plus wall-clock start and end times.
///
/// `end_time` is a clock time only; a slot ending at display midnight reads
/// `00:00:00` while still belonging to `display_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySlot {
    pub display_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl DisplaySlot {
    /// The slot index of this cell within its display-time day grid.
    pub fn slot_index(&self) -> SlotIndex {
        // start_time came from 30-minute-aligned arithmetic, so the raw index
        // is always in range.
        SlotIndex((self.start_time.hour() * 2 + self.start_time.minute() / SLOT_MINUTES as u32) as u8)
    }
}

/// Projects a stored `(date, slot)` into display time. A slot near storage
/// midnight may land on the next display calendar date.
pub fn to_display_time(storage_date: NaiveDate, slot: SlotIndex) -> DisplaySlot {
    let start: NaiveDateTime =
        slot_start_utc(storage_date, slot).naive_utc() + Duration::hours(DISPLAY_OFFSET_HOURS);
    let end = start + Duration::minutes(SLOT_MINUTES);
    DisplaySlot {
        display_date: start.date(),
        start_time: start.time(),
        end_time: end.time(),
    }
}

/// Maps a display-time calendar date and display slot index back to storage
/// coordinates. Inverse of [`to_display_time`].
pub fn to_storage_slot(
    display_date: NaiveDate,
    display_slot: SlotIndex,
) -> (NaiveDate, SlotIndex) {
    let storage: NaiveDateTime = display_date.and_time(NaiveTime::MIN)
        + Duration::minutes(display_slot.minutes_from_midnight())
        - Duration::hours(DISPLAY_OFFSET_HOURS);
    let index = (storage.time().hour() * 2 + storage.time().minute() / SLOT_MINUTES as u32) as u8;
    // Shifting by whole hours keeps the 30-minute alignment, so the index is
    // in range by construction.
    (storage.date(), SlotIndex(index))
}

/// The Monday on or before `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Maps a cell selected in the display-time week grid (week start Monday,
/// day offset within the week, display slot index) to storage coordinates.
/// Display Monday slot 0 correctly lands on the storage Sunday late-night
/// slot.
pub fn to_storage_slot_in_week(
    week_start_monday: NaiveDate,
    day_in_week: u8,
    display_slot: SlotIndex,
) -> Result<(NaiveDate, SlotIndex), CoreError> {
    if week_start_monday.weekday() != Weekday::Mon {
        return Err(CoreError::InvalidTimestamp(format!(
            "{} is not a Monday",
            week_start_monday
        )));
    }
    if day_in_week >= 7 {
        return Err(CoreError::InvalidTimestamp(format!(
            "day offset {} out of range 0..=6",
            day_in_week
        )));
    }
    let display_date = week_start_monday + Duration::days(day_in_week as i64);
    Ok(to_storage_slot(display_date, display_slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(raw: u8) -> SlotIndex {
        SlotIndex::new(raw).unwrap()
    }

    #[test]
    fn rejects_out_of_range_index() {
        let err = SlotIndex::new(48).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp(_)));
    }

    #[test]
    fn slot_start_and_end() {
        let start = slot_start_utc(date(2024, 1, 15), slot(19));
        assert_eq!(start.to_rfc3339(), "2024-01-15T09:30:00+00:00");
        let end = slot_end_utc(date(2024, 1, 15), slot(19));
        assert_eq!(end.to_rfc3339(), "2024-01-15T10:00:00+00:00");
    }

    #[test]
    fn display_projection_shifts_forward_seven_hours() {
        // Storage 20:00 lands on 03:00 of the next display day.
        let display = to_display_time(date(2024, 1, 15), slot(40));
        assert_eq!(display.display_date, date(2024, 1, 16));
        assert_eq!(display.start_time, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
        assert_eq!(display.end_time, NaiveTime::from_hms_opt(3, 30, 0).unwrap());
        assert_eq!(display.slot_index().get(), 6);
    }

    #[test]
    fn display_monday_midnight_is_storage_sunday_evening() {
        // Display Monday 00:00 is storage Sunday 17:00 (slot 34).
        let (storage_date, storage_slot) =
            to_storage_slot_in_week(date(2024, 1, 15), 0, slot(0)).unwrap();
        assert_eq!(storage_date, date(2024, 1, 14));
        assert_eq!(storage_slot.get(), 34);
    }

    #[test]
    fn round_trips_every_slot_of_a_day() {
        for raw in 0..SLOTS_PER_DAY {
            for d in [date(2024, 1, 14), date(2024, 2, 29), date(2024, 12, 31)] {
                let s = slot(raw);
                let display = to_display_time(d, s);
                let (back_date, back_slot) =
                    to_storage_slot(display.display_date, display.slot_index());
                assert_eq!((back_date, back_slot), (d, s), "slot {} on {}", raw, d);
            }
        }
    }

    #[test]
    fn week_grid_mapping_round_trips() {
        let monday = date(2024, 4, 15);
        for day in 0..7u8 {
            for raw in [0, 13, 47] {
                let (storage_date, storage_slot) =
                    to_storage_slot_in_week(monday, day, slot(raw)).unwrap();
                let display = to_display_time(storage_date, storage_slot);
                assert_eq!(
                    display.display_date,
                    monday + Duration::days(day as i64)
                );
                assert_eq!(display.slot_index().get(), raw);
            }
        }
    }

    #[test]
    fn monday_of_snaps_backwards() {
        assert_eq!(monday_of(date(2024, 4, 15)), date(2024, 4, 15));
        assert_eq!(monday_of(date(2024, 4, 18)), date(2024, 4, 15));
        assert_eq!(monday_of(date(2024, 4, 21)), date(2024, 4, 15));
    }

    #[test]
    fn rejects_week_start_that_is_not_monday() {
        let err = to_storage_slot_in_week(date(2024, 1, 16), 0, slot(0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp(_)));
    }

    #[test]
    fn rejects_day_offset_past_sunday() {
        let err = to_storage_slot_in_week(date(2024, 1, 15), 7, slot(0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp(_)));
    }

    #[test]
    fn slot_of_utc_requires_alignment() {
        let aligned = date(2024, 1, 15).and_hms_opt(9, 30, 0).unwrap().and_utc();
        assert_eq!(slot_of_utc(aligned).unwrap(), (date(2024, 1, 15), slot(19)));

        let skewed = date(2024, 1, 15).and_hms_opt(9, 45, 0).unwrap().and_utc();
        assert!(matches!(
            slot_of_utc(skewed),
            Err(CoreError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn past_check_uses_slot_end() {
        let now = date(2024, 1, 15).and_hms_opt(10, 0, 0).unwrap().and_utc();
        // Ends exactly at `now`: past.
        assert!(is_past(date(2024, 1, 15), slot(19), now));
        // Still running: not past.
        assert!(!is_past(date(2024, 1, 15), slot(20), now));
        // Yesterday: past regardless of time.
        assert!(is_past(date(2024, 1, 14), slot(47), now));
    }
}
