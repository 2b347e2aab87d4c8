//! crates/tutoring_core/src/matrix.rs
//!
//! Builds the day-by-day, slot-by-slot availability grid for a tutor's
//! schedule window by reconciling the resolved weekly pattern against
//! occupancy records (bookings, on-hold offers) and pending reschedule
//! reservations. The grid is a snapshot: consumers rebuild it fresh from
//! source records before every submission rather than mutating it in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::clock::{self, SlotIndex, SLOTS_PER_DAY};
use crate::domain::WeeklyAvailabilityPattern;

/// Render state of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCellStatus {
    /// Open in the pattern, unoccupied, not in the past.
    Available,
    /// Temporarily reserved: targeted by an unaccepted offer or by a pending
    /// reschedule request.
    OnHold,
    /// An active booked slot occupies the cell.
    Booked,
    /// Closed in the pattern, or in the past.
    Unavailable,
}

/// How a cell is occupied according to the backend's schedule window. The
/// wire encoding (0=open, 1=onhold, 2=booked) is decoded at the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyKind {
    Open,
    OnHold,
    Booked,
}

/// One occupied cell reported by the backend for a schedule window.
#[derive(Debug, Clone, Copy)]
pub struct SlotOccupancy {
    pub date: NaiveDate,
    pub slot_index: SlotIndex,
    pub kind: OccupancyKind,
}

/// The 48 cells of one calendar date, in slot order.
#[derive(Debug, Clone)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub cells: [SlotCellStatus; SLOTS_PER_DAY as usize],
}

/// A date-range grid of cell statuses.
#[derive(Debug, Clone)]
pub struct SlotAvailabilityMatrix {
    days: BTreeMap<NaiveDate, [SlotCellStatus; SLOTS_PER_DAY as usize]>,
}

impl SlotAvailabilityMatrix {
    /// Builds the grid for `start_date..=end_date`.
    ///
    /// Cell precedence, highest first:
    /// 1. `Booked` occupancy always wins, even when the pattern no longer
    ///    opens the cell or the cell is in the past, since the booking was
    ///    made under a previously valid pattern.
    /// 2. `OnHold` occupancy and reschedule reservations, unless past.
    /// 3. Pattern-open cells are `Available`, unless past.
    /// 4. Everything else is `Unavailable`.
    pub fn build(
        pattern: Option<&WeeklyAvailabilityPattern>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        occupancies: &[SlotOccupancy],
        reserved: &[(NaiveDate, SlotIndex)],
        now: DateTime<Utc>,
    ) -> Self {
        let mut days = BTreeMap::new();

        let mut date = start_date;
        while date <= end_date {
            let day_in_week = date.weekday().num_days_from_monday() as usize;
            let mut cells = [SlotCellStatus::Unavailable; SLOTS_PER_DAY as usize];
            for slot in SlotIndex::all() {
                let open = pattern.map_or(false, |p| p.is_open(day_in_week, slot));
                if open && !clock::is_past(date, slot, now) {
                    cells[slot.get() as usize] = SlotCellStatus::Available;
                }
            }
            days.insert(date, cells);
            date = date + Duration::days(1);
        }

        let mut matrix = Self { days };
        for &(date, slot) in reserved {
            matrix.hold(date, slot, now);
        }
        for occ in occupancies {
            match occ.kind {
                OccupancyKind::Open => {}
                OccupancyKind::OnHold => matrix.hold(occ.date, occ.slot_index, now),
                OccupancyKind::Booked => matrix.set(occ.date, occ.slot_index, SlotCellStatus::Booked),
            }
        }
        matrix
    }

    /// Cell status at `(date, slot)`. Dates outside the built range read as
    /// `Unavailable`.
    pub fn cell(&self, date: NaiveDate, slot: SlotIndex) -> SlotCellStatus {
        self.days
            .get(&date)
            .map(|cells| cells[slot.get() as usize])
            .unwrap_or(SlotCellStatus::Unavailable)
    }

    /// The grid as per-day rows for rendering.
    pub fn day_schedules(&self) -> Vec<DaySchedule> {
        self.days
            .iter()
            .map(|(&date, &cells)| DaySchedule { date, cells })
            .collect()
    }

    fn set(&mut self, date: NaiveDate, slot: SlotIndex, status: SlotCellStatus) {
        if let Some(cells) = self.days.get_mut(&date) {
            cells[slot.get() as usize] = status;
        }
    }

    fn hold(&mut self, date: NaiveDate, slot: SlotIndex, now: DateTime<Utc>) {
        if clock::is_past(date, slot, now) {
            return;
        }
        if let Some(cells) = self.days.get_mut(&date) {
            let cell = &mut cells[slot.get() as usize];
            // A booked cell never downgrades to on-hold.
            if *cell != SlotCellStatus::Booked {
                *cell = SlotCellStatus::OnHold;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeeklyAvailabilityPattern;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(raw: u8) -> SlotIndex {
        SlotIndex::new(raw).unwrap()
    }

    /// Pattern opening slots 18..=21 every weekday, nothing on weekends.
    fn weekday_pattern() -> WeeklyAvailabilityPattern {
        let open: BTreeSet<SlotIndex> = (18..=21).map(slot).collect();
        WeeklyAvailabilityPattern {
            id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            applied_from: date(2024, 1, 1),
            created_seq: 1,
            open_slots: [
                open.clone(),
                open.clone(),
                open.clone(),
                open.clone(),
                open,
                BTreeSet::new(),
                BTreeSet::new(),
            ],
        }
    }

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        date(y, m, d).and_hms_opt(12, 0, 0).unwrap().and_utc()
    }

    #[test]
    fn pattern_open_cells_are_available() {
        let pattern = weekday_pattern();
        let matrix = SlotAvailabilityMatrix::build(
            Some(&pattern),
            date(2024, 4, 15),
            date(2024, 4, 21),
            &[],
            &[],
            noon(2024, 4, 1),
        );
        // Monday, inside the pattern.
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(18)), SlotCellStatus::Available);
        // Monday, outside the pattern.
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(10)), SlotCellStatus::Unavailable);
        // Saturday: weekends closed.
        assert_eq!(matrix.cell(date(2024, 4, 20), slot(18)), SlotCellStatus::Unavailable);
    }

    #[test]
    fn occupancies_override_pattern() {
        let pattern = weekday_pattern();
        let occupancies = [
            SlotOccupancy {
                date: date(2024, 4, 15),
                slot_index: slot(18),
                kind: OccupancyKind::Booked,
            },
            SlotOccupancy {
                date: date(2024, 4, 15),
                slot_index: slot(19),
                kind: OccupancyKind::OnHold,
            },
        ];
        let matrix = SlotAvailabilityMatrix::build(
            Some(&pattern),
            date(2024, 4, 15),
            date(2024, 4, 21),
            &occupancies,
            &[],
            noon(2024, 4, 1),
        );
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(18)), SlotCellStatus::Booked);
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(19)), SlotCellStatus::OnHold);
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(20)), SlotCellStatus::Available);
    }

    #[test]
    fn booked_wins_over_pattern_closed_cell() {
        // Booked on a Saturday the pattern never opened: the booking was made
        // under an older pattern and must stay visible.
        let pattern = weekday_pattern();
        let occupancies = [SlotOccupancy {
            date: date(2024, 4, 20),
            slot_index: slot(18),
            kind: OccupancyKind::Booked,
        }];
        let matrix = SlotAvailabilityMatrix::build(
            Some(&pattern),
            date(2024, 4, 15),
            date(2024, 4, 21),
            &occupancies,
            &[],
            noon(2024, 4, 1),
        );
        assert_eq!(matrix.cell(date(2024, 4, 20), slot(18)), SlotCellStatus::Booked);
    }

    #[test]
    fn past_cells_are_unavailable_unless_booked() {
        let pattern = weekday_pattern();
        // Wednesday 10:00 UTC.
        let now = date(2024, 4, 17).and_hms_opt(10, 0, 0).unwrap().and_utc();
        let occupancies = [SlotOccupancy {
            date: date(2024, 4, 15),
            slot_index: slot(18),
            kind: OccupancyKind::Booked,
        }];
        let matrix = SlotAvailabilityMatrix::build(
            Some(&pattern),
            date(2024, 4, 15),
            date(2024, 4, 21),
            &occupancies,
            &[],
            now,
        );
        // Monday has gone by: open-but-unoccupied cells no longer sell.
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(19)), SlotCellStatus::Unavailable);
        // The booked one is still rendered as booked history.
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(18)), SlotCellStatus::Booked);
        // Today: slot 19 (09:30-10:00) ended exactly at `now`, slot 20 is live.
        assert_eq!(matrix.cell(date(2024, 4, 17), slot(19)), SlotCellStatus::Unavailable);
        assert_eq!(matrix.cell(date(2024, 4, 17), slot(20)), SlotCellStatus::Available);
    }

    #[test]
    fn reschedule_reservations_render_on_hold() {
        let pattern = weekday_pattern();
        let reserved = [(date(2024, 4, 16), slot(20))];
        let matrix = SlotAvailabilityMatrix::build(
            Some(&pattern),
            date(2024, 4, 15),
            date(2024, 4, 21),
            &[],
            &reserved,
            noon(2024, 4, 1),
        );
        assert_eq!(matrix.cell(date(2024, 4, 16), slot(20)), SlotCellStatus::OnHold);
    }

    #[test]
    fn no_pattern_means_everything_closed() {
        let matrix = SlotAvailabilityMatrix::build(
            None,
            date(2024, 4, 15),
            date(2024, 4, 21),
            &[],
            &[],
            noon(2024, 4, 1),
        );
        assert_eq!(matrix.cell(date(2024, 4, 15), slot(18)), SlotCellStatus::Unavailable);
    }

    #[test]
    fn out_of_range_dates_read_unavailable() {
        let pattern = weekday_pattern();
        let matrix = SlotAvailabilityMatrix::build(
            Some(&pattern),
            date(2024, 4, 15),
            date(2024, 4, 21),
            &[],
            &[],
            noon(2024, 4, 1),
        );
        assert_eq!(matrix.cell(date(2024, 4, 22), slot(18)), SlotCellStatus::Unavailable);
    }
}
