//! crates/tutoring_core/src/selector.rs
//!
//! Selection state for building or editing an offer across multiple weeks of
//! the display-time grid. Selections made in one week survive navigation to
//! another; on submit everything is flattened into one chronologically
//! ordered slot list with every start instant recomputed from its grid
//! coordinates, never read back from a cached value.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::clock::{self, SlotIndex};
use crate::domain::{Offer, OfferedSlot};
use crate::error::CoreError;
use crate::matrix::SlotCellStatus;

/// One selected cell: display-grid coordinates plus the storage-time start
/// instant computed when the cell was toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSelection {
    pub day_in_week: u8,
    pub slot_index: SlotIndex,
    pub slot_date_time: DateTime<Utc>,
}

/// Change summary between an offer's previous and next slot lists, used for
/// user-facing update messages only; validation is identical for create and
/// update.
#[derive(Debug, Clone, Default)]
pub struct SlotSelectionDiff {
    pub added: Vec<OfferedSlot>,
    pub removed: Vec<OfferedSlot>,
}

#[derive(Debug, Clone)]
struct EditingOffer {
    offer_id: Uuid,
    /// The storage cells the offer already holds, recomputed from its stored
    /// start instants so week-boundary cells cannot drift.
    own_cells: BTreeSet<(NaiveDate, SlotIndex)>,
}

/// Per-week selection state owned by the offer editor.
#[derive(Debug, Clone, Default)]
pub struct OfferSlotSelector {
    selections: BTreeMap<NaiveDate, Vec<SlotSelection>>,
    editing: Option<EditingOffer>,
}

impl OfferSlotSelector {
    /// Selector for a brand-new offer: nothing selected, no own cells.
    pub fn for_new_offer() -> Self {
        Self::default()
    }

    /// Selector editing an existing offer. The offer's slots start out
    /// selected, and its own on-hold cells stay selectable.
    pub fn for_offer(offer: &Offer) -> Result<Self, CoreError> {
        let own_cells = offer.storage_cells()?;
        let mut selector = Self {
            selections: BTreeMap::new(),
            editing: Some(EditingOffer {
                offer_id: offer.id,
                own_cells,
            }),
        };
        for slot in &offer.slots {
            let (storage_date, storage_slot) = clock::slot_of_utc(slot.slot_date_time)?;
            let display = clock::to_display_time(storage_date, storage_slot);
            let week_start = clock::monday_of(display.display_date);
            let day_in_week = (display.display_date - week_start).num_days() as u8;
            selector
                .selections
                .entry(week_start)
                .or_default()
                .push(SlotSelection {
                    day_in_week,
                    slot_index: display.slot_index(),
                    slot_date_time: slot.slot_date_time,
                });
        }
        Ok(selector)
    }

    /// The offer being edited, if any.
    pub fn offer_id(&self) -> Option<Uuid> {
        self.editing.as_ref().map(|e| e.offer_id)
    }

    pub fn is_selected(&self, week_start: NaiveDate, day_in_week: u8, slot: SlotIndex) -> bool {
        self.selections
            .get(&week_start)
            .map(|week| {
                week.iter()
                    .any(|s| s.day_in_week == day_in_week && s.slot_index == slot)
            })
            .unwrap_or(false)
    }

    pub fn selected_count(&self) -> usize {
        self.selections.values().map(Vec::len).sum()
    }

    /// Every current selection with the week it belongs to, in week order.
    pub fn selections(&self) -> impl Iterator<Item = (NaiveDate, &SlotSelection)> {
        self.selections
            .iter()
            .flat_map(|(&week_start, week)| week.iter().map(move |s| (week_start, s)))
    }

    /// Whether the cell may be selected: `Available` always; `OnHold` only
    /// when it is one of the edited offer's own still-pending cells; `Booked`
    /// and `Unavailable` never; past cells never, regardless of status.
    pub fn can_select(
        &self,
        cell: SlotCellStatus,
        week_start: NaiveDate,
        day_in_week: u8,
        slot: SlotIndex,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let (storage_date, storage_slot) =
            clock::to_storage_slot_in_week(week_start, day_in_week, slot)?;
        if clock::is_past(storage_date, storage_slot, now) {
            return Ok(false);
        }
        let selectable = match cell {
            SlotCellStatus::Available => true,
            SlotCellStatus::OnHold => self
                .editing
                .as_ref()
                .map(|e| e.own_cells.contains(&(storage_date, storage_slot)))
                .unwrap_or(false),
            SlotCellStatus::Booked | SlotCellStatus::Unavailable => false,
        };
        Ok(selectable)
    }

    /// Toggles the cell. Returns `true` when the cell ends up selected,
    /// `false` when it was deselected. A rejected toggle fails with
    /// [`CoreError::TargetSlotUnavailable`] and leaves all selections
    /// untouched.
    pub fn toggle(
        &mut self,
        cell: SlotCellStatus,
        week_start: NaiveDate,
        day_in_week: u8,
        slot: SlotIndex,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        if self.is_selected(week_start, day_in_week, slot) {
            if let Some(week) = self.selections.get_mut(&week_start) {
                week.retain(|s| !(s.day_in_week == day_in_week && s.slot_index == slot));
                if week.is_empty() {
                    self.selections.remove(&week_start);
                }
            }
            return Ok(false);
        }

        let (storage_date, storage_slot) =
            clock::to_storage_slot_in_week(week_start, day_in_week, slot)?;
        if !self.can_select(cell, week_start, day_in_week, slot, now)? {
            return Err(CoreError::TargetSlotUnavailable {
                date: storage_date,
                slot_index: storage_slot,
            });
        }
        self.selections
            .entry(week_start)
            .or_default()
            .push(SlotSelection {
                day_in_week,
                slot_index: slot,
                slot_date_time: clock::slot_start_utc(storage_date, storage_slot),
            });
        Ok(true)
    }

    /// Flattens every week's selections into one chronologically ordered
    /// list, recomputing each start instant from `(week_start, day_in_week,
    /// slot_index)` so stale cached values cannot drift. Empty selections are
    /// rejected with [`CoreError::NoSlotsSelected`].
    pub fn submit(&self) -> Result<Vec<OfferedSlot>, CoreError> {
        let mut slots = Vec::with_capacity(self.selected_count());
        for (&week_start, week) in &self.selections {
            for selection in week {
                let (storage_date, storage_slot) = clock::to_storage_slot_in_week(
                    week_start,
                    selection.day_in_week,
                    selection.slot_index,
                )?;
                slots.push(OfferedSlot {
                    slot_date_time: clock::slot_start_utc(storage_date, storage_slot),
                    slot_index: storage_slot,
                });
            }
        }
        if slots.is_empty() {
            return Err(CoreError::NoSlotsSelected);
        }
        slots.sort_by_key(|s| s.slot_date_time);
        Ok(slots)
    }
}

/// Added/removed lists between two slot sets, keyed on the storage start
/// instant.
pub fn diff_slots(previous: &[OfferedSlot], next: &[OfferedSlot]) -> SlotSelectionDiff {
    let prev_keys: BTreeSet<DateTime<Utc>> = previous.iter().map(|s| s.slot_date_time).collect();
    let next_keys: BTreeSet<DateTime<Utc>> = next.iter().map(|s| s.slot_date_time).collect();
    SlotSelectionDiff {
        added: next
            .iter()
            .filter(|s| !prev_keys.contains(&s.slot_date_time))
            .copied()
            .collect(),
        removed: previous
            .iter()
            .filter(|s| !next_keys.contains(&s.slot_date_time))
            .copied()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(raw: u8) -> SlotIndex {
        SlotIndex::new(raw).unwrap()
    }

    fn far_before() -> DateTime<Utc> {
        date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap().and_utc()
    }

    fn offer_with_storage_slots(cells: &[(NaiveDate, u8)]) -> Offer {
        let slots: Vec<OfferedSlot> = cells
            .iter()
            .map(|&(d, raw)| OfferedSlot {
                slot_date_time: clock::slot_start_utc(d, slot(raw)),
                slot_index: slot(raw),
            })
            .collect();
        let now = far_before();
        Offer {
            id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            learner_id: Uuid::new_v4(),
            price_per_slot_cents: 25_00,
            total_price_cents: 25_00 * slots.len() as i64,
            duration_minutes: 30,
            expires_at: now + Duration::hours(48),
            created_at: now,
            updated_at: now,
            slots,
        }
    }

    #[test]
    fn available_cell_is_selectable_for_new_offer() {
        let selector = OfferSlotSelector::for_new_offer();
        let ok = selector
            .can_select(SlotCellStatus::Available, date(2024, 4, 15), 1, slot(34), far_before())
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn on_hold_cell_selectable_only_for_its_own_offer() {
        // Storage Tuesday 2024-04-16 10:00 (slot 20) displays as Tuesday
        // 17:00 (display slot 34) in the week starting Monday 2024-04-15.
        let offer = offer_with_storage_slots(&[(date(2024, 4, 16), 20)]);
        let editing = OfferSlotSelector::for_offer(&offer).unwrap();
        let fresh = OfferSlotSelector::for_new_offer();

        let ok = editing
            .can_select(SlotCellStatus::OnHold, date(2024, 4, 15), 1, slot(34), far_before())
            .unwrap();
        assert!(ok, "an offer can re-select its own pending slot");

        let not_ok = fresh
            .can_select(SlotCellStatus::OnHold, date(2024, 4, 15), 1, slot(34), far_before())
            .unwrap();
        assert!(!not_ok, "a different offer cannot take the held slot");
    }

    #[test]
    fn booked_and_past_cells_are_never_selectable() {
        let selector = OfferSlotSelector::for_new_offer();
        let booked = selector
            .can_select(SlotCellStatus::Booked, date(2024, 4, 15), 1, slot(34), far_before())
            .unwrap();
        assert!(!booked);

        // `now` long after the cell has passed: even an Available cell is out.
        let late = date(2024, 5, 1).and_hms_opt(0, 0, 0).unwrap().and_utc();
        let past = selector
            .can_select(SlotCellStatus::Available, date(2024, 4, 15), 1, slot(34), late)
            .unwrap();
        assert!(!past);
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut selector = OfferSlotSelector::for_new_offer();
        let selected = selector
            .toggle(SlotCellStatus::Available, date(2024, 4, 15), 1, slot(34), far_before())
            .unwrap();
        assert!(selected);
        assert!(selector.is_selected(date(2024, 4, 15), 1, slot(34)));

        let selected = selector
            .toggle(SlotCellStatus::Available, date(2024, 4, 15), 1, slot(34), far_before())
            .unwrap();
        assert!(!selected);
        assert_eq!(selector.selected_count(), 0);
    }

    #[test]
    fn rejected_toggle_leaves_state_unchanged() {
        let mut selector = OfferSlotSelector::for_new_offer();
        selector
            .toggle(SlotCellStatus::Available, date(2024, 4, 15), 1, slot(34), far_before())
            .unwrap();

        let err = selector
            .toggle(SlotCellStatus::Booked, date(2024, 4, 15), 2, slot(34), far_before())
            .unwrap_err();
        assert!(matches!(err, CoreError::TargetSlotUnavailable { .. }));
        assert_eq!(selector.selected_count(), 1);
    }

    #[test]
    fn selections_survive_week_navigation_and_submit_sorted() {
        let mut selector = OfferSlotSelector::for_new_offer();
        // Select in the later week first, then go back one week.
        selector
            .toggle(SlotCellStatus::Available, date(2024, 4, 22), 0, slot(20), far_before())
            .unwrap();
        selector
            .toggle(SlotCellStatus::Available, date(2024, 4, 15), 4, slot(30), far_before())
            .unwrap();
        assert_eq!(selector.selected_count(), 2);

        let slots = selector.submit().unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots[0].slot_date_time < slots[1].slot_date_time);
        // Each instant is recomputed from its grid coordinates.
        let (d0, s0) = clock::to_storage_slot_in_week(date(2024, 4, 15), 4, slot(30)).unwrap();
        assert_eq!(slots[0].slot_date_time, clock::slot_start_utc(d0, s0));
    }

    #[test]
    fn empty_submission_is_rejected() {
        let selector = OfferSlotSelector::for_new_offer();
        let err = selector.submit().unwrap_err();
        assert!(matches!(err, CoreError::NoSlotsSelected));
    }

    #[test]
    fn editing_selector_starts_with_offer_slots_selected() {
        let offer =
            offer_with_storage_slots(&[(date(2024, 4, 16), 20), (date(2024, 4, 23), 20)]);
        let selector = OfferSlotSelector::for_offer(&offer).unwrap();
        assert_eq!(selector.selected_count(), 2);
        let resubmitted = selector.submit().unwrap();
        assert_eq!(resubmitted, offer.slots);
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let before = offer_with_storage_slots(&[(date(2024, 4, 16), 20), (date(2024, 4, 17), 20)]);
        let after = offer_with_storage_slots(&[(date(2024, 4, 17), 20), (date(2024, 4, 18), 20)]);
        let diff = diff_slots(&before.slots, &after.slots);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].slot_date_time.date_naive(), date(2024, 4, 18));
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].slot_date_time.date_naive(), date(2024, 4, 16));
    }
}
