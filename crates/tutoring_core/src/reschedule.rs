//! crates/tutoring_core/src/reschedule.rs
//!
//! Single-slot reschedule workflow: a proposal to move one booked slot to a
//! new `(date, slot)`, raised with at least 24h notice and answered within
//! 24h. While a request is pending its target cell counts as reserved, so
//! neither new bookings nor offer selections can race it.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::clock::{self, SlotIndex};
use crate::domain::{
    BookedSlot, BookedSlotStatus, RescheduleRequest, RescheduleStatus,
};
use crate::error::CoreError;

/// Minimum notice before the original slot's start.
pub const NOTICE_HOURS: i64 = 24;

/// How long an unanswered request stays valid.
pub const RESPONSE_WINDOW_HOURS: i64 = 24;

/// The counterparty's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleDecision {
    Accept,
    Reject,
}

/// Validates and creates a reschedule request for `original`.
///
/// Preconditions, each with its own error: the original slot is still
/// `Pending`; the reason is non-empty; `now` is at least [`NOTICE_HOURS`]
/// before the original start; and the target cell is `Available` in the
/// freshly built matrix (a booked cell can never be double-booked by a
/// reschedule.
pub fn create_request(
    original: &BookedSlot,
    reason: &str,
    new_date: NaiveDate,
    new_slot: SlotIndex,
    matrix: &crate::matrix::SlotAvailabilityMatrix,
    now: DateTime<Utc>,
) -> Result<RescheduleRequest, CoreError> {
    if original.status != BookedSlotStatus::Pending {
        return Err(CoreError::SlotNotPending {
            slot_id: original.id,
            status: original.status,
        });
    }
    if reason.trim().is_empty() {
        return Err(CoreError::EmptyReasonRequired);
    }
    let starts_at = original.starts_at();
    if now + Duration::hours(NOTICE_HOURS) > starts_at {
        return Err(CoreError::TooLateToReschedule { starts_at });
    }
    if matrix.cell(new_date, new_slot) != crate::matrix::SlotCellStatus::Available {
        return Err(CoreError::TargetSlotUnavailable {
            date: new_date,
            slot_index: new_slot,
        });
    }

    Ok(RescheduleRequest {
        id: Uuid::new_v4(),
        booked_slot_id: original.id,
        reason: reason.trim().to_string(),
        new_slot_date_time: clock::slot_start_utc(new_date, new_slot),
        new_slot_index: new_slot,
        status: RescheduleStatus::PendingResponse,
        requested_at: now,
    })
}

/// Expires an unanswered request in place once its window lapses. Returns
/// whether the request is now expired; the original slot reverts unchanged
/// (it was never modified while pending).
pub fn expire_if_stale(request: &mut RescheduleRequest, now: DateTime<Utc>) -> bool {
    if request.is_expired(now) {
        request.status = RescheduleStatus::Rejected;
        return true;
    }
    false
}

/// Applies the counterparty's decision. Accepting moves the original slot to
/// the proposed `(date, slot)`; rejecting leaves it untouched. A request
/// that is no longer pending, or whose response window has lapsed, fails
/// with [`CoreError::RequestNotPending`].
pub fn respond(
    request: &mut RescheduleRequest,
    original: &mut BookedSlot,
    decision: RescheduleDecision,
    now: DateTime<Utc>,
) -> Result<(), CoreError> {
    if expire_if_stale(request, now) || request.status != RescheduleStatus::PendingResponse {
        return Err(CoreError::RequestNotPending(request.id));
    }
    if original.id != request.booked_slot_id {
        return Err(CoreError::SlotNotFound(request.booked_slot_id));
    }

    match decision {
        RescheduleDecision::Accept => {
            // The session must still be ahead of us; a slot that has since
            // completed or cancelled cannot move.
            if original.status != BookedSlotStatus::Pending {
                return Err(CoreError::SlotNotPending {
                    slot_id: original.id,
                    status: original.status,
                });
            }
            original.booked_date = request.new_slot_date_time.date_naive();
            original.slot_index = request.new_slot_index;
            request.status = RescheduleStatus::Accepted;
        }
        RescheduleDecision::Reject => {
            request.status = RescheduleStatus::Rejected;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeeklyAvailabilityPattern;
    use crate::matrix::SlotAvailabilityMatrix;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(raw: u8) -> SlotIndex {
        SlotIndex::new(raw).unwrap()
    }

    fn pending_slot(d: NaiveDate, raw: u8) -> BookedSlot {
        BookedSlot {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            booked_date: d,
            slot_index: slot(raw),
            status: BookedSlotStatus::Pending,
            note: None,
            held_fund: None,
        }
    }

    /// Matrix over one week with slots 18..=21 open every day.
    fn open_matrix(now: DateTime<Utc>) -> SlotAvailabilityMatrix {
        let open: BTreeSet<SlotIndex> = (18..=21).map(slot).collect();
        let pattern = WeeklyAvailabilityPattern {
            id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            applied_from: date(2024, 1, 1),
            created_seq: 1,
            open_slots: [
                open.clone(),
                open.clone(),
                open.clone(),
                open.clone(),
                open.clone(),
                open.clone(),
                open,
            ],
        };
        SlotAvailabilityMatrix::build(
            Some(&pattern),
            date(2024, 4, 15),
            date(2024, 4, 21),
            &[],
            &[],
            now,
        )
    }

    #[test]
    fn notice_window_boundary() {
        // Original slot: Wednesday 2024-04-17 at 09:00 (slot 18).
        let original = pending_slot(date(2024, 4, 17), 18);
        let starts_at = original.starts_at();
        let target = (date(2024, 4, 18), slot(19));

        // 23h50m before: too late.
        let now = starts_at - Duration::minutes(23 * 60 + 50);
        let err =
            create_request(&original, "conflict", target.0, target.1, &open_matrix(now), now)
                .unwrap_err();
        assert!(matches!(err, CoreError::TooLateToReschedule { .. }));

        // 24h01m before: fine.
        let now = starts_at - Duration::minutes(24 * 60 + 1);
        let request =
            create_request(&original, "conflict", target.0, target.1, &open_matrix(now), now)
                .unwrap();
        assert_eq!(request.status, RescheduleStatus::PendingResponse);
        assert_eq!(request.target_cell(), target);
    }

    #[test]
    fn exactly_24h_notice_is_accepted() {
        let original = pending_slot(date(2024, 4, 17), 18);
        let now = original.starts_at() - Duration::hours(NOTICE_HOURS);
        let request = create_request(
            &original,
            "conflict",
            date(2024, 4, 18),
            slot(19),
            &open_matrix(now),
            now,
        );
        assert!(request.is_ok());
    }

    #[test]
    fn rejects_non_pending_original() {
        let mut original = pending_slot(date(2024, 4, 17), 18);
        original.status = BookedSlotStatus::AwaitingConfirmation;
        let now = original.starts_at() - Duration::hours(48);
        let err = create_request(
            &original,
            "conflict",
            date(2024, 4, 18),
            slot(19),
            &open_matrix(now),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::SlotNotPending { .. }));
    }

    #[test]
    fn rejects_unavailable_target() {
        let original = pending_slot(date(2024, 4, 17), 18);
        let now = original.starts_at() - Duration::hours(48);
        // Slot 10 is never opened by the pattern.
        let err = create_request(
            &original,
            "conflict",
            date(2024, 4, 18),
            slot(10),
            &open_matrix(now),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::TargetSlotUnavailable { .. }));
    }

    #[test]
    fn rejects_empty_reason() {
        let original = pending_slot(date(2024, 4, 17), 18);
        let now = original.starts_at() - Duration::hours(48);
        let err = create_request(
            &original,
            "   ",
            date(2024, 4, 18),
            slot(19),
            &open_matrix(now),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::EmptyReasonRequired));
    }

    #[test]
    fn accept_moves_the_slot() {
        let mut original = pending_slot(date(2024, 4, 17), 18);
        let now = original.starts_at() - Duration::hours(48);
        let mut request = create_request(
            &original,
            "conflict",
            date(2024, 4, 18),
            slot(19),
            &open_matrix(now),
            now,
        )
        .unwrap();

        respond(&mut request, &mut original, RescheduleDecision::Accept, now).unwrap();
        assert_eq!(request.status, RescheduleStatus::Accepted);
        assert_eq!(original.booked_date, date(2024, 4, 18));
        assert_eq!(original.slot_index, slot(19));
        assert_eq!(original.status, BookedSlotStatus::Pending);
    }

    #[test]
    fn reject_leaves_the_slot_unchanged() {
        let mut original = pending_slot(date(2024, 4, 17), 18);
        let now = original.starts_at() - Duration::hours(48);
        let mut request = create_request(
            &original,
            "conflict",
            date(2024, 4, 18),
            slot(19),
            &open_matrix(now),
            now,
        )
        .unwrap();

        respond(&mut request, &mut original, RescheduleDecision::Reject, now).unwrap();
        assert_eq!(request.status, RescheduleStatus::Rejected);
        assert_eq!(original.booked_date, date(2024, 4, 17));
        assert_eq!(original.slot_index, slot(18));

        // A settled request cannot be answered twice.
        let err =
            respond(&mut request, &mut original, RescheduleDecision::Accept, now).unwrap_err();
        assert!(matches!(err, CoreError::RequestNotPending(_)));
    }

    #[test]
    fn unanswered_request_lapses_after_its_window() {
        let mut original = pending_slot(date(2024, 4, 20), 18);
        let now = original.starts_at() - Duration::hours(72);
        let mut request = create_request(
            &original,
            "conflict",
            date(2024, 4, 21),
            slot(19),
            &open_matrix(now),
            now,
        )
        .unwrap();

        let late = now + Duration::hours(RESPONSE_WINDOW_HOURS);
        let err =
            respond(&mut request, &mut original, RescheduleDecision::Accept, late).unwrap_err();
        assert!(matches!(err, CoreError::RequestNotPending(_)));
        assert_eq!(request.status, RescheduleStatus::Rejected);
        // Original slot reverts unchanged.
        assert_eq!(original.booked_date, date(2024, 4, 20));
        assert_eq!(original.slot_index, slot(18));
    }
}
