//! crates/tutoring_core/src/lifecycle.rs
//!
//! State machine for bookings, their slots and held funds.
//!
//! Booking: `Confirmed -> {DisputeRequested, Cancelled, Complete}`,
//! `DisputeRequested -> {Disputed, Confirmed}`, `Disputed -> {Cancelled,
//! Complete}`. Slot: `Pending -> {AwaitingConfirmation, Cancelled}`,
//! `AwaitingConfirmation -> {Completed, CancelledDisputed}`. Slots within a
//! booking complete strictly in chronological order; completion is
//! idempotent so a retried request after a timeout is a no-op rather than an
//! error.

use uuid::Uuid;

use crate::dispute;
use crate::domain::{
    BookedSlotStatus, Booking, BookingStatus, Dispute, HeldFundStatus,
};
use crate::error::CoreError;

/// What a completion call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The slot transitioned on this call.
    Transitioned,
    /// The slot had already been completed; nothing changed.
    AlreadyCompleted,
}

/// Marks a slot's session as held: `Pending -> AwaitingConfirmation`,
/// opening the 24h grace window in which the learner may dispute.
///
/// Only the chronologically first `Pending` slot of the booking may
/// complete; anything later fails with [`CoreError::OutOfOrderCompletion`].
/// Calling again on an already-completed slot reports
/// [`CompletionOutcome::AlreadyCompleted`] without touching state.
pub fn complete_slot(booking: &mut Booking, slot_id: Uuid) -> Result<CompletionOutcome, CoreError> {
    if booking.status.is_terminal() {
        return Err(CoreError::BookingAlreadyTerminal {
            booking_id: booking.id,
            status: booking.status,
        });
    }

    let target = booking
        .slot(slot_id)
        .ok_or(CoreError::SlotNotFound(slot_id))?;

    match target.status {
        BookedSlotStatus::AwaitingConfirmation | BookedSlotStatus::Completed => {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        BookedSlotStatus::Pending => {}
        status @ (BookedSlotStatus::Cancelled | BookedSlotStatus::CancelledDisputed) => {
            return Err(CoreError::SlotNotPending { slot_id, status });
        }
    }

    let target_key = target.chronological_key();
    let has_earlier_pending = booking.slots.iter().any(|s| {
        s.id != slot_id
            && s.status == BookedSlotStatus::Pending
            && s.chronological_key() < target_key
    });
    if has_earlier_pending {
        return Err(CoreError::OutOfOrderCompletion { slot_id });
    }

    // Lookup above guarantees the slot exists.
    if let Some(slot) = booking.slot_mut(slot_id) {
        slot.status = BookedSlotStatus::AwaitingConfirmation;
    }
    Ok(CompletionOutcome::Transitioned)
}

/// Finalizes a held slot once its grace window has lapsed without an open
/// dispute: `AwaitingConfirmation -> Completed`, and the slot's escrow moves
/// `Held -> ReleasedToTutor`. Driven by the external grace/release timer
/// through the backend, so it is idempotent like [`complete_slot`].
pub fn finalize_slot(
    booking: &mut Booking,
    slot_id: Uuid,
    disputes: &[Dispute],
) -> Result<CompletionOutcome, CoreError> {
    let target = booking
        .slot(slot_id)
        .ok_or(CoreError::SlotNotFound(slot_id))?;

    match target.status {
        BookedSlotStatus::Completed => return Ok(CompletionOutcome::AlreadyCompleted),
        BookedSlotStatus::AwaitingConfirmation => {}
        status => return Err(CoreError::SlotNotPending { slot_id, status }),
    }
    if dispute::has_open_dispute(disputes, slot_id) {
        return Err(CoreError::DisputeStillOpen(slot_id));
    }

    if let Some(slot) = booking.slot_mut(slot_id) {
        slot.status = BookedSlotStatus::Completed;
        if let Some(fund) = slot.held_fund.as_mut() {
            if fund.status == HeldFundStatus::Held {
                fund.status = HeldFundStatus::ReleasedToTutor;
            }
        }
    }
    Ok(CompletionOutcome::Transitioned)
}

/// Cancels the whole booking with a mandatory reason. Allowed only from
/// `Confirmed` or `DisputeRequested`; every non-terminal slot is cancelled
/// with it. Irreversible.
pub fn cancel_booking(booking: &mut Booking, reason: &str) -> Result<(), CoreError> {
    if reason.trim().is_empty() {
        return Err(CoreError::EmptyReasonRequired);
    }
    match booking.status {
        BookingStatus::Confirmed | BookingStatus::DisputeRequested => {}
        status => {
            return Err(CoreError::BookingAlreadyTerminal {
                booking_id: booking.id,
                status,
            });
        }
    }

    booking.status = BookingStatus::Cancelled;
    for slot in &mut booking.slots {
        if !slot.status.is_terminal() {
            slot.status = BookedSlotStatus::Cancelled;
            slot.note = Some(reason.trim().to_string());
        }
    }
    Ok(())
}

/// Derives the booking-level status from its slots and disputes. Pure and
/// order-independent over the slot list; the stored status is not consulted.
///
/// Any open dispute dominates: `AwaitingStaffReview` reads as `Disputed`,
/// otherwise `DisputeRequested`. A `CancelledDisputed` slot keeps the
/// booking `Disputed` even after every other slot completed.
pub fn derive_booking_status(booking: &Booking, disputes: &[Dispute]) -> BookingStatus {
    let open_disputes: Vec<&Dispute> = disputes
        .iter()
        .filter(|d| d.status.is_open() && booking.slot(d.booked_slot_id).is_some())
        .collect();
    if !open_disputes.is_empty() {
        let escalated = open_disputes
            .iter()
            .any(|d| d.status == crate::domain::DisputeStatus::AwaitingStaffReview);
        return if escalated {
            BookingStatus::Disputed
        } else {
            BookingStatus::DisputeRequested
        };
    }

    if booking
        .slots
        .iter()
        .any(|s| s.status == BookedSlotStatus::CancelledDisputed)
    {
        return BookingStatus::Disputed;
    }
    if !booking.slots.is_empty()
        && booking
            .slots
            .iter()
            .all(|s| s.status == BookedSlotStatus::Completed)
    {
        return BookingStatus::Complete;
    }
    if !booking.slots.is_empty()
        && booking
            .slots
            .iter()
            .all(|s| s.status == BookedSlotStatus::Cancelled)
    {
        return BookingStatus::Cancelled;
    }
    BookingStatus::Confirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SlotIndex;
    use crate::domain::{BookedSlot, DisputeStatus, HeldFund};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot_on(booking_id: Uuid, d: NaiveDate, raw: u8, status: BookedSlotStatus) -> BookedSlot {
        let id = Uuid::new_v4();
        BookedSlot {
            id,
            booking_id,
            booked_date: d,
            slot_index: SlotIndex::new(raw).unwrap(),
            status,
            note: None,
            held_fund: Some(HeldFund {
                id: Uuid::new_v4(),
                booked_slot_id: id,
                amount_cents: 25_00,
                status: crate::domain::HeldFundStatus::Held,
            }),
        }
    }

    /// A confirmed booking with three pending slots on consecutive days.
    fn three_slot_booking() -> Booking {
        let booking_id = Uuid::new_v4();
        let slots = vec![
            slot_on(booking_id, date(2024, 4, 15), 18, BookedSlotStatus::Pending),
            slot_on(booking_id, date(2024, 4, 16), 18, BookedSlotStatus::Pending),
            slot_on(booking_id, date(2024, 4, 17), 18, BookedSlotStatus::Pending),
        ];
        Booking {
            id: booking_id,
            learner_id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            status: BookingStatus::Confirmed,
            total_price_cents: 75_00,
            created_time: date(2024, 4, 1).and_hms_opt(8, 0, 0).unwrap().and_utc(),
            slots,
        }
    }

    #[test]
    fn slots_complete_strictly_in_order() {
        let mut booking = three_slot_booking();
        let s1 = booking.slots[0].id;
        let s2 = booking.slots[1].id;
        let s3 = booking.slots[2].id;

        let err = complete_slot(&mut booking, s2).unwrap_err();
        assert!(matches!(err, CoreError::OutOfOrderCompletion { .. }));
        assert_eq!(booking.slots[1].status, BookedSlotStatus::Pending);

        assert_eq!(complete_slot(&mut booking, s1).unwrap(), CompletionOutcome::Transitioned);
        assert_eq!(complete_slot(&mut booking, s2).unwrap(), CompletionOutcome::Transitioned);
        assert_eq!(complete_slot(&mut booking, s3).unwrap(), CompletionOutcome::Transitioned);
    }

    #[test]
    fn completion_is_idempotent() {
        let mut booking = three_slot_booking();
        let s1 = booking.slots[0].id;

        assert_eq!(complete_slot(&mut booking, s1).unwrap(), CompletionOutcome::Transitioned);
        // Retried request after a timeout: no error, no change.
        assert_eq!(complete_slot(&mut booking, s1).unwrap(), CompletionOutcome::AlreadyCompleted);
        assert_eq!(booking.slots[0].status, BookedSlotStatus::AwaitingConfirmation);
    }

    #[test]
    fn cancelled_slot_cannot_complete() {
        let mut booking = three_slot_booking();
        booking.slots[0].status = BookedSlotStatus::Cancelled;
        let s1 = booking.slots[0].id;
        let err = complete_slot(&mut booking, s1).unwrap_err();
        assert!(matches!(err, CoreError::SlotNotPending { .. }));
    }

    #[test]
    fn terminal_booking_rejects_completion() {
        let mut booking = three_slot_booking();
        booking.status = BookingStatus::Cancelled;
        let s1 = booking.slots[0].id;
        let err = complete_slot(&mut booking, s1).unwrap_err();
        assert!(matches!(err, CoreError::BookingAlreadyTerminal { .. }));
    }

    #[test]
    fn unknown_slot_is_reported() {
        let mut booking = three_slot_booking();
        let err = complete_slot(&mut booking, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CoreError::SlotNotFound(_)));
    }

    #[test]
    fn finalize_releases_the_fund() {
        let mut booking = three_slot_booking();
        let s1 = booking.slots[0].id;
        complete_slot(&mut booking, s1).unwrap();

        assert_eq!(
            finalize_slot(&mut booking, s1, &[]).unwrap(),
            CompletionOutcome::Transitioned
        );
        assert_eq!(booking.slots[0].status, BookedSlotStatus::Completed);
        assert_eq!(
            booking.slots[0].held_fund.as_ref().unwrap().status,
            crate::domain::HeldFundStatus::ReleasedToTutor
        );

        // Second finalize is a no-op.
        assert_eq!(
            finalize_slot(&mut booking, s1, &[]).unwrap(),
            CompletionOutcome::AlreadyCompleted
        );
    }

    #[test]
    fn finalize_blocked_by_open_dispute() {
        let mut booking = three_slot_booking();
        let s1 = booking.slots[0].id;
        complete_slot(&mut booking, s1).unwrap();

        let dispute = Dispute {
            id: Uuid::new_v4(),
            case_number: "CASE-0001".to_string(),
            booked_slot_id: s1,
            learner_reason: "tutor never showed".to_string(),
            status: DisputeStatus::PendingReconciliation,
            raised_at: date(2024, 4, 15).and_hms_opt(10, 0, 0).unwrap().and_utc(),
        };
        let err = finalize_slot(&mut booking, s1, &[dispute]).unwrap_err();
        assert!(matches!(err, CoreError::DisputeStillOpen(_)));
        assert_eq!(booking.slots[0].status, BookedSlotStatus::AwaitingConfirmation);
    }

    #[test]
    fn cancel_requires_reason_and_non_terminal_booking() {
        let mut booking = three_slot_booking();
        let err = cancel_booking(&mut booking, "  ").unwrap_err();
        assert!(matches!(err, CoreError::EmptyReasonRequired));
        assert_eq!(booking.status, BookingStatus::Confirmed);

        cancel_booking(&mut booking, "tutor moved away").unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking
            .slots
            .iter()
            .all(|s| s.status == BookedSlotStatus::Cancelled));

        let err = cancel_booking(&mut booking, "again").unwrap_err();
        assert!(matches!(err, CoreError::BookingAlreadyTerminal { .. }));
    }

    #[test]
    fn cancel_leaves_completed_slots_alone() {
        let mut booking = three_slot_booking();
        let s1 = booking.slots[0].id;
        complete_slot(&mut booking, s1).unwrap();
        finalize_slot(&mut booking, s1, &[]).unwrap();

        cancel_booking(&mut booking, "remaining sessions cancelled").unwrap();
        assert_eq!(booking.slots[0].status, BookedSlotStatus::Completed);
        assert_eq!(booking.slots[1].status, BookedSlotStatus::Cancelled);
    }

    #[test]
    fn derived_status_prefers_disputes_over_completion() {
        let mut booking = three_slot_booking();
        booking.slots[0].status = BookedSlotStatus::Completed;
        booking.slots[1].status = BookedSlotStatus::Completed;
        booking.slots[2].status = BookedSlotStatus::CancelledDisputed;
        assert_eq!(derive_booking_status(&booking, &[]), BookingStatus::Disputed);
    }

    #[test]
    fn derived_status_tracks_open_dispute_stage() {
        let mut booking = three_slot_booking();
        booking.slots[0].status = BookedSlotStatus::AwaitingConfirmation;
        let mut dispute = Dispute {
            id: Uuid::new_v4(),
            case_number: "CASE-0002".to_string(),
            booked_slot_id: booking.slots[0].id,
            learner_reason: "session cut short".to_string(),
            status: DisputeStatus::PendingReconciliation,
            raised_at: date(2024, 4, 15).and_hms_opt(10, 0, 0).unwrap().and_utc(),
        };
        assert_eq!(
            derive_booking_status(&booking, std::slice::from_ref(&dispute)),
            BookingStatus::DisputeRequested
        );

        dispute.status = DisputeStatus::AwaitingStaffReview;
        assert_eq!(
            derive_booking_status(&booking, std::slice::from_ref(&dispute)),
            BookingStatus::Disputed
        );
    }

    #[test]
    fn derived_status_all_completed_and_all_cancelled() {
        let mut booking = three_slot_booking();
        for slot in &mut booking.slots {
            slot.status = BookedSlotStatus::Completed;
        }
        assert_eq!(derive_booking_status(&booking, &[]), BookingStatus::Complete);

        for slot in &mut booking.slots {
            slot.status = BookedSlotStatus::Cancelled;
        }
        assert_eq!(derive_booking_status(&booking, &[]), BookingStatus::Cancelled);

        booking.slots[0].status = BookedSlotStatus::Pending;
        assert_eq!(derive_booking_status(&booking, &[]), BookingStatus::Confirmed);
    }
}
