//! crates/tutoring_core/src/dispute.rs
//!
//! Associates disputes with booked slots and drives dispute resolution into
//! slot and escrow state. A dispute can only be raised inside the
//! post-session grace window, while the slot sits in `AwaitingConfirmation`;
//! an open dispute blocks finalization until staff resolve or the learner
//! withdraws.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    BookedSlot, BookedSlotStatus, Dispute, DisputeOutcome, DisputeStatus, HeldFundStatus,
};
use crate::error::CoreError;

/// Raises a dispute against a held slot. The slot stays in
/// `AwaitingConfirmation` while the dispute is open; resolution, not the
/// raise itself, decides where it lands. The slot's escrow is frozen to
/// `Disputed` immediately.
pub fn raise(
    slot: &mut BookedSlot,
    existing: &[Dispute],
    case_number: String,
    learner_reason: &str,
    now: DateTime<Utc>,
) -> Result<Dispute, CoreError> {
    if slot.status != BookedSlotStatus::AwaitingConfirmation {
        return Err(CoreError::SlotNotPending {
            slot_id: slot.id,
            status: slot.status,
        });
    }
    if learner_reason.trim().is_empty() {
        return Err(CoreError::EmptyReasonRequired);
    }
    if has_open_dispute(existing, slot.id) {
        return Err(CoreError::DisputeStillOpen(slot.id));
    }

    if let Some(fund) = slot.held_fund.as_mut() {
        if fund.status == HeldFundStatus::Held {
            fund.status = HeldFundStatus::Disputed;
        }
    }
    Ok(Dispute {
        id: Uuid::new_v4(),
        case_number,
        booked_slot_id: slot.id,
        learner_reason: learner_reason.trim().to_string(),
        status: DisputeStatus::PendingReconciliation,
        raised_at: now,
    })
}

/// Staff pick-up: `PendingReconciliation -> AwaitingStaffReview`, which
/// drives the owning booking's derived status from `DisputeRequested` to
/// `Disputed`.
pub fn escalate(dispute: &mut Dispute) -> Result<(), CoreError> {
    if dispute.status != DisputeStatus::PendingReconciliation {
        return Err(CoreError::RequestNotPending(dispute.id));
    }
    dispute.status = DisputeStatus::AwaitingStaffReview;
    Ok(())
}

/// Applies the resolution outcome to the dispute, the slot, and the slot's
/// escrow.
///
/// `LearnerWin` refunds the learner and lands the slot in
/// `CancelledDisputed`. `TutorWin` returns the money to the tutor's account
/// and completes the slot. `Draw` closes the dispute but leaves the fund
/// `Disputed`: the split is a manual treasury decision, not something the
/// engine invents. `Withdrawn` re-arms the normal release path: the fund
/// returns to `Held` and the slot stays in its grace window.
pub fn resolve(
    dispute: &mut Dispute,
    slot: &mut BookedSlot,
    outcome: DisputeOutcome,
) -> Result<(), CoreError> {
    if !dispute.status.is_open() {
        return Err(CoreError::RequestNotPending(dispute.id));
    }
    if dispute.booked_slot_id != slot.id {
        return Err(CoreError::SlotNotFound(dispute.booked_slot_id));
    }

    let fund_status = slot.held_fund.as_ref().map(|f| f.status);
    let (dispute_status, slot_status, new_fund_status) = match outcome {
        DisputeOutcome::LearnerWin => (
            DisputeStatus::ResolvedLearnerWin,
            BookedSlotStatus::CancelledDisputed,
            Some(HeldFundStatus::RefundedToLearner),
        ),
        DisputeOutcome::TutorWin => (
            DisputeStatus::ResolvedTutorWin,
            BookedSlotStatus::Completed,
            Some(HeldFundStatus::ReturnedToTutorAccount),
        ),
        DisputeOutcome::Draw => (
            DisputeStatus::ResolvedDraw,
            BookedSlotStatus::CancelledDisputed,
            // Fund stays Disputed pending the external split decision.
            fund_status,
        ),
        DisputeOutcome::Withdrawn => (
            DisputeStatus::ClosedWithdrawn,
            BookedSlotStatus::AwaitingConfirmation,
            Some(HeldFundStatus::Held),
        ),
    };

    dispute.status = dispute_status;
    slot.status = slot_status;
    if let (Some(fund), Some(status)) = (slot.held_fund.as_mut(), new_fund_status) {
        fund.status = status;
    }
    Ok(())
}

/// Whether any open dispute targets `slot_id`.
pub fn has_open_dispute(disputes: &[Dispute], slot_id: Uuid) -> bool {
    disputes
        .iter()
        .any(|d| d.booked_slot_id == slot_id && d.status.is_open())
}

/// Whether any of the booking's slots has an open dispute.
pub fn has_open_dispute_in_booking(disputes: &[Dispute], slots: &[BookedSlot]) -> bool {
    slots.iter().any(|s| has_open_dispute(disputes, s.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SlotIndex;
    use crate::domain::HeldFund;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        date(2024, 4, 17).and_hms_opt(12, 0, 0).unwrap().and_utc()
    }

    fn held_slot(status: BookedSlotStatus) -> BookedSlot {
        let id = Uuid::new_v4();
        BookedSlot {
            id,
            booking_id: Uuid::new_v4(),
            booked_date: date(2024, 4, 17),
            slot_index: SlotIndex::new(18).unwrap(),
            status,
            note: None,
            held_fund: Some(HeldFund {
                id: Uuid::new_v4(),
                booked_slot_id: id,
                amount_cents: 25_00,
                status: HeldFundStatus::Held,
            }),
        }
    }

    fn fund_status(slot: &BookedSlot) -> HeldFundStatus {
        slot.held_fund.as_ref().unwrap().status
    }

    #[test]
    fn raise_requires_grace_window() {
        let mut slot = held_slot(BookedSlotStatus::Pending);
        let err = raise(&mut slot, &[], "CASE-1".into(), "no show", now()).unwrap_err();
        assert!(matches!(err, CoreError::SlotNotPending { .. }));

        let mut slot = held_slot(BookedSlotStatus::AwaitingConfirmation);
        let dispute = raise(&mut slot, &[], "CASE-1".into(), "no show", now()).unwrap();
        assert_eq!(dispute.status, DisputeStatus::PendingReconciliation);
        // Slot waits for resolution; escrow is frozen at once.
        assert_eq!(slot.status, BookedSlotStatus::AwaitingConfirmation);
        assert_eq!(fund_status(&slot), HeldFundStatus::Disputed);
    }

    #[test]
    fn raise_rejects_duplicates_and_empty_reason() {
        let mut slot = held_slot(BookedSlotStatus::AwaitingConfirmation);
        let err = raise(&mut slot, &[], "CASE-1".into(), "", now()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyReasonRequired));

        let first = raise(&mut slot, &[], "CASE-1".into(), "no show", now()).unwrap();
        let err = raise(
            &mut slot,
            std::slice::from_ref(&first),
            "CASE-2".into(),
            "still no show",
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::DisputeStillOpen(_)));
    }

    #[test]
    fn learner_win_refunds_and_cancels() {
        let mut slot = held_slot(BookedSlotStatus::AwaitingConfirmation);
        let mut dispute = raise(&mut slot, &[], "CASE-1".into(), "no show", now()).unwrap();
        escalate(&mut dispute).unwrap();

        resolve(&mut dispute, &mut slot, DisputeOutcome::LearnerWin).unwrap();
        assert_eq!(dispute.status, DisputeStatus::ResolvedLearnerWin);
        assert_eq!(slot.status, BookedSlotStatus::CancelledDisputed);
        assert_eq!(fund_status(&slot), HeldFundStatus::RefundedToLearner);
    }

    #[test]
    fn tutor_win_completes_and_returns_funds() {
        let mut slot = held_slot(BookedSlotStatus::AwaitingConfirmation);
        let mut dispute = raise(&mut slot, &[], "CASE-1".into(), "no show", now()).unwrap();

        resolve(&mut dispute, &mut slot, DisputeOutcome::TutorWin).unwrap();
        assert_eq!(dispute.status, DisputeStatus::ResolvedTutorWin);
        assert_eq!(slot.status, BookedSlotStatus::Completed);
        assert_eq!(fund_status(&slot), HeldFundStatus::ReturnedToTutorAccount);
    }

    #[test]
    fn draw_leaves_the_fund_for_manual_handling() {
        let mut slot = held_slot(BookedSlotStatus::AwaitingConfirmation);
        let mut dispute = raise(&mut slot, &[], "CASE-1".into(), "no show", now()).unwrap();

        resolve(&mut dispute, &mut slot, DisputeOutcome::Draw).unwrap();
        assert_eq!(dispute.status, DisputeStatus::ResolvedDraw);
        assert_eq!(slot.status, BookedSlotStatus::CancelledDisputed);
        assert_eq!(fund_status(&slot), HeldFundStatus::Disputed);
    }

    #[test]
    fn withdrawal_restores_the_release_path() {
        let mut slot = held_slot(BookedSlotStatus::AwaitingConfirmation);
        let mut dispute = raise(&mut slot, &[], "CASE-1".into(), "no show", now()).unwrap();

        resolve(&mut dispute, &mut slot, DisputeOutcome::Withdrawn).unwrap();
        assert_eq!(dispute.status, DisputeStatus::ClosedWithdrawn);
        assert_eq!(slot.status, BookedSlotStatus::AwaitingConfirmation);
        assert_eq!(fund_status(&slot), HeldFundStatus::Held);

        // A settled dispute cannot be resolved twice.
        let err = resolve(&mut dispute, &mut slot, DisputeOutcome::TutorWin).unwrap_err();
        assert!(matches!(err, CoreError::RequestNotPending(_)));
    }

    #[test]
    fn open_dispute_queries() {
        let slot_a = held_slot(BookedSlotStatus::AwaitingConfirmation);
        let slot_b = held_slot(BookedSlotStatus::Pending);
        let dispute = Dispute {
            id: Uuid::new_v4(),
            case_number: "CASE-9".into(),
            booked_slot_id: slot_a.id,
            learner_reason: "no show".into(),
            status: DisputeStatus::PendingReconciliation,
            raised_at: now(),
        };

        assert!(has_open_dispute(std::slice::from_ref(&dispute), slot_a.id));
        assert!(!has_open_dispute(std::slice::from_ref(&dispute), slot_b.id));
        assert!(has_open_dispute_in_booking(
            std::slice::from_ref(&dispute),
            &[slot_a.clone(), slot_b.clone()]
        ));

        let closed = Dispute {
            status: DisputeStatus::ResolvedTutorWin,
            ..dispute
        };
        assert!(!has_open_dispute(std::slice::from_ref(&closed), slot_a.id));
    }
}
