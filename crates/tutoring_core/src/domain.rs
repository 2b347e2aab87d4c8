//! crates/tutoring_core/src/domain.rs
//!
//! Defines the pure, core data structures for the marketplace scheduling
//! engine. These structs are independent of any database or serialization
//! format; status families are tagged enums, and the integer encodings used
//! on the wire live only in the persistence adapter.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::clock::{self, SlotIndex};
use crate::error::CoreError;

/// Hours an unaccepted offer stays open before it expires.
pub const OFFER_TTL_HOURS: i64 = 48;

//=========================================================================================
// Status families
//=========================================================================================

/// Lifecycle state of a whole booking. `Cancelled` and `Complete` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Confirmed,
    DisputeRequested,
    Disputed,
    Cancelled,
    Complete,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Complete)
    }
}

/// Lifecycle state of one booked calendar occurrence. Everything but
/// `Pending` and `AwaitingConfirmation` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookedSlotStatus {
    Pending,
    AwaitingConfirmation,
    Completed,
    Cancelled,
    CancelledDisputed,
}

impl BookedSlotStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookedSlotStatus::Completed
                | BookedSlotStatus::Cancelled
                | BookedSlotStatus::CancelledDisputed
        )
    }
}

/// State of the escrow record backing one booked slot's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeldFundStatus {
    Held,
    ReleasedToTutor,
    RefundedToLearner,
    Disputed,
    ReturnedToTutorAccount,
}

/// State of a reschedule proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleStatus {
    PendingResponse,
    Accepted,
    Rejected,
}

/// State of a learner-raised dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeStatus {
    PendingReconciliation,
    AwaitingStaffReview,
    ClosedWithdrawn,
    ClosedResolved,
    ResolvedLearnerWin,
    ResolvedTutorWin,
    ResolvedDraw,
}

impl DisputeStatus {
    /// Open disputes are the ones still feeding a booking's derived
    /// `DisputeRequested`/`Disputed` status.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            DisputeStatus::PendingReconciliation | DisputeStatus::AwaitingStaffReview
        )
    }
}

/// Staff verdict on a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeOutcome {
    LearnerWin,
    TutorWin,
    Draw,
    Withdrawn,
}

//=========================================================================================
// Weekly availability pattern
//=========================================================================================

/// A tutor's recurring open-slot template, versioned by an effective-from
/// date. Several patterns may coexist for one tutor; the resolver picks the
/// one active for a given week.
#[derive(Debug, Clone)]
pub struct WeeklyAvailabilityPattern {
    pub id: Uuid,
    pub tutor_id: Uuid,
    /// The first Monday-anchored week this pattern can apply to.
    pub applied_from: NaiveDate,
    /// Monotonic insertion counter; breaks ties between patterns sharing an
    /// `applied_from` date (later insertion wins).
    pub created_seq: i64,
    /// Open storage-time slot indexes per day of week, Monday first.
    pub open_slots: [BTreeSet<SlotIndex>; 7],
}

impl WeeklyAvailabilityPattern {
    /// Whether the pattern opens `slot` on the given day of week
    /// (0 = Monday .. 6 = Sunday).
    pub fn is_open(&self, day_in_week: usize, slot: SlotIndex) -> bool {
        self.open_slots
            .get(day_in_week)
            .map(|day| day.contains(&slot))
            .unwrap_or(false)
    }
}

//=========================================================================================
// Bookings, slots, funds
//=========================================================================================

/// Escrow record for one booked slot's payment.
#[derive(Debug, Clone)]
pub struct HeldFund {
    pub id: Uuid,
    pub booked_slot_id: Uuid,
    pub amount_cents: i64,
    pub status: HeldFundStatus,
}

/// One calendar occurrence within a booking, pinned to a stored
/// `(date, slot)` pair in UTC+0.
#[derive(Debug, Clone)]
pub struct BookedSlot {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub booked_date: NaiveDate,
    pub slot_index: SlotIndex,
    pub status: BookedSlotStatus,
    pub note: Option<String>,
    pub held_fund: Option<HeldFund>,
}

impl BookedSlot {
    /// The UTC instant the session starts.
    pub fn starts_at(&self) -> DateTime<Utc> {
        clock::slot_start_utc(self.booked_date, self.slot_index)
    }

    /// Chronological sort key within a booking.
    pub fn chronological_key(&self) -> (NaiveDate, SlotIndex) {
        (self.booked_date, self.slot_index)
    }
}

/// A learner-tutor agreement for one or more slots of one lesson. Never
/// deleted, only status-transitioned.
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub tutor_id: Uuid,
    pub lesson_id: Uuid,
    pub status: BookingStatus,
    pub total_price_cents: i64,
    pub created_time: DateTime<Utc>,
    pub slots: Vec<BookedSlot>,
}

impl Booking {
    pub fn slot(&self, slot_id: Uuid) -> Option<&BookedSlot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }

    pub fn slot_mut(&mut self, slot_id: Uuid) -> Option<&mut BookedSlot> {
        self.slots.iter_mut().find(|s| s.id == slot_id)
    }
}

/// One page of a booking listing.
#[derive(Debug, Clone)]
pub struct BookingPage {
    pub items: Vec<Booking>,
    pub total_items: u64,
}

//=========================================================================================
// Offers
//=========================================================================================

/// One proposed slot inside an offer. `slot_date_time` is the storage-time
/// (UTC+0) start instant and is always consistent with `slot_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferedSlot {
    pub slot_date_time: DateTime<Utc>,
    pub slot_index: SlotIndex,
}

/// A tutor-initiated proposal of slots to one learner for one lesson.
/// Expires automatically after [`OFFER_TTL_HOURS`] if unaccepted.
#[derive(Debug, Clone)]
pub struct Offer {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub tutor_id: Uuid,
    pub learner_id: Uuid,
    pub price_per_slot_cents: i64,
    pub total_price_cents: i64,
    pub duration_minutes: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub slots: Vec<OfferedSlot>,
}

impl Offer {
    /// Derived expiry flag.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Fails with [`CoreError::OfferExpired`] once the expiry window has
    /// passed; mutations check this before touching slot logic.
    pub fn ensure_not_expired(&self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.is_expired(now) {
            Err(CoreError::OfferExpired { offer_id: self.id })
        } else {
            Ok(())
        }
    }

    /// The storage `(date, slot)` cells this offer holds, recomputed from the
    /// stored start instants.
    pub fn storage_cells(&self) -> Result<BTreeSet<(NaiveDate, SlotIndex)>, CoreError> {
        self.slots
            .iter()
            .map(|s| clock::slot_of_utc(s.slot_date_time))
            .collect()
    }
}

/// Input for creating or replacing an offer's content; ids and timestamps
/// are assigned by the backend.
#[derive(Debug, Clone)]
pub struct OfferDraft {
    pub lesson_id: Uuid,
    pub tutor_id: Uuid,
    pub learner_id: Uuid,
    pub price_per_slot_cents: i64,
    pub duration_minutes: u32,
    pub slots: Vec<OfferedSlot>,
}

impl OfferDraft {
    pub fn total_price_cents(&self) -> i64 {
        self.price_per_slot_cents * self.slots.len() as i64
    }
}

//=========================================================================================
// Reschedule requests
//=========================================================================================

/// A proposal to move exactly one booked slot to a new `(date, slot)`.
#[derive(Debug, Clone)]
pub struct RescheduleRequest {
    pub id: Uuid,
    pub booked_slot_id: Uuid,
    pub reason: String,
    pub new_slot_date_time: DateTime<Utc>,
    pub new_slot_index: SlotIndex,
    pub status: RescheduleStatus,
    pub requested_at: DateTime<Utc>,
}

impl RescheduleRequest {
    /// An unanswered request lapses after its validity window; the original
    /// slot then reverts unchanged.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.requested_at + Duration::hours(crate::reschedule::RESPONSE_WINDOW_HOURS)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == RescheduleStatus::PendingResponse && now >= self.expires_at()
    }

    /// The target cell this request reserves while pending.
    pub fn target_cell(&self) -> (NaiveDate, SlotIndex) {
        (self.new_slot_date_time.date_naive(), self.new_slot_index)
    }
}

//=========================================================================================
// Disputes
//=========================================================================================

/// A learner-raised challenge against a completed-but-unconfirmed slot.
#[derive(Debug, Clone)]
pub struct Dispute {
    pub id: Uuid,
    pub case_number: String,
    pub booked_slot_id: Uuid,
    pub learner_reason: String,
    pub status: DisputeStatus,
    pub raised_at: DateTime<Utc>,
}
