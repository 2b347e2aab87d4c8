//! crates/tutoring_core/src/error.rs
//!
//! The validation error taxonomy for the scheduling engine. Every variant is
//! recoverable: a failed operation commits nothing and the caller surfaces a
//! user-facing message.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::clock::SlotIndex;
use crate::domain::{BookedSlotStatus, BookingStatus};
use crate::ports::PortError;

/// The primary error type for all core scheduling operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A timestamp, slot index or grid coordinate could not be interpreted.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An offer was submitted with an empty slot selection.
    #[error("no slots selected")]
    NoSlotsSelected,

    /// The slot is not in the state the requested operation needs.
    #[error("slot {slot_id} is {status:?}, which does not allow this operation")]
    SlotNotPending {
        slot_id: Uuid,
        status: BookedSlotStatus,
    },

    /// A reschedule was requested less than the required notice period before
    /// the original slot's start time.
    #[error("too late to reschedule a slot starting at {starts_at}")]
    TooLateToReschedule { starts_at: DateTime<Utc> },

    /// The targeted grid cell is not available for selection.
    #[error("slot {slot_index} on {date} is not available")]
    TargetSlotUnavailable { date: NaiveDate, slot_index: SlotIndex },

    /// A slot was completed while an earlier pending slot in the same booking
    /// was still open.
    #[error("slot {slot_id} cannot be completed before earlier pending slots")]
    OutOfOrderCompletion { slot_id: Uuid },

    /// The booking has already reached a terminal state.
    #[error("booking {booking_id} is already {status:?}")]
    BookingAlreadyTerminal {
        booking_id: Uuid,
        status: BookingStatus,
    },

    /// The offer's expiration timestamp has passed.
    #[error("offer {offer_id} has expired")]
    OfferExpired { offer_id: Uuid },

    /// A cancellation or dispute reason was missing.
    #[error("a non-empty reason is required")]
    EmptyReasonRequired,

    /// The referenced slot does not exist within the booking.
    #[error("slot {0} not found in booking")]
    SlotNotFound(Uuid),

    /// The reschedule request or dispute is no longer awaiting a response.
    #[error("request {0} is not pending a response")]
    RequestNotPending(Uuid),

    /// An open dispute blocks the requested transition.
    #[error("slot {0} has an open dispute")]
    DisputeStillOpen(Uuid),

    /// A backend/network failure, wrapping the underlying cause. The core
    /// never retries; retry policy belongs to the transport collaborator.
    #[error("backend unavailable: {0}")]
    Backend(#[from] PortError),
}
