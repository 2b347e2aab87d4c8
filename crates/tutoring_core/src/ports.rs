//! crates/tutoring_core/src/ports.rs
//!
//! Defines the service contract (trait) between the scheduling engine and
//! its backend collaborator. The trait forms the boundary of the hexagonal
//! architecture, keeping the core independent of the database or transport
//! behind it. All timestamps crossing this boundary are UTC+0.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::clock::SlotIndex;
use crate::domain::{
    Booking, BookingPage, Dispute, Offer, OfferDraft, RescheduleRequest,
    WeeklyAvailabilityPattern,
};
use crate::matrix::SlotOccupancy;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations, abstracting away the
/// specific errors of the backend (database driver, network transport).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backend could not be reached or answered with a transport-level
    /// failure. The core does not retry; retry policy belongs to the
    /// transport collaborator.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Port (Trait)
//=========================================================================================

/// The backend collaborator the engine reads from and persists through.
/// Mutating methods receive entities whose transitions were already
/// validated by the core; the backend stores, it does not re-decide.
#[async_trait]
pub trait SchedulingBackend: Send + Sync {
    // --- Availability ---
    async fn get_weekly_patterns(&self, tutor_id: Uuid)
        -> PortResult<Vec<WeeklyAvailabilityPattern>>;

    async fn get_schedule_window(
        &self,
        tutor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PortResult<Vec<SlotOccupancy>>;

    /// Target cells of reschedule requests still awaiting a response in the
    /// window; the matrix treats them as reserved.
    async fn get_pending_reschedule_targets(
        &self,
        tutor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PortResult<Vec<(NaiveDate, SlotIndex)>>;

    // --- Bookings ---
    async fn get_booking_page(&self, page_index: u32, page_size: u32) -> PortResult<BookingPage>;

    async fn get_booking_detail(&self, booking_id: Uuid) -> PortResult<Booking>;

    /// The booking owning a given booked slot.
    async fn get_booking_for_slot(&self, booked_slot_id: Uuid) -> PortResult<Booking>;

    /// Persists a booking's current state (status, slots, funds) after a
    /// validated transition (completion, finalization, cancellation,
    /// accepted reschedule).
    async fn save_booking(&self, booking: &Booking) -> PortResult<()>;

    // --- Offers ---
    async fn get_offer(&self, offer_id: Uuid) -> PortResult<Offer>;

    async fn create_offer(&self, draft: OfferDraft) -> PortResult<Offer>;

    async fn update_offer(&self, offer: &Offer) -> PortResult<()>;

    async fn delete_offer(&self, offer_id: Uuid) -> PortResult<()>;

    // --- Reschedule requests ---
    async fn create_reschedule_request(&self, request: &RescheduleRequest) -> PortResult<()>;

    async fn get_reschedule_request(&self, request_id: Uuid) -> PortResult<RescheduleRequest>;

    async fn save_reschedule_request(&self, request: &RescheduleRequest) -> PortResult<()>;

    // --- Disputes ---
    async fn create_dispute(&self, dispute: &Dispute) -> PortResult<()>;

    async fn get_dispute(&self, dispute_id: Uuid) -> PortResult<Dispute>;

    async fn get_disputes_for_booking(&self, booking_id: Uuid) -> PortResult<Vec<Dispute>>;

    async fn save_dispute(&self, dispute: &Dispute) -> PortResult<()>;

    /// Next value of the dispute case-number sequence.
    async fn next_case_number(&self) -> PortResult<i64>;
}
