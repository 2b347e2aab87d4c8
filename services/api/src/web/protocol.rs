//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between clients and the API server,
//! and their conversions to and from the core domain types. Status enums
//! cross this boundary as snake_case strings; the small-integer encodings
//! are a database concern and never appear here.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use tutoring_core::clock::{self, SlotIndex};
use tutoring_core::domain::{
    BookedSlot, BookedSlotStatus, Booking, BookingStatus, Dispute, DisputeOutcome, DisputeStatus,
    HeldFundStatus, Offer, OfferedSlot, RescheduleRequest, RescheduleStatus,
};
use tutoring_core::error::CoreError;
use tutoring_core::lifecycle::CompletionOutcome;
use tutoring_core::matrix::{DaySchedule, SlotCellStatus};
use tutoring_core::reschedule::RescheduleDecision;
use tutoring_core::selector::SlotSelectionDiff;

//=========================================================================================
// Status DTOs
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CellStatusDto {
    Available,
    OnHold,
    Booked,
    Unavailable,
}

impl From<SlotCellStatus> for CellStatusDto {
    fn from(status: SlotCellStatus) -> Self {
        match status {
            SlotCellStatus::Available => CellStatusDto::Available,
            SlotCellStatus::OnHold => CellStatusDto::OnHold,
            SlotCellStatus::Booked => CellStatusDto::Booked,
            SlotCellStatus::Unavailable => CellStatusDto::Unavailable,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatusDto {
    Confirmed,
    DisputeRequested,
    Disputed,
    Cancelled,
    Complete,
}

impl From<BookingStatus> for BookingStatusDto {
    fn from(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Confirmed => BookingStatusDto::Confirmed,
            BookingStatus::DisputeRequested => BookingStatusDto::DisputeRequested,
            BookingStatus::Disputed => BookingStatusDto::Disputed,
            BookingStatus::Cancelled => BookingStatusDto::Cancelled,
            BookingStatus::Complete => BookingStatusDto::Complete,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatusDto {
    Pending,
    AwaitingConfirmation,
    Completed,
    Cancelled,
    CancelledDisputed,
}

impl From<BookedSlotStatus> for SlotStatusDto {
    fn from(status: BookedSlotStatus) -> Self {
        match status {
            BookedSlotStatus::Pending => SlotStatusDto::Pending,
            BookedSlotStatus::AwaitingConfirmation => SlotStatusDto::AwaitingConfirmation,
            BookedSlotStatus::Completed => SlotStatusDto::Completed,
            BookedSlotStatus::Cancelled => SlotStatusDto::Cancelled,
            BookedSlotStatus::CancelledDisputed => SlotStatusDto::CancelledDisputed,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FundStatusDto {
    Held,
    ReleasedToTutor,
    RefundedToLearner,
    Disputed,
    ReturnedToTutorAccount,
}

impl From<HeldFundStatus> for FundStatusDto {
    fn from(status: HeldFundStatus) -> Self {
        match status {
            HeldFundStatus::Held => FundStatusDto::Held,
            HeldFundStatus::ReleasedToTutor => FundStatusDto::ReleasedToTutor,
            HeldFundStatus::RefundedToLearner => FundStatusDto::RefundedToLearner,
            HeldFundStatus::Disputed => FundStatusDto::Disputed,
            HeldFundStatus::ReturnedToTutorAccount => FundStatusDto::ReturnedToTutorAccount,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleStatusDto {
    PendingResponse,
    Accepted,
    Rejected,
}

impl From<RescheduleStatus> for RescheduleStatusDto {
    fn from(status: RescheduleStatus) -> Self {
        match status {
            RescheduleStatus::PendingResponse => RescheduleStatusDto::PendingResponse,
            RescheduleStatus::Accepted => RescheduleStatusDto::Accepted,
            RescheduleStatus::Rejected => RescheduleStatusDto::Rejected,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatusDto {
    PendingReconciliation,
    AwaitingStaffReview,
    ClosedWithdrawn,
    ClosedResolved,
    ResolvedLearnerWin,
    ResolvedTutorWin,
    ResolvedDraw,
}

impl From<DisputeStatus> for DisputeStatusDto {
    fn from(status: DisputeStatus) -> Self {
        match status {
            DisputeStatus::PendingReconciliation => DisputeStatusDto::PendingReconciliation,
            DisputeStatus::AwaitingStaffReview => DisputeStatusDto::AwaitingStaffReview,
            DisputeStatus::ClosedWithdrawn => DisputeStatusDto::ClosedWithdrawn,
            DisputeStatus::ClosedResolved => DisputeStatusDto::ClosedResolved,
            DisputeStatus::ResolvedLearnerWin => DisputeStatusDto::ResolvedLearnerWin,
            DisputeStatus::ResolvedTutorWin => DisputeStatusDto::ResolvedTutorWin,
            DisputeStatus::ResolvedDraw => DisputeStatusDto::ResolvedDraw,
        }
    }
}

/// The counterparty's answer to a reschedule request.
#[derive(Deserialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleDecisionDto {
    Accept,
    Reject,
}

impl From<RescheduleDecisionDto> for RescheduleDecision {
    fn from(decision: RescheduleDecisionDto) -> Self {
        match decision {
            RescheduleDecisionDto::Accept => RescheduleDecision::Accept,
            RescheduleDecisionDto::Reject => RescheduleDecision::Reject,
        }
    }
}

/// The staff verdict on a dispute.
#[derive(Deserialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcomeDto {
    LearnerWin,
    TutorWin,
    Draw,
    Withdrawn,
}

impl From<DisputeOutcomeDto> for DisputeOutcome {
    fn from(outcome: DisputeOutcomeDto) -> Self {
        match outcome {
            DisputeOutcomeDto::LearnerWin => DisputeOutcome::LearnerWin,
            DisputeOutcomeDto::TutorWin => DisputeOutcome::TutorWin,
            DisputeOutcomeDto::Draw => DisputeOutcome::Draw,
            DisputeOutcomeDto::Withdrawn => DisputeOutcome::Withdrawn,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcomeDto {
    Transitioned,
    AlreadyCompleted,
}

impl From<CompletionOutcome> for CompletionOutcomeDto {
    fn from(outcome: CompletionOutcome) -> Self {
        match outcome {
            CompletionOutcome::Transitioned => CompletionOutcomeDto::Transitioned,
            CompletionOutcome::AlreadyCompleted => CompletionOutcomeDto::AlreadyCompleted,
        }
    }
}

//=========================================================================================
// Schedule Grid Payloads
//=========================================================================================

/// One cell of the schedule grid, with its +7h display projection attached
/// so clients never do timezone arithmetic themselves.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct SlotCellDto {
    pub slot_index: u8,
    pub status: CellStatusDto,
    pub display_date: NaiveDate,
    pub display_start_time: NaiveTime,
    pub display_end_time: NaiveTime,
}

/// The 48 cells of one storage-time calendar date.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct DayScheduleDto {
    pub date: NaiveDate,
    pub cells: Vec<SlotCellDto>,
}

impl DayScheduleDto {
    pub fn from_day(day: &DaySchedule) -> Self {
        let cells = SlotIndex::all()
            .zip(day.cells.iter())
            .map(|(slot, &status)| {
                let display = clock::to_display_time(day.date, slot);
                SlotCellDto {
                    slot_index: slot.get(),
                    status: status.into(),
                    display_date: display.display_date,
                    display_start_time: display.start_time,
                    display_end_time: display.end_time,
                }
            })
            .collect();
        Self {
            date: day.date,
            cells,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ScheduleResponse {
    pub tutor_id: Uuid,
    pub week_start: NaiveDate,
    pub days: Vec<DayScheduleDto>,
}

//=========================================================================================
// Booking Payloads
//=========================================================================================

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct HeldFundDto {
    pub id: Uuid,
    pub amount_cents: i64,
    pub status: FundStatusDto,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BookedSlotDto {
    pub id: Uuid,
    pub booked_date: NaiveDate,
    pub slot_index: u8,
    pub status: SlotStatusDto,
    pub note: Option<String>,
    pub display_date: NaiveDate,
    pub display_start_time: NaiveTime,
    pub display_end_time: NaiveTime,
    pub held_fund: Option<HeldFundDto>,
}

impl BookedSlotDto {
    pub fn from_domain(slot: &BookedSlot) -> Self {
        let display = clock::to_display_time(slot.booked_date, slot.slot_index);
        Self {
            id: slot.id,
            booked_date: slot.booked_date,
            slot_index: slot.slot_index.get(),
            status: slot.status.into(),
            note: slot.note.clone(),
            display_date: display.display_date,
            display_start_time: display.start_time,
            display_end_time: display.end_time,
            held_fund: slot.held_fund.as_ref().map(|fund| HeldFundDto {
                id: fund.id,
                amount_cents: fund.amount_cents,
                status: fund.status.into(),
            }),
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BookingSummaryDto {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub tutor_id: Uuid,
    pub lesson_id: Uuid,
    pub status: BookingStatusDto,
    pub total_price_cents: i64,
    pub created_time: DateTime<Utc>,
    pub slot_count: usize,
}

impl BookingSummaryDto {
    pub fn from_domain(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            learner_id: booking.learner_id,
            tutor_id: booking.tutor_id,
            lesson_id: booking.lesson_id,
            status: booking.status.into(),
            total_price_cents: booking.total_price_cents,
            created_time: booking.created_time,
            slot_count: booking.slots.len(),
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BookingPageResponse {
    pub items: Vec<BookingSummaryDto>,
    pub total_items: u64,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BookingDetailResponse {
    #[serde(flatten)]
    pub summary: BookingSummaryDto,
    /// Status derived purely from the slot and dispute records; may differ
    /// from the stored status until the next mutation persists it.
    pub derived_status: BookingStatusDto,
    pub slots: Vec<BookedSlotDto>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CancelBookingRequest {
    pub reason: String,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct SlotTransitionResponse {
    pub booking_id: Uuid,
    pub slot_id: Uuid,
    pub outcome: CompletionOutcomeDto,
    pub slot_status: SlotStatusDto,
}

//=========================================================================================
// Offer Payloads
//=========================================================================================

/// A grid cell referenced the way the display calendar addresses it: the
/// display week's Monday, the day offset inside that week, and the display
/// slot index.
#[derive(Deserialize, Debug, Clone, Copy, ToSchema)]
pub struct GridCellRef {
    pub week_start: NaiveDate,
    pub day_in_week: u8,
    pub slot_index: u8,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateOfferRequest {
    pub lesson_id: Uuid,
    pub tutor_id: Uuid,
    pub learner_id: Uuid,
    pub price_per_slot_cents: i64,
    pub duration_minutes: u32,
    pub slots: Vec<GridCellRef>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateOfferRequest {
    pub price_per_slot_cents: i64,
    pub duration_minutes: u32,
    pub slots: Vec<GridCellRef>,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct OfferedSlotDto {
    pub slot_date_time: DateTime<Utc>,
    pub slot_index: u8,
}

impl OfferedSlotDto {
    pub fn from_domain(slot: &OfferedSlot) -> Self {
        Self {
            slot_date_time: slot.slot_date_time,
            slot_index: slot.slot_index.get(),
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct OfferResponse {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub tutor_id: Uuid,
    pub learner_id: Uuid,
    pub price_per_slot_cents: i64,
    pub total_price_cents: i64,
    pub duration_minutes: u32,
    pub is_expired: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub slots: Vec<OfferedSlotDto>,
}

impl OfferResponse {
    pub fn from_domain(offer: &Offer, now: DateTime<Utc>) -> Self {
        Self {
            id: offer.id,
            lesson_id: offer.lesson_id,
            tutor_id: offer.tutor_id,
            learner_id: offer.learner_id,
            price_per_slot_cents: offer.price_per_slot_cents,
            total_price_cents: offer.total_price_cents,
            duration_minutes: offer.duration_minutes,
            is_expired: offer.is_expired(now),
            expires_at: offer.expires_at,
            created_at: offer.created_at,
            updated_at: offer.updated_at,
            slots: offer.slots.iter().map(OfferedSlotDto::from_domain).collect(),
        }
    }
}

/// Update response: the stored offer plus the change summary shown to the
/// learner.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct OfferUpdateResponse {
    #[serde(flatten)]
    pub offer: OfferResponse,
    pub added_slots: Vec<OfferedSlotDto>,
    pub removed_slots: Vec<OfferedSlotDto>,
}

impl OfferUpdateResponse {
    pub fn from_domain(offer: &Offer, diff: &SlotSelectionDiff, now: DateTime<Utc>) -> Self {
        Self {
            offer: OfferResponse::from_domain(offer, now),
            added_slots: diff.added.iter().map(OfferedSlotDto::from_domain).collect(),
            removed_slots: diff.removed.iter().map(OfferedSlotDto::from_domain).collect(),
        }
    }
}

//=========================================================================================
// Reschedule and Dispute Payloads
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateRescheduleRequest {
    pub reason: String,
    /// Storage-time (UTC+0) target coordinates.
    pub new_date: NaiveDate,
    pub new_slot_index: u8,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct RespondRescheduleRequest {
    pub decision: RescheduleDecisionDto,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct RescheduleResponseDto {
    pub id: Uuid,
    pub booked_slot_id: Uuid,
    pub reason: String,
    pub new_slot_date_time: DateTime<Utc>,
    pub new_slot_index: u8,
    pub status: RescheduleStatusDto,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RescheduleResponseDto {
    pub fn from_domain(request: &RescheduleRequest) -> Self {
        Self {
            id: request.id,
            booked_slot_id: request.booked_slot_id,
            reason: request.reason.clone(),
            new_slot_date_time: request.new_slot_date_time,
            new_slot_index: request.new_slot_index.get(),
            status: request.status.into(),
            requested_at: request.requested_at,
            expires_at: request.expires_at(),
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct RaiseDisputeRequest {
    pub reason: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ResolveDisputeRequest {
    pub outcome: DisputeOutcomeDto,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct DisputeDto {
    pub id: Uuid,
    pub case_number: String,
    pub booked_slot_id: Uuid,
    pub learner_reason: String,
    pub status: DisputeStatusDto,
    pub raised_at: DateTime<Utc>,
}

impl DisputeDto {
    pub fn from_domain(dispute: &Dispute) -> Self {
        Self {
            id: dispute.id,
            case_number: dispute.case_number.clone(),
            booked_slot_id: dispute.booked_slot_id,
            learner_reason: dispute.learner_reason.clone(),
            status: dispute.status.into(),
            raised_at: dispute.raised_at,
        }
    }
}

//=========================================================================================
// Grid Cell Decoding
//=========================================================================================

impl GridCellRef {
    /// Validated core coordinates for this cell reference.
    pub fn decode(&self) -> Result<(NaiveDate, u8, SlotIndex), CoreError> {
        let slot = SlotIndex::new(self.slot_index)?;
        // Re-run the week mapping purely for validation of the coordinates.
        clock::to_storage_slot_in_week(self.week_start, self.day_in_week, slot)?;
        Ok((self.week_start, self.day_in_week, slot))
    }
}
