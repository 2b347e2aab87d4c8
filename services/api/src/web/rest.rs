//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. Handlers fetch fresh state
//! through the port, run the core validation, and persist through a single
//! port mutation, so a rejected operation never leaves partially
//! applied state behind.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::error;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

use tutoring_core::clock::{self, SlotIndex};
use tutoring_core::domain::OfferDraft;
use tutoring_core::error::CoreError;
use tutoring_core::lifecycle::{self, CompletionOutcome};
use tutoring_core::matrix::{SlotAvailabilityMatrix, SlotCellStatus};
use tutoring_core::pattern::PatternIndex;
use tutoring_core::ports::PortError;
use tutoring_core::selector::{self, OfferSlotSelector};
use tutoring_core::{dispute, reschedule};

use crate::web::protocol::*;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_schedule_handler,
        list_bookings_handler,
        get_booking_handler,
        create_offer_handler,
        update_offer_handler,
        delete_offer_handler,
        complete_slot_handler,
        finalize_slot_handler,
        cancel_booking_handler,
        create_reschedule_handler,
        respond_reschedule_handler,
        raise_dispute_handler,
        escalate_dispute_handler,
        resolve_dispute_handler,
    ),
    components(schemas(
        CellStatusDto,
        BookingStatusDto,
        SlotStatusDto,
        FundStatusDto,
        RescheduleStatusDto,
        DisputeStatusDto,
        RescheduleDecisionDto,
        DisputeOutcomeDto,
        CompletionOutcomeDto,
        SlotCellDto,
        DayScheduleDto,
        ScheduleResponse,
        HeldFundDto,
        BookedSlotDto,
        BookingSummaryDto,
        BookingPageResponse,
        BookingDetailResponse,
        CancelBookingRequest,
        SlotTransitionResponse,
        GridCellRef,
        CreateOfferRequest,
        UpdateOfferRequest,
        OfferedSlotDto,
        OfferResponse,
        OfferUpdateResponse,
        CreateRescheduleRequest,
        RespondRescheduleRequest,
        RescheduleResponseDto,
        RaiseDisputeRequest,
        ResolveDisputeRequest,
        DisputeDto,
    )),
    tags(
        (name = "Tutoring Marketplace API", description = "Slot-based availability and booking endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a core validation error onto an HTTP rejection. Validation failures
/// are the caller's problem (4xx); backend faults are logged and surfaced as
/// 5xx-class responses.
fn core_error_response(err: CoreError) -> (StatusCode, String) {
    let status = match &err {
        CoreError::InvalidTimestamp(_)
        | CoreError::NoSlotsSelected
        | CoreError::EmptyReasonRequired => StatusCode::BAD_REQUEST,
        CoreError::SlotNotFound(_) | CoreError::Backend(PortError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        CoreError::Backend(PortError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
        CoreError::Backend(PortError::Unexpected(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::CONFLICT,
    };
    if status.is_server_error() {
        error!("backend failure: {err}");
    }
    (status, err.to_string())
}

fn port_error_response(err: PortError) -> (StatusCode, String) {
    core_error_response(CoreError::Backend(err))
}

fn missing_slot(slot_id: Uuid) -> (StatusCode, String) {
    core_error_response(CoreError::SlotNotFound(slot_id))
}

//=========================================================================================
// Availability Helpers
//=========================================================================================

/// Builds the snapshot grid for one storage-time week, fresh from the
/// backend: resolved pattern, occupancies, and pending reschedule targets.
async fn build_week_matrix(
    app_state: &AppState,
    tutor_id: Uuid,
    week_start: NaiveDate,
    patterns: &PatternIndex,
    now: DateTime<Utc>,
) -> Result<SlotAvailabilityMatrix, (StatusCode, String)> {
    let week_end = week_start + Duration::days(6);
    let occupancies = app_state
        .store
        .get_schedule_window(tutor_id, week_start, week_end)
        .await
        .map_err(port_error_response)?;
    let reserved = app_state
        .store
        .get_pending_reschedule_targets(tutor_id, week_start, week_end)
        .await
        .map_err(port_error_response)?;
    Ok(SlotAvailabilityMatrix::build(
        patterns.resolve(week_start),
        week_start,
        week_end,
        &occupancies,
        &reserved,
        now,
    ))
}

/// Week-keyed matrix cache for offer submissions that span several weeks.
/// Every submission starts with an empty cache, so each grid is a fresh
/// snapshot for that request.
async fn matrix_for_date<'a>(
    cache: &'a mut HashMap<NaiveDate, SlotAvailabilityMatrix>,
    app_state: &AppState,
    tutor_id: Uuid,
    storage_date: NaiveDate,
    patterns: &PatternIndex,
    now: DateTime<Utc>,
) -> Result<&'a SlotAvailabilityMatrix, (StatusCode, String)> {
    let monday = clock::monday_of(storage_date);
    if !cache.contains_key(&monday) {
        let matrix = build_week_matrix(app_state, tutor_id, monday, patterns, now).await?;
        cache.insert(monday, matrix);
    }
    Ok(&cache[&monday])
}

async fn pattern_index(
    app_state: &AppState,
    tutor_id: Uuid,
) -> Result<PatternIndex, (StatusCode, String)> {
    let patterns = app_state
        .store
        .get_weekly_patterns(tutor_id)
        .await
        .map_err(port_error_response)?;
    Ok(PatternIndex::new(patterns))
}

//=========================================================================================
// Schedule Handlers
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct ScheduleQuery {
    /// Monday of the requested storage-time week.
    pub week_start: NaiveDate,
}

/// The tutor's availability grid for one week.
#[utoipa::path(
    get,
    path = "/tutors/{tutor_id}/schedule",
    params(("tutor_id" = Uuid, Path, description = "The tutor's ID."), ScheduleQuery),
    responses(
        (status = 200, description = "The grid for the requested week", body = ScheduleResponse),
        (status = 400, description = "week_start is not a Monday")
    )
)]
pub async fn get_schedule_handler(
    State(app_state): State<Arc<AppState>>,
    Path(tutor_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if clock::monday_of(query.week_start) != query.week_start {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("week_start {} is not a Monday", query.week_start),
        ));
    }

    let now = Utc::now();
    let patterns = pattern_index(&app_state, tutor_id).await?;
    let matrix = build_week_matrix(&app_state, tutor_id, query.week_start, &patterns, now).await?;
    let days = matrix
        .day_schedules()
        .iter()
        .map(DayScheduleDto::from_day)
        .collect();

    Ok(Json(ScheduleResponse {
        tutor_id,
        week_start: query.week_start,
        days,
    }))
}

//=========================================================================================
// Booking Handlers
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct PageQuery {
    pub page_index: Option<u32>,
    pub page_size: Option<u32>,
}

/// A page of bookings, newest first.
#[utoipa::path(
    get,
    path = "/bookings",
    params(PageQuery),
    responses((status = 200, description = "One page of bookings", body = BookingPageResponse))
)]
pub async fn list_bookings_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page_index = query.page_index.unwrap_or(0);
    let page_size = query
        .page_size
        .unwrap_or(app_state.config.default_page_size);

    let page = app_state
        .store
        .get_booking_page(page_index, page_size)
        .await
        .map_err(port_error_response)?;

    Ok(Json(BookingPageResponse {
        items: page.items.iter().map(BookingSummaryDto::from_domain).collect(),
        total_items: page.total_items,
    }))
}

/// One booking with its slots, funds and derived aggregate status.
#[utoipa::path(
    get,
    path = "/bookings/{booking_id}",
    params(("booking_id" = Uuid, Path, description = "The booking's ID.")),
    responses(
        (status = 200, description = "The booking detail", body = BookingDetailResponse),
        (status = 404, description = "No such booking")
    )
)]
pub async fn get_booking_handler(
    State(app_state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let booking = app_state
        .store
        .get_booking_detail(booking_id)
        .await
        .map_err(port_error_response)?;
    let disputes = app_state
        .store
        .get_disputes_for_booking(booking_id)
        .await
        .map_err(port_error_response)?;

    let derived = lifecycle::derive_booking_status(&booking, &disputes);
    Ok(Json(BookingDetailResponse {
        summary: BookingSummaryDto::from_domain(&booking),
        derived_status: derived.into(),
        slots: booking.slots.iter().map(BookedSlotDto::from_domain).collect(),
    }))
}

/// Marks a slot's session as held; it enters the dispute grace window.
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/complete",
    params(("slot_id" = Uuid, Path, description = "The booked slot's ID.")),
    responses(
        (status = 200, description = "Completion applied (or already applied)", body = SlotTransitionResponse),
        (status = 409, description = "Out of order, cancelled, or terminal booking")
    )
)]
pub async fn complete_slot_handler(
    State(app_state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut booking = app_state
        .store
        .get_booking_for_slot(slot_id)
        .await
        .map_err(port_error_response)?;

    let outcome = lifecycle::complete_slot(&mut booking, slot_id).map_err(core_error_response)?;
    if outcome == CompletionOutcome::Transitioned {
        app_state
            .store
            .save_booking(&booking)
            .await
            .map_err(port_error_response)?;
    }

    let slot = booking.slot(slot_id).ok_or_else(|| missing_slot(slot_id))?;
    Ok(Json(SlotTransitionResponse {
        booking_id: booking.id,
        slot_id,
        outcome: outcome.into(),
        slot_status: slot.status.into(),
    }))
}

/// Finalizes a held slot after its grace window: the session becomes
/// `completed` and the escrow is released to the tutor. Called by the
/// release timer, so repeated calls are no-ops.
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/finalize",
    params(("slot_id" = Uuid, Path, description = "The booked slot's ID.")),
    responses(
        (status = 200, description = "Finalization applied (or already applied)", body = SlotTransitionResponse),
        (status = 409, description = "Slot not held, or an open dispute blocks it")
    )
)]
pub async fn finalize_slot_handler(
    State(app_state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut booking = app_state
        .store
        .get_booking_for_slot(slot_id)
        .await
        .map_err(port_error_response)?;
    let disputes = app_state
        .store
        .get_disputes_for_booking(booking.id)
        .await
        .map_err(port_error_response)?;

    let outcome =
        lifecycle::finalize_slot(&mut booking, slot_id, &disputes).map_err(core_error_response)?;
    if outcome == CompletionOutcome::Transitioned {
        app_state
            .store
            .save_booking(&booking)
            .await
            .map_err(port_error_response)?;
    }

    let slot = booking.slot(slot_id).ok_or_else(|| missing_slot(slot_id))?;
    Ok(Json(SlotTransitionResponse {
        booking_id: booking.id,
        slot_id,
        outcome: outcome.into(),
        slot_status: slot.status.into(),
    }))
}

/// Cancels a booking and all of its open slots.
#[utoipa::path(
    post,
    path = "/bookings/{booking_id}/cancel",
    params(("booking_id" = Uuid, Path, description = "The booking's ID.")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "The cancelled booking", body = BookingSummaryDto),
        (status = 400, description = "Missing reason"),
        (status = 409, description = "Booking already terminal")
    )
)]
pub async fn cancel_booking_handler(
    State(app_state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut booking = app_state
        .store
        .get_booking_detail(booking_id)
        .await
        .map_err(port_error_response)?;

    lifecycle::cancel_booking(&mut booking, &payload.reason).map_err(core_error_response)?;
    app_state
        .store
        .save_booking(&booking)
        .await
        .map_err(port_error_response)?;

    Ok(Json(BookingSummaryDto::from_domain(&booking)))
}

//=========================================================================================
// Offer Handlers
//=========================================================================================

/// Validates every referenced grid cell against a fresh weekly snapshot and
/// feeds it through the selector; the selector owns the can-select rules.
async fn select_cells(
    app_state: &AppState,
    tutor_id: Uuid,
    selector: &mut OfferSlotSelector,
    cells: &[GridCellRef],
    patterns: &PatternIndex,
    now: DateTime<Utc>,
) -> Result<(), (StatusCode, String)> {
    let mut matrices = HashMap::new();
    for cell in cells {
        let (week_start, day_in_week, slot) = cell.decode().map_err(core_error_response)?;
        if selector.is_selected(week_start, day_in_week, slot) {
            continue;
        }
        let (storage_date, storage_slot) =
            clock::to_storage_slot_in_week(week_start, day_in_week, slot)
                .map_err(core_error_response)?;
        let matrix =
            matrix_for_date(&mut matrices, app_state, tutor_id, storage_date, patterns, now)
                .await?;
        let status = matrix.cell(storage_date, storage_slot);
        selector
            .toggle(status, week_start, day_in_week, slot, now)
            .map_err(core_error_response)?;
    }
    Ok(())
}

/// Creates an offer from the tutor's grid selection.
#[utoipa::path(
    post,
    path = "/offers",
    request_body = CreateOfferRequest,
    responses(
        (status = 201, description = "The created offer", body = OfferResponse),
        (status = 400, description = "Empty selection or malformed cell"),
        (status = 409, description = "A referenced cell is not selectable")
    )
)]
pub async fn create_offer_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateOfferRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let patterns = pattern_index(&app_state, payload.tutor_id).await?;

    let mut selector = OfferSlotSelector::for_new_offer();
    select_cells(
        &app_state,
        payload.tutor_id,
        &mut selector,
        &payload.slots,
        &patterns,
        now,
    )
    .await?;
    let slots = selector.submit().map_err(core_error_response)?;

    let offer = app_state
        .store
        .create_offer(OfferDraft {
            lesson_id: payload.lesson_id,
            tutor_id: payload.tutor_id,
            learner_id: payload.learner_id,
            price_per_slot_cents: payload.price_per_slot_cents,
            duration_minutes: payload.duration_minutes,
            slots,
        })
        .await
        .map_err(port_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(OfferResponse::from_domain(&offer, now)),
    ))
}

/// Replaces an offer's slot set; validation is identical to create, and the
/// response carries the added/removed summary for the learner.
#[utoipa::path(
    put,
    path = "/offers/{offer_id}",
    params(("offer_id" = Uuid, Path, description = "The offer's ID.")),
    request_body = UpdateOfferRequest,
    responses(
        (status = 200, description = "The updated offer with its change summary", body = OfferUpdateResponse),
        (status = 404, description = "No such offer"),
        (status = 409, description = "Offer expired or a cell is not selectable")
    )
)]
pub async fn update_offer_handler(
    State(app_state): State<Arc<AppState>>,
    Path(offer_id): Path<Uuid>,
    Json(payload): Json<UpdateOfferRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let offer = app_state
        .store
        .get_offer(offer_id)
        .await
        .map_err(port_error_response)?;
    offer.ensure_not_expired(now).map_err(core_error_response)?;

    let patterns = pattern_index(&app_state, offer.tutor_id).await?;
    let mut selector = OfferSlotSelector::for_offer(&offer).map_err(core_error_response)?;

    // Deselect everything the new submission no longer references.
    let requested: BTreeSet<(NaiveDate, u8, u8)> = payload
        .slots
        .iter()
        .map(|cell| {
            cell.decode()
                .map(|(week, day, slot)| (week, day, slot.get()))
                .map_err(core_error_response)
        })
        .collect::<Result<_, _>>()?;
    let current: Vec<(NaiveDate, u8, SlotIndex)> = selector
        .selections()
        .map(|(week, s)| (week, s.day_in_week, s.slot_index))
        .collect();
    for (week_start, day_in_week, slot) in current {
        if !requested.contains(&(week_start, day_in_week, slot.get())) {
            // Deselection ignores the cell status argument.
            selector
                .toggle(SlotCellStatus::OnHold, week_start, day_in_week, slot, now)
                .map_err(core_error_response)?;
        }
    }

    select_cells(
        &app_state,
        offer.tutor_id,
        &mut selector,
        &payload.slots,
        &patterns,
        now,
    )
    .await?;
    let new_slots = selector.submit().map_err(core_error_response)?;
    let diff = selector::diff_slots(&offer.slots, &new_slots);

    let mut updated = offer;
    updated.price_per_slot_cents = payload.price_per_slot_cents;
    updated.duration_minutes = payload.duration_minutes;
    updated.total_price_cents = payload.price_per_slot_cents * new_slots.len() as i64;
    updated.slots = new_slots;
    updated.updated_at = now;

    app_state
        .store
        .update_offer(&updated)
        .await
        .map_err(port_error_response)?;

    Ok(Json(OfferUpdateResponse::from_domain(&updated, &diff, now)))
}

/// Withdraws an offer entirely.
#[utoipa::path(
    delete,
    path = "/offers/{offer_id}",
    params(("offer_id" = Uuid, Path, description = "The offer's ID.")),
    responses(
        (status = 204, description = "Offer deleted"),
        (status = 404, description = "No such offer")
    )
)]
pub async fn delete_offer_handler(
    State(app_state): State<Arc<AppState>>,
    Path(offer_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .store
        .delete_offer(offer_id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Reschedule Handlers
//=========================================================================================

/// Proposes moving one booked slot to a new time.
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/reschedule",
    params(("slot_id" = Uuid, Path, description = "The booked slot's ID.")),
    request_body = CreateRescheduleRequest,
    responses(
        (status = 201, description = "The pending reschedule request", body = RescheduleResponseDto),
        (status = 409, description = "Slot not pending, too late, or target unavailable")
    )
)]
pub async fn create_reschedule_handler(
    State(app_state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
    Json(payload): Json<CreateRescheduleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let booking = app_state
        .store
        .get_booking_for_slot(slot_id)
        .await
        .map_err(port_error_response)?;
    let original = booking.slot(slot_id).ok_or_else(|| missing_slot(slot_id))?;

    let new_slot = SlotIndex::new(payload.new_slot_index).map_err(core_error_response)?;
    let patterns = pattern_index(&app_state, booking.tutor_id).await?;
    let matrix = build_week_matrix(
        &app_state,
        booking.tutor_id,
        clock::monday_of(payload.new_date),
        &patterns,
        now,
    )
    .await?;

    let request = reschedule::create_request(
        original,
        &payload.reason,
        payload.new_date,
        new_slot,
        &matrix,
        now,
    )
    .map_err(core_error_response)?;

    app_state
        .store
        .create_reschedule_request(&request)
        .await
        .map_err(port_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(RescheduleResponseDto::from_domain(&request)),
    ))
}

/// Accepts or rejects a pending reschedule request.
#[utoipa::path(
    post,
    path = "/reschedules/{request_id}/respond",
    params(("request_id" = Uuid, Path, description = "The reschedule request's ID.")),
    request_body = RespondRescheduleRequest,
    responses(
        (status = 200, description = "The settled request", body = RescheduleResponseDto),
        (status = 409, description = "Request already settled or lapsed")
    )
)]
pub async fn respond_reschedule_handler(
    State(app_state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<RespondRescheduleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let mut request = app_state
        .store
        .get_reschedule_request(request_id)
        .await
        .map_err(port_error_response)?;
    let mut booking = app_state
        .store
        .get_booking_for_slot(request.booked_slot_id)
        .await
        .map_err(port_error_response)?;

    let slot_id = request.booked_slot_id;
    let original = booking.slot_mut(slot_id).ok_or_else(|| missing_slot(slot_id))?;
    let result = reschedule::respond(&mut request, original, payload.decision.into(), now);

    // Persist the request's status even when it lapsed in place, so the
    // reservation on the target cell drops either way.
    app_state
        .store
        .save_reschedule_request(&request)
        .await
        .map_err(port_error_response)?;
    result.map_err(core_error_response)?;

    if request.status == tutoring_core::domain::RescheduleStatus::Accepted {
        app_state
            .store
            .save_booking(&booking)
            .await
            .map_err(port_error_response)?;
    }

    Ok(Json(RescheduleResponseDto::from_domain(&request)))
}

//=========================================================================================
// Dispute Handlers
//=========================================================================================

/// Raises a dispute against a held slot inside its grace window.
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/disputes",
    params(("slot_id" = Uuid, Path, description = "The booked slot's ID.")),
    request_body = RaiseDisputeRequest,
    responses(
        (status = 201, description = "The opened dispute", body = DisputeDto),
        (status = 409, description = "Slot not in its grace window, or already disputed")
    )
)]
pub async fn raise_dispute_handler(
    State(app_state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
    Json(payload): Json<RaiseDisputeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let mut booking = app_state
        .store
        .get_booking_for_slot(slot_id)
        .await
        .map_err(port_error_response)?;
    let disputes = app_state
        .store
        .get_disputes_for_booking(booking.id)
        .await
        .map_err(port_error_response)?;
    let case_seq = app_state
        .store
        .next_case_number()
        .await
        .map_err(port_error_response)?;

    let slot = booking.slot_mut(slot_id).ok_or_else(|| missing_slot(slot_id))?;
    let dispute = dispute::raise(
        slot,
        &disputes,
        format!("DSP-{case_seq:06}"),
        &payload.reason,
        now,
    )
    .map_err(core_error_response)?;

    app_state
        .store
        .create_dispute(&dispute)
        .await
        .map_err(port_error_response)?;
    // The raise froze the slot's escrow.
    app_state
        .store
        .save_booking(&booking)
        .await
        .map_err(port_error_response)?;

    Ok((StatusCode::CREATED, Json(DisputeDto::from_domain(&dispute))))
}

/// Escalates a dispute to staff review.
#[utoipa::path(
    post,
    path = "/disputes/{dispute_id}/escalate",
    params(("dispute_id" = Uuid, Path, description = "The dispute's ID.")),
    responses(
        (status = 200, description = "The escalated dispute", body = DisputeDto),
        (status = 409, description = "Dispute not awaiting reconciliation")
    )
)]
pub async fn escalate_dispute_handler(
    State(app_state): State<Arc<AppState>>,
    Path(dispute_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut found = app_state
        .store
        .get_dispute(dispute_id)
        .await
        .map_err(port_error_response)?;

    dispute::escalate(&mut found).map_err(core_error_response)?;
    app_state
        .store
        .save_dispute(&found)
        .await
        .map_err(port_error_response)?;

    Ok(Json(DisputeDto::from_domain(&found)))
}

/// Applies a staff verdict, driving the slot and its escrow to their
/// terminal states.
#[utoipa::path(
    post,
    path = "/disputes/{dispute_id}/resolve",
    params(("dispute_id" = Uuid, Path, description = "The dispute's ID.")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, description = "The resolved dispute", body = DisputeDto),
        (status = 409, description = "Dispute already settled")
    )
)]
pub async fn resolve_dispute_handler(
    State(app_state): State<Arc<AppState>>,
    Path(dispute_id): Path<Uuid>,
    Json(payload): Json<ResolveDisputeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut found = app_state
        .store
        .get_dispute(dispute_id)
        .await
        .map_err(port_error_response)?;
    let mut booking = app_state
        .store
        .get_booking_for_slot(found.booked_slot_id)
        .await
        .map_err(port_error_response)?;

    let slot_id = found.booked_slot_id;
    let slot = booking.slot_mut(slot_id).ok_or_else(|| missing_slot(slot_id))?;
    dispute::resolve(&mut found, slot, payload.outcome.into()).map_err(core_error_response)?;

    app_state
        .store
        .save_dispute(&found)
        .await
        .map_err(port_error_response)?;
    app_state
        .store
        .save_booking(&booking)
        .await
        .map_err(port_error_response)?;

    Ok(Json(DisputeDto::from_domain(&found)))
}
