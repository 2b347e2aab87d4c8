//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `SchedulingBackend` port from the core crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`, and it is the only
//! place where the status enums are mapped to their small-integer wire form.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tutoring_core::clock::SlotIndex;
use tutoring_core::domain::{
    BookedSlot, BookedSlotStatus, Booking, BookingPage, BookingStatus, Dispute, DisputeStatus,
    HeldFund, HeldFundStatus, Offer, OfferDraft, OfferedSlot, RescheduleRequest,
    RescheduleStatus, WeeklyAvailabilityPattern, OFFER_TTL_HOURS,
};
use tutoring_core::matrix::{OccupancyKind, SlotOccupancy};
use tutoring_core::ports::{PortError, PortResult, SchedulingBackend};
use tutoring_core::reschedule::RESPONSE_WINDOW_HOURS;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SchedulingBackend` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps driver errors to the port error taxonomy: transport-level failures
/// become `Unavailable`, everything else `Unexpected`. Row lookups map
/// `RowNotFound` at the call site, where the missing entity is known.
fn to_port(err: sqlx::Error) -> PortError {
    match &err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            PortError::Unavailable(err.to_string())
        }
        _ => PortError::Unexpected(err.to_string()),
    }
}

//=========================================================================================
// Wire Encodings (kept out of the core on purpose)
//=========================================================================================

fn booking_status_to_wire(status: BookingStatus) -> i16 {
    match status {
        BookingStatus::Confirmed => 0,
        BookingStatus::DisputeRequested => 1,
        BookingStatus::Disputed => 2,
        BookingStatus::Cancelled => 3,
        BookingStatus::Complete => 4,
    }
}

fn booking_status_from_wire(raw: i16) -> PortResult<BookingStatus> {
    match raw {
        0 => Ok(BookingStatus::Confirmed),
        1 => Ok(BookingStatus::DisputeRequested),
        2 => Ok(BookingStatus::Disputed),
        3 => Ok(BookingStatus::Cancelled),
        4 => Ok(BookingStatus::Complete),
        _ => Err(PortError::Unexpected(format!("unknown booking status {raw}"))),
    }
}

fn slot_status_to_wire(status: BookedSlotStatus) -> i16 {
    match status {
        BookedSlotStatus::Pending => 0,
        BookedSlotStatus::AwaitingConfirmation => 1,
        BookedSlotStatus::Completed => 2,
        BookedSlotStatus::Cancelled => 3,
        BookedSlotStatus::CancelledDisputed => 4,
    }
}

fn slot_status_from_wire(raw: i16) -> PortResult<BookedSlotStatus> {
    match raw {
        0 => Ok(BookedSlotStatus::Pending),
        1 => Ok(BookedSlotStatus::AwaitingConfirmation),
        2 => Ok(BookedSlotStatus::Completed),
        3 => Ok(BookedSlotStatus::Cancelled),
        4 => Ok(BookedSlotStatus::CancelledDisputed),
        _ => Err(PortError::Unexpected(format!("unknown slot status {raw}"))),
    }
}

fn fund_status_to_wire(status: HeldFundStatus) -> i16 {
    match status {
        HeldFundStatus::Held => 0,
        HeldFundStatus::ReleasedToTutor => 1,
        HeldFundStatus::RefundedToLearner => 2,
        HeldFundStatus::Disputed => 3,
        HeldFundStatus::ReturnedToTutorAccount => 4,
    }
}

fn fund_status_from_wire(raw: i16) -> PortResult<HeldFundStatus> {
    match raw {
        0 => Ok(HeldFundStatus::Held),
        1 => Ok(HeldFundStatus::ReleasedToTutor),
        2 => Ok(HeldFundStatus::RefundedToLearner),
        3 => Ok(HeldFundStatus::Disputed),
        4 => Ok(HeldFundStatus::ReturnedToTutorAccount),
        _ => Err(PortError::Unexpected(format!("unknown fund status {raw}"))),
    }
}

fn reschedule_status_to_wire(status: RescheduleStatus) -> i16 {
    match status {
        RescheduleStatus::PendingResponse => 0,
        RescheduleStatus::Accepted => 1,
        RescheduleStatus::Rejected => 2,
    }
}

fn reschedule_status_from_wire(raw: i16) -> PortResult<RescheduleStatus> {
    match raw {
        0 => Ok(RescheduleStatus::PendingResponse),
        1 => Ok(RescheduleStatus::Accepted),
        2 => Ok(RescheduleStatus::Rejected),
        _ => Err(PortError::Unexpected(format!("unknown reschedule status {raw}"))),
    }
}

fn dispute_status_to_wire(status: DisputeStatus) -> i16 {
    match status {
        DisputeStatus::PendingReconciliation => 0,
        DisputeStatus::AwaitingStaffReview => 1,
        DisputeStatus::ClosedWithdrawn => 2,
        DisputeStatus::ClosedResolved => 3,
        DisputeStatus::ResolvedLearnerWin => 4,
        DisputeStatus::ResolvedTutorWin => 5,
        DisputeStatus::ResolvedDraw => 6,
    }
}

fn dispute_status_from_wire(raw: i16) -> PortResult<DisputeStatus> {
    match raw {
        0 => Ok(DisputeStatus::PendingReconciliation),
        1 => Ok(DisputeStatus::AwaitingStaffReview),
        2 => Ok(DisputeStatus::ClosedWithdrawn),
        3 => Ok(DisputeStatus::ClosedResolved),
        4 => Ok(DisputeStatus::ResolvedLearnerWin),
        5 => Ok(DisputeStatus::ResolvedTutorWin),
        6 => Ok(DisputeStatus::ResolvedDraw),
        _ => Err(PortError::Unexpected(format!("unknown dispute status {raw}"))),
    }
}

/// The §6 schedule-window occupancy encoding: 0=open, 1=onhold, 2=booked.
fn occupancy_from_wire(raw: i16) -> PortResult<OccupancyKind> {
    match raw {
        0 => Ok(OccupancyKind::Open),
        1 => Ok(OccupancyKind::OnHold),
        2 => Ok(OccupancyKind::Booked),
        _ => Err(PortError::Unexpected(format!("unknown occupancy type {raw}"))),
    }
}

fn slot_index_from_wire(raw: i16) -> PortResult<SlotIndex> {
    u8::try_from(raw)
        .ok()
        .and_then(|r| SlotIndex::new(r).ok())
        .ok_or_else(|| PortError::Unexpected(format!("invalid stored slot index {raw}")))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PatternRecord {
    id: Uuid,
    tutor_id: Uuid,
    applied_from: NaiveDate,
    created_seq: i64,
}

#[derive(FromRow)]
struct PatternSlotRecord {
    pattern_id: Uuid,
    day_in_week: i16,
    slot_index: i16,
}

#[derive(FromRow)]
struct BookingRecord {
    id: Uuid,
    learner_id: Uuid,
    tutor_id: Uuid,
    lesson_id: Uuid,
    status: i16,
    total_price_cents: i64,
    created_time: DateTime<Utc>,
}

#[derive(FromRow)]
struct BookedSlotRecord {
    id: Uuid,
    booking_id: Uuid,
    booked_date: NaiveDate,
    slot_index: i16,
    status: i16,
    note: Option<String>,
}

impl BookedSlotRecord {
    fn to_domain(self, fund: Option<HeldFund>) -> PortResult<BookedSlot> {
        Ok(BookedSlot {
            id: self.id,
            booking_id: self.booking_id,
            booked_date: self.booked_date,
            slot_index: slot_index_from_wire(self.slot_index)?,
            status: slot_status_from_wire(self.status)?,
            note: self.note,
            held_fund: fund,
        })
    }
}

#[derive(FromRow)]
struct HeldFundRecord {
    id: Uuid,
    booked_slot_id: Uuid,
    amount_cents: i64,
    status: i16,
}

impl HeldFundRecord {
    fn to_domain(self) -> PortResult<HeldFund> {
        Ok(HeldFund {
            id: self.id,
            booked_slot_id: self.booked_slot_id,
            amount_cents: self.amount_cents,
            status: fund_status_from_wire(self.status)?,
        })
    }
}

#[derive(FromRow)]
struct OfferRecord {
    id: Uuid,
    lesson_id: Uuid,
    tutor_id: Uuid,
    learner_id: Uuid,
    price_per_slot_cents: i64,
    total_price_cents: i64,
    duration_minutes: i32,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OfferRecord {
    fn to_domain(self, slots: Vec<OfferedSlot>) -> Offer {
        Offer {
            id: self.id,
            lesson_id: self.lesson_id,
            tutor_id: self.tutor_id,
            learner_id: self.learner_id,
            price_per_slot_cents: self.price_per_slot_cents,
            total_price_cents: self.total_price_cents,
            duration_minutes: self.duration_minutes as u32,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            slots,
        }
    }
}

#[derive(FromRow)]
struct OfferedSlotRecord {
    slot_date_time: DateTime<Utc>,
    slot_index: i16,
}

impl OfferedSlotRecord {
    fn to_domain(self) -> PortResult<OfferedSlot> {
        Ok(OfferedSlot {
            slot_date_time: self.slot_date_time,
            slot_index: slot_index_from_wire(self.slot_index)?,
        })
    }
}

#[derive(FromRow)]
struct RescheduleRecord {
    id: Uuid,
    booked_slot_id: Uuid,
    reason: String,
    new_slot_date_time: DateTime<Utc>,
    new_slot_index: i16,
    status: i16,
    requested_at: DateTime<Utc>,
}

impl RescheduleRecord {
    fn to_domain(self) -> PortResult<RescheduleRequest> {
        Ok(RescheduleRequest {
            id: self.id,
            booked_slot_id: self.booked_slot_id,
            reason: self.reason,
            new_slot_date_time: self.new_slot_date_time,
            new_slot_index: slot_index_from_wire(self.new_slot_index)?,
            status: reschedule_status_from_wire(self.status)?,
            requested_at: self.requested_at,
        })
    }
}

#[derive(FromRow)]
struct DisputeRecord {
    id: Uuid,
    case_number: String,
    booked_slot_id: Uuid,
    learner_reason: String,
    status: i16,
    raised_at: DateTime<Utc>,
}

impl DisputeRecord {
    fn to_domain(self) -> PortResult<Dispute> {
        Ok(Dispute {
            id: self.id,
            case_number: self.case_number,
            booked_slot_id: self.booked_slot_id,
            learner_reason: self.learner_reason,
            status: dispute_status_from_wire(self.status)?,
            raised_at: self.raised_at,
        })
    }
}

#[derive(FromRow)]
struct OccupancyRecord {
    date: NaiveDate,
    slot_index: i16,
    kind: i16,
}

impl OccupancyRecord {
    fn to_domain(self) -> PortResult<SlotOccupancy> {
        Ok(SlotOccupancy {
            date: self.date,
            slot_index: slot_index_from_wire(self.slot_index)?,
            kind: occupancy_from_wire(self.kind)?,
        })
    }
}

//=========================================================================================
// Assembly Helpers
//=========================================================================================

impl DbAdapter {
    /// Attaches slots (and their funds) to a set of booking rows, using one
    /// query per table instead of one per booking.
    async fn attach_slots(&self, records: Vec<BookingRecord>) -> PortResult<Vec<Booking>> {
        let booking_ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let slot_records = sqlx::query_as::<_, BookedSlotRecord>(
            "SELECT id, booking_id, booked_date, slot_index, status, note \
             FROM booked_slots WHERE booking_id = ANY($1) \
             ORDER BY booked_date ASC, slot_index ASC",
        )
        .bind(&booking_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        let slot_ids: Vec<Uuid> = slot_records.iter().map(|r| r.id).collect();
        let fund_records = sqlx::query_as::<_, HeldFundRecord>(
            "SELECT id, booked_slot_id, amount_cents, status \
             FROM held_funds WHERE booked_slot_id = ANY($1)",
        )
        .bind(&slot_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        let mut funds: HashMap<Uuid, HeldFund> = HashMap::new();
        for record in fund_records {
            let fund = record.to_domain()?;
            funds.insert(fund.booked_slot_id, fund);
        }

        let mut slots: HashMap<Uuid, Vec<BookedSlot>> = HashMap::new();
        for record in slot_records {
            let booking_id = record.booking_id;
            let fund = funds.remove(&record.id);
            slots
                .entry(booking_id)
                .or_default()
                .push(record.to_domain(fund)?);
        }

        records
            .into_iter()
            .map(|record| {
                Ok(Booking {
                    id: record.id,
                    learner_id: record.learner_id,
                    tutor_id: record.tutor_id,
                    lesson_id: record.lesson_id,
                    status: booking_status_from_wire(record.status)?,
                    total_price_cents: record.total_price_cents,
                    created_time: record.created_time,
                    slots: slots.remove(&record.id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn load_offer_slots(&self, offer_id: Uuid) -> PortResult<Vec<OfferedSlot>> {
        sqlx::query_as::<_, OfferedSlotRecord>(
            "SELECT slot_date_time, slot_index FROM offered_slots \
             WHERE offer_id = $1 ORDER BY slot_date_time ASC",
        )
        .bind(offer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?
        .into_iter()
        .map(OfferedSlotRecord::to_domain)
        .collect()
    }
}

//=========================================================================================
// `SchedulingBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl SchedulingBackend for DbAdapter {
    async fn get_weekly_patterns(
        &self,
        tutor_id: Uuid,
    ) -> PortResult<Vec<WeeklyAvailabilityPattern>> {
        let pattern_records = sqlx::query_as::<_, PatternRecord>(
            "SELECT id, tutor_id, applied_from, created_seq \
             FROM weekly_patterns WHERE tutor_id = $1",
        )
        .bind(tutor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        let ids: Vec<Uuid> = pattern_records.iter().map(|p| p.id).collect();
        let slot_records = sqlx::query_as::<_, PatternSlotRecord>(
            "SELECT pattern_id, day_in_week, slot_index \
             FROM pattern_slots WHERE pattern_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        let mut open_slots: HashMap<Uuid, [BTreeSet<SlotIndex>; 7]> = HashMap::new();
        for record in slot_records {
            let day = record.day_in_week;
            if !(0..7).contains(&day) {
                return Err(PortError::Unexpected(format!(
                    "invalid stored day of week {day}"
                )));
            }
            open_slots.entry(record.pattern_id).or_default()[day as usize]
                .insert(slot_index_from_wire(record.slot_index)?);
        }

        Ok(pattern_records
            .into_iter()
            .map(|record| WeeklyAvailabilityPattern {
                open_slots: open_slots.remove(&record.id).unwrap_or_default(),
                id: record.id,
                tutor_id: record.tutor_id,
                applied_from: record.applied_from,
                created_seq: record.created_seq,
            })
            .collect())
    }

    async fn get_schedule_window(
        &self,
        tutor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PortResult<Vec<SlotOccupancy>> {
        // Active booked slots; cancelled ones free their cell again.
        let booked = sqlx::query_as::<_, OccupancyRecord>(
            "SELECT s.booked_date AS date, s.slot_index, 2::smallint AS kind \
             FROM booked_slots s \
             JOIN bookings b ON b.id = s.booking_id \
             WHERE b.tutor_id = $1 \
               AND s.booked_date BETWEEN $2 AND $3 \
               AND s.status <> 3",
        )
        .bind(tutor_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        // Slots held by unexpired offers.
        let window_start = start_date.and_time(NaiveTime::MIN).and_utc();
        let window_end = (end_date + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
        let on_hold = sqlx::query_as::<_, OfferedSlotRecord>(
            "SELECT o.slot_date_time, o.slot_index \
             FROM offered_slots o \
             JOIN offers f ON f.id = o.offer_id \
             WHERE f.tutor_id = $1 \
               AND f.expires_at > $2 \
               AND o.slot_date_time >= $3 AND o.slot_date_time < $4",
        )
        .bind(tutor_id)
        .bind(Utc::now())
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        let mut occupancies = Vec::with_capacity(booked.len() + on_hold.len());
        for record in booked {
            occupancies.push(record.to_domain()?);
        }
        for record in on_hold {
            let slot = record.to_domain()?;
            occupancies.push(SlotOccupancy {
                date: slot.slot_date_time.date_naive(),
                slot_index: slot.slot_index,
                kind: OccupancyKind::OnHold,
            });
        }
        Ok(occupancies)
    }

    async fn get_pending_reschedule_targets(
        &self,
        tutor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PortResult<Vec<(NaiveDate, SlotIndex)>> {
        let window_start = start_date.and_time(NaiveTime::MIN).and_utc();
        let window_end = (end_date + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
        // Requests still inside their response window.
        let cutoff = Utc::now() - Duration::hours(RESPONSE_WINDOW_HOURS);
        let records = sqlx::query_as::<_, OfferedSlotRecord>(
            "SELECT r.new_slot_date_time AS slot_date_time, r.new_slot_index AS slot_index \
             FROM reschedule_requests r \
             JOIN booked_slots s ON s.id = r.booked_slot_id \
             JOIN bookings b ON b.id = s.booking_id \
             WHERE b.tutor_id = $1 \
               AND r.status = 0 \
               AND r.requested_at > $2 \
               AND r.new_slot_date_time >= $3 AND r.new_slot_date_time < $4",
        )
        .bind(tutor_id)
        .bind(cutoff)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        records
            .into_iter()
            .map(|record| {
                let slot = record.to_domain()?;
                Ok((slot.slot_date_time.date_naive(), slot.slot_index))
            })
            .collect()
    }

    async fn get_booking_page(&self, page_index: u32, page_size: u32) -> PortResult<BookingPage> {
        let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(to_port)?;

        let records = sqlx::query_as::<_, BookingRecord>(
            "SELECT id, learner_id, tutor_id, lesson_id, status, total_price_cents, created_time \
             FROM bookings ORDER BY created_time DESC OFFSET $1 LIMIT $2",
        )
        .bind(page_index as i64 * page_size as i64)
        .bind(page_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?;

        Ok(BookingPage {
            items: self.attach_slots(records).await?,
            total_items: total_items as u64,
        })
    }

    async fn get_booking_detail(&self, booking_id: Uuid) -> PortResult<Booking> {
        let record = sqlx::query_as::<_, BookingRecord>(
            "SELECT id, learner_id, tutor_id, lesson_id, status, total_price_cents, created_time \
             FROM bookings WHERE id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port)?
        .ok_or_else(|| PortError::NotFound(format!("Booking {} not found", booking_id)))?;

        let mut bookings = self.attach_slots(vec![record]).await?;
        bookings
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Booking {} not found", booking_id)))
    }

    async fn get_booking_for_slot(&self, booked_slot_id: Uuid) -> PortResult<Booking> {
        let record = sqlx::query_as::<_, BookingRecord>(
            "SELECT b.id, b.learner_id, b.tutor_id, b.lesson_id, b.status, \
                    b.total_price_cents, b.created_time \
             FROM bookings b \
             JOIN booked_slots s ON s.booking_id = b.id \
             WHERE s.id = $1",
        )
        .bind(booked_slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port)?
        .ok_or_else(|| PortError::NotFound(format!("Booked slot {} not found", booked_slot_id)))?;

        let mut bookings = self.attach_slots(vec![record]).await?;
        bookings
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Booked slot {} not found", booked_slot_id)))
    }

    async fn save_booking(&self, booking: &Booking) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(to_port)?;

        sqlx::query("UPDATE bookings SET status = $2, total_price_cents = $3 WHERE id = $1")
            .bind(booking.id)
            .bind(booking_status_to_wire(booking.status))
            .bind(booking.total_price_cents)
            .execute(&mut *tx)
            .await
            .map_err(to_port)?;

        for slot in &booking.slots {
            sqlx::query(
                "UPDATE booked_slots \
                 SET booked_date = $2, slot_index = $3, status = $4, note = $5 \
                 WHERE id = $1",
            )
            .bind(slot.id)
            .bind(slot.booked_date)
            .bind(slot.slot_index.get() as i16)
            .bind(slot_status_to_wire(slot.status))
            .bind(&slot.note)
            .execute(&mut *tx)
            .await
            .map_err(to_port)?;

            if let Some(fund) = &slot.held_fund {
                sqlx::query(
                    "INSERT INTO held_funds (id, booked_slot_id, amount_cents, status) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status",
                )
                .bind(fund.id)
                .bind(fund.booked_slot_id)
                .bind(fund.amount_cents)
                .bind(fund_status_to_wire(fund.status))
                .execute(&mut *tx)
                .await
                .map_err(to_port)?;
            }
        }

        tx.commit().await.map_err(to_port)
    }

    async fn get_offer(&self, offer_id: Uuid) -> PortResult<Offer> {
        let record = sqlx::query_as::<_, OfferRecord>(
            "SELECT id, lesson_id, tutor_id, learner_id, price_per_slot_cents, \
                    total_price_cents, duration_minutes, expires_at, created_at, updated_at \
             FROM offers WHERE id = $1",
        )
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port)?
        .ok_or_else(|| PortError::NotFound(format!("Offer {} not found", offer_id)))?;

        let slots = self.load_offer_slots(offer_id).await?;
        Ok(record.to_domain(slots))
    }

    async fn create_offer(&self, draft: OfferDraft) -> PortResult<Offer> {
        let now = Utc::now();
        let offer = Offer {
            id: Uuid::new_v4(),
            lesson_id: draft.lesson_id,
            tutor_id: draft.tutor_id,
            learner_id: draft.learner_id,
            price_per_slot_cents: draft.price_per_slot_cents,
            total_price_cents: draft.total_price_cents(),
            duration_minutes: draft.duration_minutes,
            expires_at: now + Duration::hours(OFFER_TTL_HOURS),
            created_at: now,
            updated_at: now,
            slots: draft.slots,
        };

        let mut tx = self.pool.begin().await.map_err(to_port)?;
        sqlx::query(
            "INSERT INTO offers (id, lesson_id, tutor_id, learner_id, price_per_slot_cents, \
                                 total_price_cents, duration_minutes, expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(offer.id)
        .bind(offer.lesson_id)
        .bind(offer.tutor_id)
        .bind(offer.learner_id)
        .bind(offer.price_per_slot_cents)
        .bind(offer.total_price_cents)
        .bind(offer.duration_minutes as i32)
        .bind(offer.expires_at)
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(to_port)?;

        for slot in &offer.slots {
            sqlx::query(
                "INSERT INTO offered_slots (offer_id, slot_date_time, slot_index) \
                 VALUES ($1, $2, $3)",
            )
            .bind(offer.id)
            .bind(slot.slot_date_time)
            .bind(slot.slot_index.get() as i16)
            .execute(&mut *tx)
            .await
            .map_err(to_port)?;
        }

        tx.commit().await.map_err(to_port)?;
        Ok(offer)
    }

    async fn update_offer(&self, offer: &Offer) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(to_port)?;

        let result = sqlx::query(
            "UPDATE offers \
             SET price_per_slot_cents = $2, total_price_cents = $3, duration_minutes = $4, \
                 updated_at = $5 \
             WHERE id = $1",
        )
        .bind(offer.id)
        .bind(offer.price_per_slot_cents)
        .bind(offer.total_price_cents)
        .bind(offer.duration_minutes as i32)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(to_port)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Offer {} not found", offer.id)));
        }

        sqlx::query("DELETE FROM offered_slots WHERE offer_id = $1")
            .bind(offer.id)
            .execute(&mut *tx)
            .await
            .map_err(to_port)?;
        for slot in &offer.slots {
            sqlx::query(
                "INSERT INTO offered_slots (offer_id, slot_date_time, slot_index) \
                 VALUES ($1, $2, $3)",
            )
            .bind(offer.id)
            .bind(slot.slot_date_time)
            .bind(slot.slot_index.get() as i16)
            .execute(&mut *tx)
            .await
            .map_err(to_port)?;
        }

        tx.commit().await.map_err(to_port)
    }

    async fn delete_offer(&self, offer_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(offer_id)
            .execute(&self.pool)
            .await
            .map_err(to_port)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Offer {} not found", offer_id)));
        }
        Ok(())
    }

    async fn create_reschedule_request(&self, request: &RescheduleRequest) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO reschedule_requests \
                 (id, booked_slot_id, reason, new_slot_date_time, new_slot_index, status, requested_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(request.id)
        .bind(request.booked_slot_id)
        .bind(&request.reason)
        .bind(request.new_slot_date_time)
        .bind(request.new_slot_index.get() as i16)
        .bind(reschedule_status_to_wire(request.status))
        .bind(request.requested_at)
        .execute(&self.pool)
        .await
        .map_err(to_port)?;
        Ok(())
    }

    async fn get_reschedule_request(&self, request_id: Uuid) -> PortResult<RescheduleRequest> {
        sqlx::query_as::<_, RescheduleRecord>(
            "SELECT id, booked_slot_id, reason, new_slot_date_time, new_slot_index, status, requested_at \
             FROM reschedule_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port)?
        .ok_or_else(|| PortError::NotFound(format!("Reschedule request {} not found", request_id)))?
        .to_domain()
    }

    async fn save_reschedule_request(&self, request: &RescheduleRequest) -> PortResult<()> {
        sqlx::query("UPDATE reschedule_requests SET status = $2 WHERE id = $1")
            .bind(request.id)
            .bind(reschedule_status_to_wire(request.status))
            .execute(&self.pool)
            .await
            .map_err(to_port)?;
        Ok(())
    }

    async fn create_dispute(&self, dispute: &Dispute) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO disputes (id, case_number, booked_slot_id, learner_reason, status, raised_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(dispute.id)
        .bind(&dispute.case_number)
        .bind(dispute.booked_slot_id)
        .bind(&dispute.learner_reason)
        .bind(dispute_status_to_wire(dispute.status))
        .bind(dispute.raised_at)
        .execute(&self.pool)
        .await
        .map_err(to_port)?;
        Ok(())
    }

    async fn get_dispute(&self, dispute_id: Uuid) -> PortResult<Dispute> {
        sqlx::query_as::<_, DisputeRecord>(
            "SELECT id, case_number, booked_slot_id, learner_reason, status, raised_at \
             FROM disputes WHERE id = $1",
        )
        .bind(dispute_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port)?
        .ok_or_else(|| PortError::NotFound(format!("Dispute {} not found", dispute_id)))?
        .to_domain()
    }

    async fn get_disputes_for_booking(&self, booking_id: Uuid) -> PortResult<Vec<Dispute>> {
        sqlx::query_as::<_, DisputeRecord>(
            "SELECT d.id, d.case_number, d.booked_slot_id, d.learner_reason, d.status, d.raised_at \
             FROM disputes d \
             JOIN booked_slots s ON s.id = d.booked_slot_id \
             WHERE s.booking_id = $1 \
             ORDER BY d.raised_at ASC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(to_port)?
        .into_iter()
        .map(DisputeRecord::to_domain)
        .collect()
    }

    async fn save_dispute(&self, dispute: &Dispute) -> PortResult<()> {
        sqlx::query("UPDATE disputes SET status = $2 WHERE id = $1")
            .bind(dispute.id)
            .bind(dispute_status_to_wire(dispute.status))
            .execute(&self.pool)
            .await
            .map_err(to_port)?;
        Ok(())
    }

    async fn next_case_number(&self) -> PortResult<i64> {
        sqlx::query_scalar("SELECT nextval('dispute_case_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(to_port)
    }
}
