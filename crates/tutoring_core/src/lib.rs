pub mod clock;
pub mod dispute;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod matrix;
pub mod pattern;
pub mod ports;
pub mod reschedule;
pub mod selector;

pub use clock::{DisplaySlot, SlotIndex, DISPLAY_OFFSET_HOURS, SLOTS_PER_DAY};
pub use domain::{
    BookedSlot, BookedSlotStatus, Booking, BookingPage, BookingStatus, Dispute, DisputeOutcome,
    DisputeStatus, HeldFund, HeldFundStatus, Offer, OfferDraft, OfferedSlot, RescheduleRequest,
    RescheduleStatus, WeeklyAvailabilityPattern,
};
pub use error::CoreError;
pub use lifecycle::CompletionOutcome;
pub use matrix::{DaySchedule, OccupancyKind, SlotAvailabilityMatrix, SlotCellStatus, SlotOccupancy};
pub use pattern::PatternIndex;
pub use ports::{PortError, PortResult, SchedulingBackend};
pub use reschedule::RescheduleDecision;
pub use selector::{OfferSlotSelector, SlotSelection, SlotSelectionDiff};
