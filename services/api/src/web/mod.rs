pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use rest::{
    cancel_booking_handler, complete_slot_handler, create_offer_handler,
    create_reschedule_handler, delete_offer_handler, escalate_dispute_handler,
    finalize_slot_handler, get_booking_handler, get_schedule_handler, list_bookings_handler,
    raise_dispute_handler, resolve_dispute_handler, respond_reschedule_handler,
    update_offer_handler,
};
