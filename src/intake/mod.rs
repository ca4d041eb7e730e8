//! Intake pipelines — one per inbound event kind.
//!
//! Both pipelines run the same shape per invocation: validate, persist,
//! classify, act. Steps up to and including the first persist are fatal;
//! everything after is contained and degrades the outcome instead of
//! failing the request.

pub mod call;
pub mod message;

pub use call::{CallCompletion, CallIntake, TelephonyWebhook};
pub use message::{IncomingMessage, MessageIntake, MessageOutcome, OutgoingMessage};

use std::sync::Arc;

use uuid::Uuid;

use crate::classify::ClassifyContext;
use crate::store::Database;

/// Gather classification context from reference data, best-effort.
///
/// Lookups are tenant-scoped; anything unresolvable is simply omitted
/// from the context.
pub(crate) async fn gather_context(
    db: &Arc<dyn Database>,
    hotel_id: Uuid,
    guest_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    language: Option<String>,
) -> ClassifyContext {
    let hotel_name = db
        .get_hotel(hotel_id)
        .await
        .ok()
        .flatten()
        .map(|h| h.name);

    let guest_name = match guest_id {
        Some(id) => db
            .get_guest(hotel_id, id)
            .await
            .ok()
            .flatten()
            .map(|g| g.first_name),
        None => None,
    };

    let booking_ref = match booking_id {
        Some(id) => db
            .get_booking(hotel_id, id)
            .await
            .ok()
            .flatten()
            .map(|b| b.confirmation_number),
        None => None,
    };

    ClassifyContext {
        hotel_name,
        guest_name,
        booking_ref,
        prior_context: None,
        language,
    }
}
