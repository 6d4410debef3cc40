// The user's bookings and the cancel-confirmation dialog
use crate::catalog_client::{ApiError, CatalogClient};
use crate::models::{Booking, BookingId, BookingStatus};
use crate::notice::Notice;
use crate::session::Session;
use thiserror::Error;
use tracing::{info, warn};

pub const LOAD_FAILED: &str = "Failed to load bookings";
pub const CANCEL_FAILED: &str = "Failed to cancel booking";
pub const CANCELLED: &str = "Booking cancelled successfully";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CancelError {
    #[error("Booking {0} not found")]
    UnknownBooking(BookingId),

    #[error("Only confirmed bookings can be cancelled")]
    NotCancellable,

    #[error("No cancellation pending")]
    NothingPending,
}

#[derive(Debug, Default)]
pub struct BookingList {
    bookings: Vec<Booking>,
    pending_cancel: Option<BookingId>,
    loaded: bool,
}

impl BookingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn get(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    // Booking shown in the cancel dialog, if it is open
    pub fn pending_cancel(&self) -> Option<&Booking> {
        self.pending_cancel.and_then(|id| self.get(id))
    }

    pub async fn refresh<C>(&mut self, client: &C, session: &Session) -> Result<(), Notice>
    where
        C: CatalogClient + ?Sized,
    {
        match client.list_bookings(session).await {
            Ok(bookings) => {
                self.bookings = bookings;
                self.loaded = true;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch bookings");
                self.loaded = true;
                Err(Notice::error(LOAD_FAILED))
            }
        }
    }

    // Opens the cancel dialog
    pub fn request_cancel(&mut self, id: BookingId) -> Result<(), CancelError> {
        let booking = self.get(id).ok_or(CancelError::UnknownBooking(id))?;
        if !booking.is_cancellable() {
            return Err(CancelError::NotCancellable);
        }
        self.pending_cancel = Some(id);
        Ok(())
    }

    // Closes the dialog, booking untouched
    pub fn keep_booking(&mut self) {
        self.pending_cancel = None;
    }

    // Sends the cancellation. Local status only changes once the server has
    // confirmed; either way the dialog is closed afterwards.
    pub async fn confirm_cancel<C>(
        &mut self,
        client: &C,
        session: &Session,
    ) -> Result<Notice, CancelError>
    where
        C: CatalogClient + ?Sized,
    {
        let id = self.pending_cancel.ok_or(CancelError::NothingPending)?;
        let result = client.cancel_booking(session, id).await;
        self.pending_cancel = None;

        match result {
            Ok(()) => {
                info!(booking_id = id, "booking cancelled");
                if let Some(booking) = self.bookings.iter_mut().find(|b| b.id == id) {
                    booking.status = BookingStatus::Cancelled;
                }
                if self.refresh(client, session).await.is_err() {
                    warn!(booking_id = id, "booking list refresh after cancel failed");
                }
                Ok(Notice::success(CANCELLED))
            }
            Err(e) => {
                warn!(booking_id = id, error = %e, "cancel rejected");
                Ok(Notice::error(cancel_failure_message(&e)))
            }
        }
    }
}

fn cancel_failure_message(error: &ApiError) -> String {
    error.user_message(CANCEL_FAILED)
}
