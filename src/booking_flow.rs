// Booking flow: choose a service, enter date and passengers, submit,
// then land on a confirmation or an error the user can retry from.

use crate::catalog_client::{ApiError, CatalogClient};
use crate::filter::ServiceCatalog;
use crate::models::{BookingConfirmation, BookingRequest, Service};
use crate::notice::Notice;
use crate::session::{authenticated, Session};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const LOGIN_REQUIRED: &str = "Please login to make a booking";
pub const BOOKING_CREATED: &str = "Booking created successfully!";
pub const BOOKING_FAILED: &str = "Booking failed";

// Local validation failures; none of these reach the server
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Please login to make a booking")]
    NotAuthenticated,

    #[error("Sold out")]
    SoldOut,

    #[error("Please choose a booking date")]
    MissingDate,

    #[error("Invalid booking date: {0}")]
    InvalidDate(String),

    #[error("Passengers must be between 1 and {max}, got {requested}")]
    PassengerCountOutOfRange { requested: u32, max: u32 },

    #[error("No service selected")]
    NoSelection,

    #[error("Booking already being submitted")]
    SubmissionInFlight,
}

impl BookingError {
    pub fn notice(&self) -> Notice {
        Notice::advisory(self.to_string())
    }
}

// Form fields the user fills in after choosing a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub booking_date: String,
    pub passengers: u32,
}

impl Default for BookingDraft {
    fn default() -> Self {
        Self {
            booking_date: String::new(),
            passengers: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingState {
    Idle,
    Selecting {
        service: Service,
        draft: BookingDraft,
    },
    Submitting {
        service: Service,
        draft: BookingDraft,
    },
    Succeeded {
        confirmation: BookingConfirmation,
        request: BookingRequest,
    },
    // Keeps the selection so the user can retry or amend the input
    Failed {
        service: Service,
        draft: BookingDraft,
        message: String,
    },
}

impl BookingState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingState::Idle => "idle",
            BookingState::Selecting { .. } => "selecting",
            BookingState::Submitting { .. } => "submitting",
            BookingState::Succeeded { .. } => "succeeded",
            BookingState::Failed { .. } => "failed",
        }
    }
}

pub struct BookingFlow<C: CatalogClient + ?Sized> {
    client: Arc<C>,
    state: BookingState,
}

impl<C: CatalogClient + ?Sized> BookingFlow<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            state: BookingState::Idle,
        }
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    pub fn selected_service(&self) -> Option<&Service> {
        match &self.state {
            BookingState::Selecting { service, .. }
            | BookingState::Submitting { service, .. }
            | BookingState::Failed { service, .. } => Some(service),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&BookingDraft> {
        match &self.state {
            BookingState::Selecting { draft, .. }
            | BookingState::Submitting { draft, .. }
            | BookingState::Failed { draft, .. } => Some(draft),
            _ => None,
        }
    }

    // Advisory upper bound for the passenger input
    pub fn max_passengers(&self) -> Option<u32> {
        self.selected_service().map(|s| s.available_seats)
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            BookingState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    // Idle -> Selecting. Without a session the state is left alone.
    pub fn select(
        &mut self,
        session: Option<&Session>,
        service: Service,
    ) -> Result<(), BookingError> {
        if authenticated(session).is_none() {
            debug!(service_id = service.id, "selection rejected, not logged in");
            return Err(BookingError::NotAuthenticated);
        }
        if matches!(self.state, BookingState::Submitting { .. }) {
            return Err(BookingError::SubmissionInFlight);
        }
        if service.is_sold_out() {
            return Err(BookingError::SoldOut);
        }

        debug!(service_id = service.id, "service selected");
        self.state = BookingState::Selecting {
            service,
            draft: BookingDraft::default(),
        };
        Ok(())
    }

    pub fn set_booking_date(
        &mut self,
        booking_date: impl Into<String>,
    ) -> Result<(), BookingError> {
        let booking_date = booking_date.into();
        self.edit_draft(|draft| draft.booking_date = booking_date)
    }

    pub fn set_passengers(&mut self, passengers: u32) -> Result<(), BookingError> {
        self.edit_draft(|draft| draft.passengers = passengers)
    }

    // Editing after a failure returns the flow to Selecting
    fn edit_draft(&mut self, edit: impl FnOnce(&mut BookingDraft)) -> Result<(), BookingError> {
        let state = std::mem::replace(&mut self.state, BookingState::Idle);
        let (service, mut draft) = match state {
            BookingState::Selecting { service, draft }
            | BookingState::Failed { service, draft, .. } => (service, draft),
            other => {
                let error = match &other {
                    BookingState::Submitting { .. } => BookingError::SubmissionInFlight,
                    _ => BookingError::NoSelection,
                };
                self.state = other;
                return Err(error);
            }
        };
        edit(&mut draft);
        self.state = BookingState::Selecting { service, draft };
        Ok(())
    }

    // Selecting (or Failed) -> Submitting -> Succeeded | Failed.
    //
    // Validation errors leave the state untouched and never contact the
    // server; a missing session returns the flow to Idle. On success the
    // service catalog is re-fetched once, since capacity has changed.
    pub async fn submit(
        &mut self,
        session: Option<&Session>,
        catalog: &mut ServiceCatalog,
    ) -> Result<Notice, BookingError> {
        let Some(session) = authenticated(session) else {
            debug!("submission without a session, closing booking flow");
            self.state = BookingState::Idle;
            return Err(BookingError::NotAuthenticated);
        };

        let (service, draft) = match &self.state {
            BookingState::Selecting { service, draft }
            | BookingState::Failed { service, draft, .. } => (service.clone(), draft.clone()),
            BookingState::Submitting { .. } => return Err(BookingError::SubmissionInFlight),
            _ => return Err(BookingError::NoSelection),
        };
        let request = validate(&service, &draft)?;

        self.state = BookingState::Submitting {
            service: service.clone(),
            draft: draft.clone(),
        };
        info!(
            service_id = service.id,
            passengers = request.passengers,
            "submitting booking"
        );

        match self.client.create_booking(session, request.clone()).await {
            Ok(confirmation) => {
                info!(booking_id = confirmation.booking_id, "booking created");
                self.state = BookingState::Succeeded {
                    confirmation,
                    request,
                };
                if let Err(e) = catalog.refresh(self.client.as_ref()).await {
                    warn!(error = %e, "service refresh after booking failed");
                }
                Ok(Notice::success(BOOKING_CREATED))
            }
            Err(e) => {
                let message = failure_message(&e);
                warn!(service_id = service.id, error = %e, "booking failed");
                self.state = BookingState::Failed {
                    service,
                    draft,
                    message: message.clone(),
                };
                Ok(Notice::error(message))
            }
        }
    }

    // Any state -> Idle, discarding input
    pub fn close(&mut self) {
        if !matches!(self.state, BookingState::Idle) {
            debug!(from = self.state.name(), "booking flow closed");
        }
        self.state = BookingState::Idle;
    }
}

fn failure_message(error: &ApiError) -> String {
    error.user_message(BOOKING_FAILED)
}

fn validate(service: &Service, draft: &BookingDraft) -> Result<BookingRequest, BookingError> {
    let raw_date = draft.booking_date.trim();
    if raw_date.is_empty() {
        return Err(BookingError::MissingDate);
    }
    let booking_date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .map_err(|_| BookingError::InvalidDate(raw_date.to_string()))?;

    let max = service.available_seats;
    if draft.passengers < 1 || draft.passengers > max {
        return Err(BookingError::PassengerCountOutOfRange {
            requested: draft.passengers,
            max,
        });
    }

    Ok(BookingRequest {
        service_id: service.id,
        booking_date,
        passengers: draft.passengers,
    })
}
