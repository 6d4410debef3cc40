// Client core for the TravelGo booking app

// Remote API and data types
pub mod catalog_client;
pub mod models;
pub mod session;

// Screens and flows built on top of the client
pub mod booking_flow;
pub mod bookings;
pub mod filter;
pub mod notice;
pub mod payment;
pub mod polling;

pub mod logging;

// Re-export key types for convenience
pub use booking_flow::{BookingDraft, BookingError, BookingFlow, BookingState};
pub use bookings::{BookingList, CancelError};
pub use catalog_client::{
    ApiError, CatalogClient, ClientConfig, ClientError, ClientStats, HttpCatalogClient,
};
pub use filter::{apply_filters, FilterCriteria, ServiceCatalog};
pub use models::{
    Booking, BookingConfirmation, BookingId, BookingRequest, BookingStatus, BusOption,
    CityListings, Destination, HotelOption, Registration, Service, ServiceId, ServiceType,
    UserProfile,
};
pub use notice::{Notice, NoticeLevel};
pub use payment::{PaymentFlow, PaymentGateway, PaymentReceipt, PaymentRequest, PaymentState};
pub use polling::{PollHandle, PollSnapshot, PollState, SelectionPoller};
pub use session::Session;
