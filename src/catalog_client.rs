// Remote catalog client: the boundary between the booking flows and the
// travel service. Pure request/response, no retries.

use crate::models::{
    Booking, BookingConfirmation, BookingId, BookingRequest, BookingsEnvelope, BusOption,
    BusesEnvelope, CityListings, CreatedBookingBody, Destination, ErrorBody, HotelOption,
    HotelsEnvelope, LoginEnvelope, ProfileEnvelope, Registration, SearchEnvelope, Service,
    ServicesEnvelope, UserProfile,
};
use crate::session::Session;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const COULD_NOT_REACH_SERVER: &str = "Could not reach server";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {}", .detail.as_deref().unwrap_or("no detail"))]
    Remote {
        status_code: u16,
        detail: Option<String>,
    },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    // Text shown to the user: the server's own message when it sent one,
    // a generic transport message when it could not be reached
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Remote {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Network(_) | ApiError::Timeout(_) => COULD_NOT_REACH_SERVER.to_string(),
            _ => fallback.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    // None leaves the request timeout to the caller
    pub timeout_ms: Option<u64>,
    pub poll_interval_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: None,
            poll_interval_ms: 5000,
            user_agent: format!("travelgo-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    // Reads TRAVELGO_BASE_URL, TRAVELGO_TIMEOUT_MS and
    // TRAVELGO_POLL_INTERVAL_MS, falling back to the defaults
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();
        let base_url = env::var("TRAVELGO_BASE_URL").unwrap_or_else(|_| {
            info!("TRAVELGO_BASE_URL not set, using default: {}", defaults.base_url);
            defaults.base_url.clone()
        });
        let timeout_ms = optional_var::<u64>("TRAVELGO_TIMEOUT_MS")?;
        let poll_interval_ms =
            optional_var::<u64>("TRAVELGO_POLL_INTERVAL_MS")?.unwrap_or(defaults.poll_interval_ms);

        let config = Self {
            base_url,
            timeout_ms,
            poll_interval_ms,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::ConfigError(format!("invalid base url: {e}")))?;
        if self.poll_interval_ms == 0 {
            return Err(ClientError::ConfigError(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn optional_var<T: FromStr>(key: &str) -> Result<Option<T>, ClientError>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ClientError::ConfigError(format!("invalid {key} value: {e}"))),
        Err(_) => {
            debug!("{key} not set, using default");
            Ok(None)
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub average_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

impl ClientStats {
    fn record(&mut self, elapsed: Duration, succeeded: bool) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.requests_sent += 1;
        if succeeded {
            self.requests_succeeded += 1;
        } else {
            self.requests_failed += 1;
        }
        let n = self.requests_sent as f64;
        self.average_response_time_ms += (elapsed_ms - self.average_response_time_ms) / n;
        self.max_response_time_ms = self.max_response_time_ms.max(elapsed_ms);
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync + 'static {
    // GET /services
    async fn list_services(&self) -> Result<Vec<Service>, ApiError>;

    // GET /bookings, scoped to the session's user
    async fn list_bookings(&self, session: &Session) -> Result<Vec<Booking>, ApiError>;

    // POST /bookings
    async fn create_booking(
        &self,
        session: &Session,
        request: BookingRequest,
    ) -> Result<BookingConfirmation, ApiError>;

    // DELETE /bookings/{id}
    async fn cancel_booking(&self, session: &Session, id: BookingId) -> Result<(), ApiError>;

    async fn list_buses(&self, city: &str) -> Result<Vec<BusOption>, ApiError>;

    async fn list_hotels(&self, city: &str) -> Result<Vec<HotelOption>, ApiError>;

    // Buses and hotels for one city, fetched concurrently
    async fn search_by_city(&self, city: &str) -> Result<CityListings, ApiError> {
        let (buses, hotels) =
            futures::future::try_join(self.list_buses(city), self.list_hotels(city)).await?;
        Ok(CityListings { buses, hotels })
    }

    // GET /search?to_city=
    async fn search_destinations(&self, to_city: &str) -> Result<Vec<Destination>, ApiError>;

    // GET /suggest_cities?query=
    async fn suggest_cities(&self, query: &str) -> Result<Vec<String>, ApiError>;

    async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError>;

    async fn register(&self, registration: &Registration) -> Result<(), ApiError>;

    // GET /profile
    async fn profile(&self, session: &Session) -> Result<UserProfile, ApiError>;

    fn stats(&self) -> ClientStats;
}

pub struct HttpCatalogClient {
    config: ClientConfig,
    http: reqwest::Client,
    stats: Mutex<ClientStats>,
}

impl HttpCatalogClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            config,
            http,
            stats: Mutex::new(ClientStats::default()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(request: RequestBuilder, session: &Session) -> RequestBuilder {
        match session.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request.query(&[("email", session.email.as_str())]),
        }
    }

    async fn execute(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let started = Instant::now();
        let result = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(Self::remote_error(response).await),
            Err(e) if e.is_timeout() => {
                Err(ApiError::Timeout(self.config.timeout_ms.unwrap_or(0)))
            }
            Err(e) => Err(ApiError::Network(e.to_string())),
        };

        let elapsed = started.elapsed();
        self.stats.lock().record(elapsed, result.is_ok());
        match &result {
            Ok(response) => debug!(op, status = %response.status(), ?elapsed, "request completed"),
            Err(e) => warn!(op, error = %e, ?elapsed, "request failed"),
        }
        result
    }

    async fn remote_error(response: Response) -> ApiError {
        let status_code = response.status().as_u16();
        let detail = match response.text().await {
            Ok(body) => serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_detail),
            Err(_) => None,
        };
        ApiError::Remote {
            status_code,
            detail,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        self.execute(op, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{op}: {e}")))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
        let envelope: ServicesEnvelope = self
            .fetch("list_services", self.http.get(self.url("/services")))
            .await?;
        Ok(envelope.services)
    }

    async fn list_bookings(&self, session: &Session) -> Result<Vec<Booking>, ApiError> {
        let request = Self::authorize(self.http.get(self.url("/bookings")), session);
        let envelope: BookingsEnvelope = self.fetch("list_bookings", request).await?;
        Ok(envelope.bookings)
    }

    async fn create_booking(
        &self,
        session: &Session,
        request: BookingRequest,
    ) -> Result<BookingConfirmation, ApiError> {
        info!(
            service_id = request.service_id,
            passengers = request.passengers,
            "creating booking"
        );
        let builder =
            Self::authorize(self.http.post(self.url("/bookings")), session).json(&request);
        let body: CreatedBookingBody = self.fetch("create_booking", builder).await?;
        Ok(body.into())
    }

    async fn cancel_booking(&self, session: &Session, id: BookingId) -> Result<(), ApiError> {
        info!(booking_id = id, "cancelling booking");
        let request = Self::authorize(
            self.http.delete(self.url(&format!("/bookings/{id}"))),
            session,
        );
        self.execute("cancel_booking", request).await?;
        Ok(())
    }

    async fn list_buses(&self, city: &str) -> Result<Vec<BusOption>, ApiError> {
        let request = self.http.get(self.url("/buses")).query(&[("city", city)]);
        let envelope: BusesEnvelope = self.fetch("list_buses", request).await?;
        Ok(envelope.buses)
    }

    async fn list_hotels(&self, city: &str) -> Result<Vec<HotelOption>, ApiError> {
        let request = self.http.get(self.url("/hotels")).query(&[("city", city)]);
        let envelope: HotelsEnvelope = self.fetch("list_hotels", request).await?;
        Ok(envelope.hotels)
    }

    async fn search_destinations(&self, to_city: &str) -> Result<Vec<Destination>, ApiError> {
        let request = self.http.get(self.url("/search")).query(&[("to_city", to_city)]);
        let envelope: SearchEnvelope = self.fetch("search_destinations", request).await?;
        Ok(envelope.results)
    }

    async fn suggest_cities(&self, query: &str) -> Result<Vec<String>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .http
            .get(self.url("/suggest_cities"))
            .query(&[("query", query)]);
        self.fetch("suggest_cities", request).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = self
            .http
            .post(self.url("/login"))
            .form(&[("email", email), ("password", password)]);
        let body = self
            .execute("login", request)
            .await?
            .text()
            .await
            .map_err(|e| ApiError::Decode(format!("login: {e}")))?;
        // Some deployments answer with an empty body
        let envelope = if body.trim().is_empty() {
            LoginEnvelope::default()
        } else {
            serde_json::from_str::<LoginEnvelope>(&body)
                .map_err(|e| ApiError::Decode(format!("login: {e}")))?
        };

        let mut session = Session::new(envelope.email.unwrap_or_else(|| email.to_string()));
        if let Some(first_name) = envelope.first_name {
            session = session.with_first_name(first_name);
        }
        if let Some(token) = envelope.access_token {
            session = session.with_access_token(token);
        }
        info!(email = %session.email, "logged in");
        Ok(session)
    }

    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let request = self.http.post(self.url("/register")).form(registration);
        self.execute("register", request).await?;
        info!(email = %registration.email, "registered");
        Ok(())
    }

    async fn profile(&self, session: &Session) -> Result<UserProfile, ApiError> {
        let request = Self::authorize(self.http.get(self.url("/profile")), session);
        let envelope: ProfileEnvelope = self.fetch("profile", request).await?;
        Ok(envelope.user)
    }

    fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }
}

// In-memory stand-in for the remote service
#[cfg(test)]
pub mod mock_server {
    use super::*;
    use crate::models::{BookingStatus, ServiceId};
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    pub struct MockCatalog {
        services: DashMap<ServiceId, Service>,
        bookings: DashMap<BookingId, Booking>,
        listings: DashMap<String, CityListings>,
        next_booking_id: AtomicU64,
        create_error: Mutex<Option<ApiError>>,
        cancel_error: Mutex<Option<ApiError>>,
        fail_services: AtomicBool,
        fail_listings: AtomicBool,
        listing_delay_ms: AtomicU64,
        pub list_services_calls: AtomicUsize,
        pub list_bookings_calls: AtomicUsize,
        pub create_booking_calls: AtomicUsize,
        pub cancel_booking_calls: AtomicUsize,
        polled_cities: Mutex<Vec<String>>,
        stats: Mutex<ClientStats>,
    }

    impl MockCatalog {
        pub fn new() -> Self {
            Self {
                services: DashMap::new(),
                bookings: DashMap::new(),
                listings: DashMap::new(),
                next_booking_id: AtomicU64::new(1),
                create_error: Mutex::new(None),
                cancel_error: Mutex::new(None),
                fail_services: AtomicBool::new(false),
                fail_listings: AtomicBool::new(false),
                listing_delay_ms: AtomicU64::new(0),
                list_services_calls: AtomicUsize::new(0),
                list_bookings_calls: AtomicUsize::new(0),
                create_booking_calls: AtomicUsize::new(0),
                cancel_booking_calls: AtomicUsize::new(0),
                polled_cities: Mutex::new(Vec::new()),
                stats: Mutex::new(ClientStats::default()),
            }
        }

        pub fn add_service(&self, service: Service) {
            self.services.insert(service.id, service);
        }

        pub fn add_booking(&self, booking: Booking) {
            self.next_booking_id
                .fetch_max(booking.id + 1, Ordering::SeqCst);
            self.bookings.insert(booking.id, booking);
        }

        pub fn booking(&self, id: BookingId) -> Option<Booking> {
            self.bookings.get(&id).map(|b| b.clone())
        }

        pub fn add_listings(&self, city: &str, listings: CityListings) {
            self.listings.insert(city.to_lowercase(), listings);
        }

        pub fn fail_next_booking(&self, error: ApiError) {
            *self.create_error.lock() = Some(error);
        }

        pub fn fail_next_cancel(&self, error: ApiError) {
            *self.cancel_error.lock() = Some(error);
        }

        pub fn set_fail_services(&self, fail: bool) {
            self.fail_services.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_listings(&self, fail: bool) {
            self.fail_listings.store(fail, Ordering::SeqCst);
        }

        pub fn set_listing_delay(&self, delay_ms: u64) {
            self.listing_delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn polled_cities(&self) -> Vec<String> {
            self.polled_cities.lock().clone()
        }

        pub fn clear_polled_cities(&self) {
            self.polled_cities.lock().clear();
        }

        async fn listings_for(&self, city: &str) -> Result<CityListings, ApiError> {
            self.polled_cities.lock().push(city.to_string());
            let delay = self.listing_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_listings.load(Ordering::SeqCst) {
                return Err(ApiError::Network("connection refused".to_string()));
            }
            Ok(self
                .listings
                .get(&city.to_lowercase())
                .map(|l| l.clone())
                .unwrap_or_default())
        }
    }

    #[async_trait]
    impl CatalogClient for MockCatalog {
        async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
            self.list_services_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_services.load(Ordering::SeqCst) {
                return Err(ApiError::Network("connection refused".to_string()));
            }
            let mut services: Vec<Service> = self.services.iter().map(|s| s.clone()).collect();
            services.sort_by_key(|s| s.id);
            Ok(services)
        }

        async fn list_bookings(&self, _session: &Session) -> Result<Vec<Booking>, ApiError> {
            self.list_bookings_calls.fetch_add(1, Ordering::SeqCst);
            let mut bookings: Vec<Booking> = self.bookings.iter().map(|b| b.clone()).collect();
            bookings.sort_by_key(|b| b.id);
            Ok(bookings)
        }

        async fn create_booking(
            &self,
            _session: &Session,
            request: BookingRequest,
        ) -> Result<BookingConfirmation, ApiError> {
            self.create_booking_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.create_error.lock().take() {
                return Err(error);
            }

            let mut service = match self.services.get_mut(&request.service_id) {
                Some(service) if service.available_seats >= request.passengers => service,
                _ => {
                    return Err(ApiError::Remote {
                        status_code: 400,
                        detail: Some("Service not available or insufficient seats".to_string()),
                    })
                }
            };
            service.available_seats -= request.passengers;

            let booking = Booking {
                id: self.next_booking_id.fetch_add(1, Ordering::SeqCst),
                service_id: request.service_id,
                booking_date: request.booking_date,
                passengers: request.passengers,
                status: BookingStatus::Confirmed,
                created_at: chrono::Utc::now().naive_utc(),
                service_name: Some(service.name.clone()),
                service_type: Some(service.service_type),
                location: Some(service.location.clone()),
                destination: service.destination.clone(),
                price: Some(service.price),
            };
            let booking_id = booking.id;
            self.bookings.insert(booking_id, booking);
            Ok(BookingConfirmation {
                booking_id,
                message: Some("Booking created successfully".to_string()),
            })
        }

        async fn cancel_booking(&self, _session: &Session, id: BookingId) -> Result<(), ApiError> {
            self.cancel_booking_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.cancel_error.lock().take() {
                return Err(error);
            }

            let mut booking = self.bookings.get_mut(&id).ok_or(ApiError::Remote {
                status_code: 404,
                detail: Some("Booking not found".to_string()),
            })?;
            booking.status = BookingStatus::Cancelled;
            if let Some(mut service) = self.services.get_mut(&booking.service_id) {
                service.available_seats += booking.passengers;
            }
            Ok(())
        }

        async fn list_buses(&self, city: &str) -> Result<Vec<BusOption>, ApiError> {
            Ok(self.listings_for(city).await?.buses)
        }

        async fn list_hotels(&self, city: &str) -> Result<Vec<HotelOption>, ApiError> {
            Ok(self.listings_for(city).await?.hotels)
        }

        async fn search_destinations(&self, to_city: &str) -> Result<Vec<Destination>, ApiError> {
            let needle = to_city.to_lowercase();
            Ok(self
                .listings
                .iter()
                .filter(|entry| entry.key().contains(&needle))
                .map(|entry| Destination {
                    city: entry.key().clone(),
                    price: entry.hotels.first().map_or(0.0, |h| h.price),
                    image: None,
                })
                .collect())
        }

        async fn suggest_cities(&self, query: &str) -> Result<Vec<String>, ApiError> {
            let query = query.trim().to_lowercase();
            if query.is_empty() {
                return Ok(Vec::new());
            }
            let mut cities: Vec<String> = self
                .listings
                .iter()
                .map(|entry| entry.key().clone())
                .filter(|city| city.contains(&query))
                .collect();
            cities.sort();
            cities.truncate(8);
            Ok(cities)
        }

        async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
            if password.is_empty() {
                return Err(ApiError::Remote {
                    status_code: 401,
                    detail: Some("Invalid email or password.".to_string()),
                });
            }
            Ok(Session::new(email).with_access_token("mock-token"))
        }

        async fn register(&self, _registration: &Registration) -> Result<(), ApiError> {
            Ok(())
        }

        async fn profile(&self, session: &Session) -> Result<UserProfile, ApiError> {
            Ok(UserProfile {
                id: 1,
                email: session.email.clone(),
                first_name: session.first_name.clone().unwrap_or_default(),
                last_name: String::new(),
                created_at: None,
            })
        }

        fn stats(&self) -> ClientStats {
            self.stats.lock().clone()
        }
    }

    pub fn service(id: ServiceId, service_type: crate::models::ServiceType, seats: u32) -> Service {
        Service {
            id,
            service_type,
            name: format!("Service {id}"),
            location: "Mumbai".to_string(),
            destination: Some("Goa".to_string()),
            description: String::new(),
            price: 100.0 * id as f64,
            available_seats: seats,
            amenities: vec![],
        }
    }
}
