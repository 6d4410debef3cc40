use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

pub type ServiceId = u64;
pub type BookingId = u64;

// Kind of bookable offering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Bus,
    Hotel,
}

impl ServiceType {
    // Parses the value of a type selector; anything else means "all types"
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "bus" => Some(ServiceType::Bus),
            "hotel" => Some(ServiceType::Hotel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Bus => "bus",
            ServiceType::Hotel => "hotel",
        }
    }
}

// Bookable bus or hotel offering, owned by the remote service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Service {
    pub id: ServiceId,
    pub service_type: ServiceType,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "decimal")]
    pub price: f64,
    pub available_seats: u32,
    #[serde(default, deserialize_with = "amenity_list")]
    pub amenities: Vec<String>,
}

impl Service {
    pub fn is_sold_out(&self) -> bool {
        self.available_seats == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

// A user's reservation against a service. The list endpoint joins a few
// display fields from the service row, so those are optional.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub service_id: ServiceId,
    pub booking_date: NaiveDate,
    pub passengers: u32,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default, deserialize_with = "optional_decimal")]
    pub price: Option<f64>,
}

impl Booking {
    pub fn total_price(&self) -> Option<f64> {
        self.price.map(|price| price * self.passengers as f64)
    }

    pub fn is_cancellable(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

// Body of POST /bookings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRequest {
    pub service_id: ServiceId,
    pub booking_date: NaiveDate,
    pub passengers: u32,
}

// What POST /bookings hands back: the new id and a confirmation message
#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub booking_id: BookingId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserProfile {
    pub id: u64,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BusOption {
    pub operator: String,
    pub departure: String,
    pub arrival: String,
    #[serde(deserialize_with = "decimal")]
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HotelOption {
    pub name: String,
    #[serde(deserialize_with = "decimal")]
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Destination {
    pub city: String,
    #[serde(deserialize_with = "decimal")]
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
}

// Buses and hotels currently known for one city
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CityListings {
    pub buses: Vec<BusOption>,
    pub hotels: Vec<HotelOption>,
}

// Form fields of POST /register
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

// Response envelopes
#[derive(Debug, Deserialize)]
pub(crate) struct ServicesEnvelope {
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookingsEnvelope {
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BusesEnvelope {
    #[serde(default)]
    pub buses: Vec<BusOption>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HotelsEnvelope {
    #[serde(default)]
    pub hotels: Vec<HotelOption>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchEnvelope {
    #[serde(default)]
    pub results: Vec<Destination>,
}

// Older deployments echo the whole booking row instead of the id envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreatedBookingBody {
    Created {
        booking_id: BookingId,
        #[serde(default)]
        message: Option<String>,
    },
    Row(Booking),
}

impl From<CreatedBookingBody> for BookingConfirmation {
    fn from(body: CreatedBookingBody) -> Self {
        match body {
            CreatedBookingBody::Created {
                booking_id,
                message,
            } => Self {
                booking_id,
                message,
            },
            CreatedBookingBody::Row(booking) => Self {
                booking_id: booking.id,
                message: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub user: UserProfile,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoginEnvelope {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

// Error body returned by the remote service. Validation failures carry a
// list in `detail` instead of a string; those are treated as absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: serde_json::Value,
}

impl ErrorBody {
    pub fn into_detail(self) -> Option<String> {
        match self.detail {
            serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
            _ => None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

// SQL DECIMAL columns arrive either as JSON numbers or as numeric strings
fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid decimal: {text}"))),
    }
}

fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(value)) => Ok(Some(value)),
        Some(NumberOrText::Text(text)) => Ok(text.trim().parse().ok()),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmenityField {
    List(Vec<String>),
    Encoded(String),
}

// Amenities are stored in a JSON column and may be sent still encoded
fn amenity_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<AmenityField>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(AmenityField::List(list)) => Ok(list),
        Some(AmenityField::Encoded(text)) if text.trim().is_empty() => Ok(Vec::new()),
        Some(AmenityField::Encoded(text)) => serde_json::from_str(&text)
            .map_err(|e| serde::de::Error::custom(format!("invalid amenities: {e}"))),
    }
}
