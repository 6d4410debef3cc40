// Client-side filtering of the service collection
use crate::catalog_client::{ApiError, CatalogClient};
use crate::models::{Service, ServiceId, ServiceType};
use tracing::{debug, warn};

// Every field is independently optional; None means "no constraint"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub service_type: Option<ServiceType>,
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl FilterCriteria {
    // Builds criteria from raw form inputs. Blank or non-numeric values
    // become absent constraints instead of errors.
    pub fn from_form(service_type: &str, location: &str, min_price: &str, max_price: &str) -> Self {
        let location = location.trim();
        Self {
            service_type: ServiceType::parse(service_type),
            location: (!location.is_empty()).then(|| location.to_string()),
            min_price: parse_price(min_price),
            max_price: parse_price(max_price),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.service_type.is_none()
            && self.location.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    pub fn matches(&self, service: &Service) -> bool {
        if !self
            .service_type
            .map_or(true, |wanted| service.service_type == wanted)
        {
            return false;
        }

        if !self.location.as_ref().map_or(true, |needle| {
            let needle = needle.to_lowercase();
            service.location.to_lowercase().contains(&needle)
                || service
                    .destination
                    .as_ref()
                    .map_or(false, |d| d.to_lowercase().contains(&needle))
        }) {
            return false;
        }

        if !self.min_price.map_or(true, |min| service.price >= min) {
            return false;
        }

        self.max_price.map_or(true, |max| service.price <= max)
    }
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

// Ordered subsequence of `services` matching every set criterion
pub fn apply_filters(services: &[Service], criteria: &FilterCriteria) -> Vec<Service> {
    if criteria.is_empty() {
        return services.to_vec();
    }
    services
        .iter()
        .filter(|service| criteria.matches(service))
        .cloned()
        .collect()
}

// The service collection together with the currently visible subset.
// The visible subset is recomputed whenever either input changes.
#[derive(Debug, Default)]
pub struct ServiceCatalog {
    services: Vec<Service>,
    criteria: FilterCriteria,
    visible: Vec<Service>,
    loaded: bool,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_services(&mut self, services: Vec<Service>) {
        self.services = services;
        self.loaded = true;
        self.recompute();
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.recompute();
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn visible(&self) -> &[Service] {
        &self.visible
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn find(&self, id: ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    // Re-fetches the collection. On failure the previous collection stays.
    pub async fn refresh<C>(&mut self, client: &C) -> Result<(), ApiError>
    where
        C: CatalogClient + ?Sized,
    {
        match client.list_services().await {
            Ok(services) => {
                debug!(count = services.len(), "service catalog refreshed");
                self.set_services(services);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch services");
                Err(e)
            }
        }
    }

    fn recompute(&mut self) {
        self.visible = apply_filters(&self.services, &self.criteria);
    }
}
