// Periodic refresh of the hotels and buses for the selected city.
//
// A selection owns exactly one polling task. The task is started when a
// city is selected and is stopped before any other selection takes over,
// when the selection is cleared, or when the poller is dropped.

use crate::catalog_client::{ApiError, CatalogClient, ClientConfig};
use crate::models::{BusOption, CityListings, HotelOption};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSnapshot {
    pub city: Option<String>,
    pub generation: u64,
    pub listings: CityListings,
    pub refreshed_at: Option<Instant>,
}

// State shared between a poller and its task
#[derive(Debug, Default)]
pub struct PollState {
    generation: AtomicU64,
    active_tasks: AtomicUsize,
    snapshot: RwLock<PollSnapshot>,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    // Starts a new selection; responses tagged with older generations are
    // discarded from here on
    pub fn begin(&self, city: Option<String>) -> u64 {
        let mut snapshot = self.snapshot.write();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *snapshot = PollSnapshot {
            city,
            generation,
            listings: CityListings::default(),
            refreshed_at: None,
        };
        generation
    }

    // A failed half leaves that collection as it was
    pub fn apply(
        &self,
        generation: u64,
        hotels: Result<Vec<HotelOption>, ApiError>,
        buses: Result<Vec<BusOption>, ApiError>,
    ) -> bool {
        let mut snapshot = self.snapshot.write();
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(generation, current = snapshot.generation, "discarding stale poll response");
            return false;
        }

        let mut refreshed = false;
        match hotels {
            Ok(hotels) => {
                snapshot.listings.hotels = hotels;
                refreshed = true;
            }
            Err(e) => warn!(city = ?snapshot.city, error = %e, "hotel poll failed"),
        }
        match buses {
            Ok(buses) => {
                snapshot.listings.buses = buses;
                refreshed = true;
            }
            Err(e) => warn!(city = ?snapshot.city, error = %e, "bus poll failed"),
        }
        if refreshed {
            snapshot.refreshed_at = Some(Instant::now());
        }
        refreshed
    }
}

// Decrements the active task count however the task ends
struct ActiveTask(Arc<PollState>);

impl ActiveTask {
    fn acquire(state: Arc<PollState>) -> Self {
        state.active_tasks.fetch_add(1, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for ActiveTask {
    fn drop(&mut self) {
        self.0.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }
}

// Handle to a running polling task. Dropping it aborts the task;
// `stop` also waits until the task is gone.
#[derive(Debug)]
pub struct PollHandle {
    city: String,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancelled is the expected outcome here
            let _ = task.await;
            debug!(city = %self.city, generation = self.generation, "polling stopped");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// Fetches hotels and buses for `city` right away and then every `period`,
// writing results into `state` under `generation`
pub fn start_polling<C>(
    client: Arc<C>,
    city: String,
    period: Duration,
    state: Arc<PollState>,
    generation: u64,
) -> PollHandle
where
    C: CatalogClient + ?Sized,
{
    let guard = ActiveTask::acquire(state.clone());
    let task_city = city.clone();

    let task = tokio::spawn(async move {
        let _guard = guard;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let (hotels, buses) = tokio::join!(
                client.list_hotels(&task_city),
                client.list_buses(&task_city)
            );
            state.apply(generation, hotels, buses);
        }
    });

    debug!(city = %city, generation, ?period, "polling started");
    PollHandle {
        city,
        generation,
        task: Some(task),
    }
}

// Owns the active selection and its polling task
pub struct SelectionPoller<C: CatalogClient + ?Sized> {
    client: Arc<C>,
    period: Duration,
    state: Arc<PollState>,
    handle: Option<PollHandle>,
}

impl<C: CatalogClient + ?Sized> SelectionPoller<C> {
    pub fn new(client: Arc<C>, period: Duration) -> Self {
        Self {
            client,
            period,
            state: Arc::new(PollState::new()),
            handle: None,
        }
    }

    pub fn from_config(client: Arc<C>, config: &ClientConfig) -> Self {
        Self::new(client, config.poll_interval())
    }

    pub fn active_city(&self) -> Option<&str> {
        self.handle.as_ref().map(PollHandle::city)
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> Arc<PollState> {
        self.state.clone()
    }

    pub fn active_tasks(&self) -> usize {
        self.state.active_tasks()
    }

    // Replaces the selection. The previous task is stopped before the next
    // one starts; a blank or missing city just clears the selection.
    pub async fn select(&mut self, city: Option<&str>) {
        let city = city.map(str::trim).filter(|c| !c.is_empty());
        if city.is_some() && city == self.active_city() {
            return;
        }

        if let Some(handle) = self.handle.take() {
            handle.stop().await;
        }

        let generation = self.state.begin(city.map(str::to_string));
        if let Some(city) = city {
            self.handle = Some(start_polling(
                self.client.clone(),
                city.to_string(),
                self.period,
                self.state.clone(),
                generation,
            ));
        }
    }

    pub async fn clear(&mut self) {
        self.select(None).await;
    }
}
