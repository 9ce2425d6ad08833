//! Polling orchestrator - the floor scan loop
//!
//! One cycle: resolve the gateway's floor, list its sensors, then for each
//! sensor in ascending id order request a reading, classify it and dispatch
//! the resulting event. A pacing delay follows every sensor. Cycles repeat
//! until the shutdown signal fires.

use crate::domain::classifier::classify;
use crate::domain::types::{codes, ClassifiedEvent, LogLevel, Occupancy, SensorRecord};
use crate::infra::metrics::Metrics;
use crate::io::directory::{DirectoryError, SensorDirectory};
use crate::io::wire::{GatewayClient, Transport, WireError};
use crate::services::dispatcher::{sensor_log, Dispatcher, Route};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    /// Delay after every sensor, whatever the outcome
    pub pacing: Duration,
    /// Wait before the next attempt after a skipped, aborted or empty cycle
    pub idle_cycle_delay: Duration,
    /// Keep the gateway socket open between cycles
    pub keep_alive: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(800),
            idle_cycle_delay: Duration::from_secs(5),
            keep_alive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every sensor was visited
    Completed { sensors: usize, dispatched: usize },
    /// Floor unresolved or directory unavailable; no socket I/O happened
    Skipped,
    /// Non-retryable connection fault part way through
    Aborted,
}

enum FloorLookup {
    Found(i32),
    Missing,
    Failed(DirectoryError),
}

pub struct Poller<T: Transport> {
    directory: Arc<dyn SensorDirectory>,
    client: GatewayClient<T>,
    dispatcher: Dispatcher,
    route: Route,
    settings: PollerSettings,
    metrics: Arc<Metrics>,
    cycle: u64,
}

impl<T: Transport> Poller<T> {
    pub fn new(
        directory: Arc<dyn SensorDirectory>,
        client: GatewayClient<T>,
        dispatcher: Dispatcher,
        route: Route,
        settings: PollerSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { directory, client, dispatcher, route, settings, metrics, cycle: 0 }
    }

    /// Run cycles until `shutdown` flips to true or its sender goes away
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            gateway = %self.client.target(),
            routing_key = %self.route.routing_key,
            "poller_started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                outcome = self.run_cycle() => outcome,
                _ = shutdown.changed() => break,
            };
            self.metrics.snapshot().log();

            let idle = match outcome {
                CycleOutcome::Completed { sensors, .. } => sensors == 0,
                CycleOutcome::Skipped | CycleOutcome::Aborted => true,
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.idle_cycle_delay) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }

        self.client.close().await;
        self.dispatcher.close().await;
        info!(cycles = self.cycle, "poller_stopped");
    }

    /// One floor scan
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycle += 1;
        self.metrics.record_cycle();
        let building = self.client.target().building.clone();
        let ip = self.client.target().ip.clone();

        let floor = match self.lookup_floor(&building, &ip).await {
            FloorLookup::Found(floor) => floor,
            FloorLookup::Missing => {
                error!(cycle = self.cycle, building = %building, ip = %ip, "floor_not_found");
                return self.skip_cycle(codes::FLOOR_NOT_FOUND).await;
            }
            FloorLookup::Failed(e) => {
                error!(cycle = self.cycle, building = %building, error = %e, "directory_lookup_failed");
                return self.skip_cycle(codes::DIRECTORY_UNAVAILABLE).await;
            }
        };

        let sensors = match self.load_sensors(&building, floor).await {
            Ok(sensors) => sensors,
            Err(e) => {
                error!(cycle = self.cycle, building = %building, floor = floor, error = %e, "directory_lookup_failed");
                return self.skip_cycle(codes::DIRECTORY_UNAVAILABLE).await;
            }
        };

        debug!(cycle = self.cycle, floor = floor, sensors = sensors.len(), "cycle_started");

        let mut dispatched = 0usize;
        for sensor in &sensors {
            match self.poll_sensor(&sensor.id).await {
                Ok(kind) => {
                    if self.publish_reading(ClassifiedEvent { sensor_id: sensor.id.clone(), kind }).await {
                        dispatched += 1;
                    }
                }
                Err(e) if !e.is_retryable() => {
                    error!(
                        cycle = self.cycle,
                        sensor_id = %sensor.id,
                        kind = e.kind(),
                        error = %e,
                        "cycle_aborted"
                    );
                    self.metrics.record_cycle_aborted();
                    self.client.close().await;
                    self.report(LogLevel::Critical, codes::SOCKET_FAULT).await;
                    return CycleOutcome::Aborted;
                }
                Err(e) => {
                    warn!(
                        cycle = self.cycle,
                        sensor_id = %sensor.id,
                        kind = e.kind(),
                        error = %e,
                        "sensor_request_failed"
                    );
                    self.metrics.record_request_failure(matches!(e, WireError::Timeout));
                }
            }
            tokio::time::sleep(self.settings.pacing).await;
        }

        if !self.settings.keep_alive {
            self.client.close().await;
        }

        info!(cycle = self.cycle, sensors = sensors.len(), dispatched = dispatched, "cycle_completed");
        CycleOutcome::Completed { sensors: sensors.len(), dispatched }
    }

    async fn lookup_floor(&self, building: &str, ip: &str) -> FloorLookup {
        match self.directory.resolve_floor(building, ip).await {
            Ok(Some(floor)) => FloorLookup::Found(floor),
            Ok(None) => FloorLookup::Missing,
            Err(e) => FloorLookup::Failed(e),
        }
    }

    /// Sensor list, refetched every cycle
    async fn load_sensors(
        &self,
        building: &str,
        floor: i32,
    ) -> Result<Vec<SensorRecord>, DirectoryError> {
        let sensors = self.directory.list_sensors(building, floor).await?;
        let count = self.directory.count_sensors(building, floor).await?;
        if count != sensors.len() {
            warn!(listed = sensors.len(), counted = count, floor = floor, "sensor_count_mismatch");
        }
        if sensors.is_empty() {
            info!(cycle = self.cycle, floor = floor, "no_sensors_on_floor");
        }
        Ok(sensors)
    }

    async fn poll_sensor(&mut self, sensor_id: &str) -> Result<Occupancy, WireError> {
        self.metrics.record_request();
        self.client.ensure_connected().await?;
        let reply = self.client.request(sensor_id).await?;
        let kind = classify(reply.as_bytes());
        self.metrics.record_classification(kind);
        Ok(kind)
    }

    /// Returns whether an event went out
    async fn publish_reading(&self, event: ClassifiedEvent) -> bool {
        let (status, level, code) = match event.kind {
            Occupancy::Free => (Some(false), LogLevel::Info, codes::SECTION_STATUS),
            Occupancy::Occupied => (Some(true), LogLevel::Info, codes::SECTION_STATUS),
            Occupancy::Disconnected => (None, LogLevel::Warning, codes::SENSOR_DISCONNECTED),
            Occupancy::Malformed => {
                warn!(cycle = self.cycle, sensor_id = %event.sensor_id, "malformed_reply");
                return false;
            }
        };
        debug!(cycle = self.cycle, sensor_id = %event.sensor_id, kind = event.kind.as_str(), "sensor_classified");

        let ip = &self.client.target().ip;
        let payload = sensor_log(ip, Some(event.sensor_id.as_str()), status, level, code);
        match self.dispatcher.dispatch_to(&self.route, &payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    cycle = self.cycle,
                    sensor_id = %event.sensor_id,
                    kind = e.kind(),
                    error = %e,
                    "sensor_event_dropped"
                );
                self.metrics.record_dropped();
                false
            }
        }
    }

    async fn skip_cycle(&mut self, code: i64) -> CycleOutcome {
        self.metrics.record_cycle_skipped();
        self.report(LogLevel::Critical, code).await;
        CycleOutcome::Skipped
    }

    /// Gateway-level diagnostic, not tied to a sensor
    async fn report(&self, level: LogLevel, code: i64) {
        let payload = sensor_log(&self.client.target().ip, None, None, level, code);
        if let Err(e) = self.dispatcher.dispatch_to(&self.route, &payload).await {
            warn!(cycle = self.cycle, code = code, kind = e.kind(), error = %e, "diagnostic_dropped");
            self.metrics.record_dropped();
        }
    }
}
