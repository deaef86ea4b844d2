//! The monitoring engine: owns all shared state and the background workers.

use std::sync::{Arc, Mutex};

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::ERR_POISONED_LOCK;
use crate::cpu::ProcessCpuSampler;
use crate::dispatcher::EventDispatcher;
use crate::event::{OperationCompleted, OperationEventSink};
use crate::metrics::{OperationMetrics, OperationMetricsSnapshot};
use crate::options::{MonitoringOptions, OptionsError};
use crate::pal::PlatformFacade;
use crate::registry::OperationRegistry;
use crate::rotation::{Horizon, RotationScheduler};

/// The central object of this package: one engine instance owns the operation
/// registry, the event dispatcher, the rotation schedulers, and the optional
/// CPU sampler.
///
/// An engine is created once, shared via [`Arc`], and dropped at process
/// shutdown; dropping it stops every background thread with a bounded wait.
/// All methods are callable from any thread.
///
/// Reconfiguration goes through [`apply_options`](Self::apply_options): the
/// options value is swapped wholesale and only the components whose tunables
/// actually changed are restarted.
#[derive(Debug)]
pub struct MonitoringEngine {
    options: ArcSwap<MonitoringOptions>,
    registry: Arc<OperationRegistry>,
    dispatcher: EventDispatcher,

    /// Rotation schedulers, replaced under this lock on reconfiguration. The
    /// lock also serializes concurrent `apply_options` calls.
    background: Mutex<Option<RotationSet>>,

    /// Swapped atomically so the completion path reads the latest CPU sample
    /// without ever touching the reconfiguration lock.
    cpu_sampler: ArcSwapOption<ProcessCpuSampler>,

    platform: PlatformFacade,
}

#[derive(Debug)]
struct RotationSet {
    hot: RotationScheduler,
    warm: RotationScheduler,
    cold: RotationScheduler,
}

impl MonitoringEngine {
    /// Creates an engine with the given configuration and sink set, starting
    /// the rotation schedulers and (if enabled) the CPU sampler.
    ///
    /// The sink set is fixed for the engine's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] if the configuration fails validation; nothing
    /// is started in that case.
    pub fn new(
        options: MonitoringOptions,
        sinks: Vec<Arc<dyn OperationEventSink>>,
    ) -> Result<Self, OptionsError> {
        Self::with_platform(options, sinks, PlatformFacade::real())
    }

    pub(crate) fn with_platform(
        options: MonitoringOptions,
        sinks: Vec<Arc<dyn OperationEventSink>>,
        platform: PlatformFacade,
    ) -> Result<Self, OptionsError> {
        options.validate()?;

        let registry = Arc::new(OperationRegistry::new());

        let dispatcher = EventDispatcher::new(sinks);
        dispatcher.update_options(&options);

        let workers = RotationSet {
            hot: RotationScheduler::new(Horizon::Hot, options.hot_period(), Arc::clone(&registry)),
            warm: RotationScheduler::new(
                Horizon::Warm,
                options.warm_period(),
                Arc::clone(&registry),
            ),
            cold: RotationScheduler::new(
                Horizon::Cold,
                options.cold_period(),
                Arc::clone(&registry),
            ),
        };

        let cpu_sampler = ArcSwapOption::from(options.enable_cpu_measurement.then(|| {
            Arc::new(ProcessCpuSampler::new(
                options.cpu_sample_interval(),
                options.cpu_sample_history_count,
                platform.clone(),
            ))
        }));

        Ok(Self {
            options: ArcSwap::from_pointee(options),
            registry,
            dispatcher,
            background: Mutex::new(Some(workers)),
            cpu_sampler,
            platform,
        })
    }

    /// The configuration currently in effect.
    #[must_use]
    pub fn current_options(&self) -> Arc<MonitoringOptions> {
        self.options.load_full()
    }

    /// Replaces the configuration wholesale.
    ///
    /// Components whose tunables changed are restarted: rotation schedulers
    /// with a new period, the event queue on a dispatch mode or capacity
    /// change, the CPU sampler on any change to its settings. Window depths of
    /// already-registered operations are fixed at their creation and do not
    /// resize.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] if the new value fails validation; the
    /// previous configuration stays in effect.
    pub fn apply_options(&self, options: MonitoringOptions) -> Result<(), OptionsError> {
        options.validate()?;

        // Holding the background lock across the swap serializes overlapping
        // apply calls; each call's restarts match the options value it stored.
        let mut background = self.background.lock().expect(ERR_POISONED_LOCK);

        let previous = self.options.load_full();
        self.options.store(Arc::new(options.clone()));

        // The drop-warning throttle is stored atomically; restarting the
        // consumer (which discards queued events) is reserved for changes the
        // running worker cannot absorb.
        self.dispatcher
            .set_drop_log_throttle(options.event_drop_log_throttle_seconds);

        if options.event_dispatch_mode != previous.event_dispatch_mode
            || options.event_queue_capacity != previous.event_queue_capacity
        {
            self.dispatcher.update_options(&options);
        }

        if let Some(workers) = background.as_mut() {
            if options.hot_period() != workers.hot.period() {
                workers.hot = RotationScheduler::new(
                    Horizon::Hot,
                    options.hot_period(),
                    Arc::clone(&self.registry),
                );
            }

            if options.warm_period() != workers.warm.period() {
                workers.warm = RotationScheduler::new(
                    Horizon::Warm,
                    options.warm_period(),
                    Arc::clone(&self.registry),
                );
            }

            if options.cold_period() != workers.cold.period() {
                workers.cold = RotationScheduler::new(
                    Horizon::Cold,
                    options.cold_period(),
                    Arc::clone(&self.registry),
                );
            }
        }

        let cpu_changed = options.enable_cpu_measurement != previous.enable_cpu_measurement
            || options.cpu_sample_interval_seconds != previous.cpu_sample_interval_seconds
            || options.cpu_sample_history_count != previous.cpu_sample_history_count;

        if cpu_changed {
            self.cpu_sampler
                .store(options.enable_cpu_measurement.then(|| {
                    Arc::new(ProcessCpuSampler::new(
                        options.cpu_sample_interval(),
                        options.cpu_sample_history_count,
                        self.platform.clone(),
                    ))
                }));
        }

        Ok(())
    }

    /// Total number of completion events discarded because the background
    /// event queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dispatcher.dropped_events()
    }

    /// Resolves the metrics entry for `name`, or `None` when the operation
    /// cap rejects a new name.
    pub(crate) fn get_or_create_metrics(&self, name: &str) -> Option<Arc<OperationMetrics>> {
        // Read the options before taking the registry lock; registry inserts
        // never wait on configuration reads.
        let options = self.options.load_full();
        self.registry.get_or_create(name, &options)
    }

    pub(crate) fn capture_snapshots(&self) -> Vec<OperationMetricsSnapshot> {
        self.registry
            .snapshot_values()
            .iter()
            .map(|metrics| metrics.capture_snapshot())
            .collect()
    }

    pub(crate) fn find_metrics(&self, name: &str) -> Option<Arc<OperationMetrics>> {
        self.registry.get(name)
    }

    pub(crate) fn publish_event(&self, event: OperationCompleted) {
        self.dispatcher.publish(event);
    }

    /// The most recent CPU utilization sample, or `None` when the sampler is
    /// disabled or has not yet produced one.
    ///
    /// Lock-free: completion scopes call this on the hot path and must never
    /// wait on reconfiguration or worker teardown.
    pub(crate) fn cpu_percent(&self) -> Option<f64> {
        self.cpu_sampler
            .load()
            .as_ref()
            .and_then(|sampler| sampler.latest_sample())
    }

    pub(crate) fn platform(&self) -> &PlatformFacade {
        &self.platform
    }
}

impl Drop for MonitoringEngine {
    #[cfg_attr(test, mutants::skip)] // Teardown ordering mutations only show up as shutdown races.
    fn drop(&mut self) {
        // Stop rotation first so nothing advances windows mid-teardown, then
        // flush-or-abandon the event queue, then the CPU sampler.
        drop(self.background.lock().expect(ERR_POISONED_LOCK).take());
        self.dispatcher.shutdown();
        self.cpu_sampler.store(None);
    }
}
