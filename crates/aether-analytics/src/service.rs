// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The background service that owns the monitors and schedules them.
//!
//! Producers push updates through a bounded channel; the loop ingests
//! pending updates each tick and runs every monitor at its cadence
//! (safety 1 s, predictor/advisor recompute 5 s, stability windows 60 s,
//! degradation on every sample). The latest derived outputs are published
//! under a shared read lock. All monitor state is owned by the loop
//! thread, so no cross-component locking exists.

use crate::advisor::{AdvisorInputs, AdvisorStats, OptimizationAdvisor, Suggestion};
use crate::predictor::{current_readiness, predict, PredictionMetrics};
use crate::safety::SafetyMonitor;
use crate::stability::{MemoryProbe, StabilityFlags, StabilityMonitor};
use aether_core::clock::Clock;
use aether_core::config::{PredictorConfig, SafetyConfig, ServiceConfig, StabilityConfig};
use aether_core::error::ConfigError;
use aether_core::event::SafetyStatus;
use aether_core::sink::{CorrectiveSink, TieredSink};
use aether_core::state::SimulationState;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

/// Full configuration for the analytics service and its monitors.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    /// Scheduling configuration.
    pub service: ServiceConfig,
    /// Safety monitor configuration.
    pub safety: SafetyConfig,
    /// Stability monitor configuration.
    pub stability: StabilityConfig,
    /// Predictor configuration.
    pub predictor: PredictorConfig,
}

impl AnalyticsConfig {
    /// Validates every section, failing fast before the first tick.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.service.validate()?;
        self.safety.validate()?;
        self.stability.validate()?;
        self.predictor.validate()
    }
}

/// An update pushed into the service by the host or the producer.
#[derive(Debug, Clone)]
pub enum AnalyticsUpdate {
    /// A fresh simulation snapshot.
    State(SimulationState),
    /// An instantaneous frame-rate sample from the renderer.
    FrameRate(f64),
    /// Host-side mode toggles consumed by the advisor.
    Modes {
        /// Whether realtime mode is enabled.
        realtime_enabled: bool,
        /// Whether fractal mode is enabled.
        fractal_enabled: bool,
    },
    /// Dismiss a suggestion by id.
    DismissSuggestion(String),
    /// Accept an implementable suggestion by id.
    ApplySuggestion(String),
    /// Clear the advisor's dismissed-set.
    ClearDismissed,
}

/// The latest derived outputs, published after each loop iteration.
#[derive(Debug, Clone)]
pub struct AnalyticsOutputs {
    /// Current safety classification.
    pub safety_status: SafetyStatus,
    /// Latest prediction, if a recompute has run.
    pub prediction: Option<PredictionMetrics>,
    /// Current suggestion list.
    pub suggestions: Vec<Suggestion>,
    /// Aggregate advisor counts.
    pub advisor_stats: AdvisorStats,
    /// Current stability flags.
    pub stability: StabilityFlags,
}

impl Default for AnalyticsOutputs {
    fn default() -> Self {
        Self {
            safety_status: SafetyStatus::Safe,
            prediction: None,
            suggestions: Vec::new(),
            advisor_stats: AdvisorStats {
                total: 0,
                implementable: 0,
                max_estimated_improvement_pct: 0.0,
            },
            stability: StabilityFlags::default(),
        }
    }
}

struct MonitorSet {
    safety: SafetyMonitor,
    stability: StabilityMonitor,
    advisor: OptimizationAdvisor,
}

/// Owns the monitors and drives them on a background thread.
pub struct AnalyticsService {
    config: AnalyticsConfig,
    clock: Arc<dyn Clock>,
    outputs: Arc<RwLock<AnalyticsOutputs>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    update_tx: Sender<AnalyticsUpdate>,
    monitors: Option<MonitorSet>,
}

impl AnalyticsService {
    /// Creates the service and its ingest channel. Configuration is
    /// validated here, before any task is scheduled.
    pub fn new(
        config: AnalyticsConfig,
        clock: Arc<dyn Clock>,
        corrective: Arc<dyn CorrectiveSink>,
        persistence: Arc<TieredSink>,
        probe: Box<dyn MemoryProbe>,
    ) -> Result<(Self, Receiver<AnalyticsUpdate>), ConfigError> {
        config.validate()?;
        let (tx, rx) = crossbeam_channel::bounded(config.service.channel_capacity);

        let monitors = MonitorSet {
            safety: SafetyMonitor::new(
                config.safety.clone(),
                Arc::clone(&clock),
                Arc::clone(&corrective),
                Arc::clone(&persistence),
            )?,
            stability: StabilityMonitor::new(
                config.stability.clone(),
                Arc::clone(&clock),
                probe,
                corrective,
            )?,
            advisor: OptimizationAdvisor::new(persistence, Arc::clone(&clock)),
        };

        let service = Self {
            config,
            clock,
            outputs: Arc::new(RwLock::new(AnalyticsOutputs::default())),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            update_tx: tx,
            monitors: Some(monitors),
        };
        Ok((service, rx))
    }

    /// Starts the background loop. No-op if already running or already
    /// torn down.
    pub fn start(&mut self, update_rx: Receiver<AnalyticsUpdate>) {
        if self.running.load(Ordering::SeqCst) {
            return;
        }
        let Some(monitors) = self.monitors.take() else {
            log::error!("Analytics service cannot be restarted after teardown");
            return;
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let outputs = Arc::clone(&self.outputs);
        let clock = Arc::clone(&self.clock);
        let config = self.config.clone();
        let tick_duration = Duration::from_secs_f64(1.0 / config.service.tick_rate as f64);

        let handle = thread::spawn(move || {
            let MonitorSet {
                mut safety,
                mut stability,
                mut advisor,
            } = monitors;
            let mut latest_state: Option<SimulationState> = None;
            let mut latest_fps = f64::NAN;
            let mut realtime_enabled = false;
            let mut fractal_enabled = false;
            let mut last_safety_ms: u64 = 0;
            let mut last_recompute_ms: u64 = 0;

            log::info!("Analytics service thread started.");

            while running.load(Ordering::Relaxed) {
                let loop_start = Instant::now();

                // 1. Ingest all pending updates.
                while let Ok(update) = update_rx.try_recv() {
                    match update {
                        AnalyticsUpdate::State(state) => {
                            if !state.is_finite() {
                                log::warn!("Analytics: dropping non-finite state snapshot");
                                continue;
                            }
                            stability.sample(state.tptt_value, latest_fps);
                            latest_state = Some(state);
                        }
                        AnalyticsUpdate::FrameRate(fps) => {
                            if fps.is_finite() {
                                latest_fps = fps;
                            }
                            let characteristic = latest_state
                                .as_ref()
                                .map(|s| s.tptt_value)
                                .unwrap_or(f64::NAN);
                            stability.sample(characteristic, latest_fps);
                        }
                        AnalyticsUpdate::Modes {
                            realtime_enabled: realtime,
                            fractal_enabled: fractal,
                        } => {
                            realtime_enabled = realtime;
                            fractal_enabled = fractal;
                        }
                        AnalyticsUpdate::DismissSuggestion(id) => advisor.dismiss(&id),
                        AnalyticsUpdate::ApplySuggestion(id) => {
                            advisor.apply(&id);
                        }
                        AnalyticsUpdate::ClearDismissed => advisor.clear_dismissed(),
                    }
                }

                // 2. Cadenced work over the latest snapshot.
                let now = clock.now_ms();
                let mut prediction_update: Option<PredictionMetrics> = None;
                if let Some(state) = &latest_state {
                    if now.saturating_sub(last_safety_ms) >= config.service.safety_interval_ms {
                        last_safety_ms = now;
                        safety.sample(state.e_t);
                    }
                    if now.saturating_sub(last_recompute_ms)
                        >= config.service.recompute_interval_ms
                    {
                        last_recompute_ms = now;
                        let metrics = predict(state, &config.predictor);
                        let readiness =
                            current_readiness(state.tptt_value, state.adaptive_threshold);
                        advisor.recompute(&AdvisorInputs {
                            state,
                            readiness,
                            realtime_enabled,
                            fractal_enabled,
                        });
                        prediction_update = Some(metrics);
                    }
                }

                // 3. Windowed stability checks (the monitor gates the 60 s
                // cadence itself).
                stability.tick();

                // 4. Publish the latest outputs.
                {
                    let mut out = outputs.write().unwrap();
                    if let Some(state) = &latest_state {
                        out.safety_status = safety.evaluate(state.e_t);
                    }
                    if let Some(metrics) = prediction_update {
                        out.prediction = Some(metrics);
                    }
                    out.suggestions = advisor.suggestions().to_vec();
                    out.advisor_stats = advisor.stats();
                    out.stability = stability.flags();
                }

                // 5. Sleep until the next tick.
                let elapsed = loop_start.elapsed();
                if elapsed < tick_duration {
                    thread::sleep(tick_duration - elapsed);
                }
            }
            log::info!("Analytics service thread stopped.");
        });

        self.handle = Some(handle);
    }

    /// Stops the background loop and joins the worker thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Returns a sender handle for pushing updates into the service.
    pub fn update_sender(&self) -> Sender<AnalyticsUpdate> {
        self.update_tx.clone()
    }

    /// A clone of the latest published outputs.
    pub fn outputs(&self) -> AnalyticsOutputs {
        self.outputs.read().unwrap().clone()
    }

    /// Whether the background loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for AnalyticsService {
    fn drop(&mut self) {
        self.stop();
    }
}
