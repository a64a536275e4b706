//! Scheduled tick loop and signal dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::compute::{AdaptationEmitter, PopulationManager};
use crate::schema::{AdaptationSignal, FieldStatus, ObservationFeed, PopulationSnapshot, SignalOutcome};

use super::queue::DropOldestQueue;
use super::sink::SignalSink;
use super::snapshot::SnapshotHandle;
use super::{RuntimeError, ShutdownReport};

type SharedAudit = Arc<Mutex<AuditRecorder>>;

/// State owned by the tick task. Nothing else mutates the population.
struct TickLoop {
    manager: PopulationManager,
    emitter: AdaptationEmitter,
    feed: Box<dyn ObservationFeed>,
    signals: Arc<DropOldestQueue<AdaptationSignal>>,
    snapshot: Arc<SnapshotHandle>,
    audit: Option<SharedAudit>,
    generation: watch::Sender<u64>,
    signals_emitted: u64,
}

impl TickLoop {
    fn run_tick(&mut self) {
        let report = self.manager.tick(self.feed.as_mut());
        self.snapshot.publish(Arc::clone(&report.snapshot));

        let signals = self
            .emitter
            .evaluate(&report.snapshot.metrics, Utc::now());

        if let Some(audit) = &self.audit {
            let mut recorder = audit.lock();
            let written = recorder.record_tick(&report).and_then(|_| {
                for signal in &signals {
                    recorder.record(&AuditEntry::Signal(signal.clone()))?;
                }
                recorder.flush()
            });
            if let Err(e) = written {
                warn!("Audit write failed at tick {}: {}", report.snapshot.generation, e);
            }
        }

        for signal in signals {
            self.signals_emitted += 1;
            if !self.signals.push(signal) {
                warn!("Signal queue closed, dropping signal");
            }
        }

        self.generation.send_replace(report.snapshot.generation);
    }
}

/// Counters kept by the dispatcher task.
#[derive(Debug, Clone, Copy, Default)]
struct DispatchStats {
    applied: u64,
    failed: u64,
}

async fn dispatch(
    signals: Arc<DropOldestQueue<AdaptationSignal>>,
    sink: Arc<dyn SignalSink>,
    audit: Option<SharedAudit>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    loop {
        signals.wait().await;
        let batch = signals.drain(usize::MAX);
        if batch.is_empty() && signals.is_closed() {
            break;
        }

        for signal in batch {
            let outcome = match sink.apply(&signal).await {
                Ok(()) => {
                    stats.applied += 1;
                    debug!("Applied {} = {}", signal.parameter, signal.value);
                    SignalOutcome::applied(&signal)
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        "Failed to apply {} = {} from tick {}: {}",
                        signal.parameter, signal.value, signal.tick, e
                    );
                    SignalOutcome::failed(&signal, e)
                }
            };

            if let Some(audit) = &audit {
                let mut recorder = audit.lock();
                let written = recorder
                    .record(&AuditEntry::Outcome(outcome))
                    .and_then(|_| recorder.flush());
                if let Err(e) = written {
                    warn!("Audit write failed for signal outcome: {}", e);
                }
            }
        }
    }
    stats
}

/// A running field: the scheduled tick loop plus the signal dispatcher.
pub struct FieldRuntime {
    snapshot: Arc<SnapshotHandle>,
    signals: Arc<DropOldestQueue<AdaptationSignal>>,
    generation: watch::Receiver<u64>,
    audit: Option<SharedAudit>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    tick_task: Option<JoinHandle<Result<TickLoop, JoinError>>>,
    dispatcher: Option<JoinHandle<DispatchStats>>,
}

impl FieldRuntime {
    /// Spawn the tick loop and dispatcher on the current tokio runtime.
    ///
    /// The period and signal queue size come from the manager's schedule
    /// configuration. The first tick runs immediately.
    pub fn spawn(
        manager: PopulationManager,
        emitter: AdaptationEmitter,
        feed: Box<dyn ObservationFeed>,
        sink: Arc<dyn SignalSink>,
        audit: Option<AuditRecorder>,
    ) -> Self {
        let schedule = manager.config().schedule.clone();
        let snapshot = Arc::new(SnapshotHandle::new(manager.snapshot()));
        let signals = Arc::new(DropOldestQueue::new(schedule.signal_capacity));
        let audit = audit.map(|recorder| Arc::new(Mutex::new(recorder)));
        let (generation_tx, generation_rx) = watch::channel(manager.generation());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state = TickLoop {
            manager,
            emitter,
            feed,
            signals: Arc::clone(&signals),
            snapshot: Arc::clone(&snapshot),
            audit: audit.clone(),
            generation: generation_tx,
            signals_emitted: 0,
        };

        let period = Duration::from_millis(schedule.period_ms);
        info!("Starting field runtime with a {:?} tick period", period);
        let tick_task = tokio::spawn(Self::tick_loop(state, period, shutdown_rx));
        let dispatcher = tokio::spawn(dispatch(Arc::clone(&signals), sink, audit.clone()));

        Self {
            snapshot,
            signals,
            generation: generation_rx,
            audit,
            shutdown_tx: Some(shutdown_tx),
            tick_task: Some(tick_task),
            dispatcher: Some(dispatcher),
        }
    }

    /// Ticks run on the blocking pool; the loop owns the state between them.
    async fn tick_loop(
        mut state: TickLoop,
        period: Duration,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Result<TickLoop, JoinError> {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Tick loop stopping after {} ticks", state.manager.generation());
                    break;
                }
                _ = interval.tick() => {
                    state = tokio::task::spawn_blocking(move || {
                        state.run_tick();
                        state
                    })
                    .await?;
                }
            }
        }
        Ok(state)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<PopulationSnapshot> {
        self.snapshot.load()
    }

    /// Shared handle for concurrent status readers.
    pub fn snapshot_handle(&self) -> Arc<SnapshotHandle> {
        Arc::clone(&self.snapshot)
    }

    pub fn status(&self) -> FieldStatus {
        self.snapshot.status()
    }

    /// Receiver tracking the number of completed ticks.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.clone()
    }

    /// Stop ticking, let the dispatcher drain and report.
    ///
    /// An in-flight tick always completes before the loop observes the
    /// shutdown request.
    pub async fn shutdown(&mut self) -> Result<ShutdownReport, RuntimeError> {
        let (Some(tick_task), Some(dispatcher)) = (self.tick_task.take(), self.dispatcher.take())
        else {
            return Err(RuntimeError::AlreadyShutDown);
        };

        if let Some(tx) = self.shutdown_tx.take() {
            // The loop may already have exited; nothing to stop then.
            let _ = tx.send(());
        }
        let TickLoop {
            manager,
            signals_emitted,
            ..
        } = tick_task.await??;

        self.signals.close();
        let stats = dispatcher.await?;

        let audit = match self.audit.take() {
            Some(shared) => match Arc::try_unwrap(shared) {
                Ok(recorder) => Some(recorder.into_inner().finish()?),
                Err(shared) => {
                    shared.lock().flush()?;
                    None
                }
            },
            None => None,
        };

        let report = ShutdownReport {
            ticks: manager.generation(),
            status: self.snapshot.status(),
            signals_emitted,
            signals_applied: stats.applied,
            signals_failed: stats.failed,
            signals_dropped: self.signals.dropped(),
            audit,
        };
        info!("Field runtime stopped: {}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditPlayer, RecorderConfig};
    use crate::compute::evolution::FixedInterpreter;
    use crate::runtime::{SinkError, observation_channel};
    use crate::schema::{
        AdaptationConfig, AdaptationRule, Condition, FieldConfig, FitnessComponents,
        ObservationEvent, SilentFeed,
    };
    use async_trait::async_trait;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<AdaptationSignal>>,
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn apply(&self, signal: &AdaptationSignal) -> Result<(), SinkError> {
            self.applied.lock().push(signal.clone());
            Ok(())
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl SignalSink for RejectingSink {
        async fn apply(&self, _signal: &AdaptationSignal) -> Result<(), SinkError> {
            Err(SinkError::Rejected("read-only environment".to_string()))
        }
    }

    fn config() -> FieldConfig {
        let mut config = FieldConfig {
            random_seed: Some(5),
            ..FieldConfig::default()
        };
        config.schedule.period_ms = 1000;
        config
    }

    fn manager(config: &FieldConfig) -> PopulationManager {
        PopulationManager::with_interpreter(
            config.clone(),
            Arc::new(FixedInterpreter(FitnessComponents {
                semantic_resonance: 0.0,
                entropy: 0.5,
                surprise: 0.0,
            })),
        )
        .unwrap()
    }

    fn every_tick() -> AdaptationEmitter {
        AdaptationEmitter::new(AdaptationConfig {
            rules: vec![AdaptationRule {
                condition: Condition::PopulationAbove(0),
                parameter: "test.knob".to_string(),
                value: 1.0,
                reason: "always".to_string(),
            }],
            dissonance_window: 4,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_ticks_and_dispatches() {
        let config = config();
        let sink = Arc::new(RecordingSink::default());
        let mut runtime = FieldRuntime::spawn(
            manager(&config),
            every_tick(),
            Box::new(SilentFeed),
            sink.clone(),
            None,
        );

        let mut generation = runtime.subscribe();
        generation.wait_for(|&g| g >= 3).await.unwrap();
        assert!(runtime.status().generation >= 3);
        assert_eq!(runtime.status().population, 25);

        let report = runtime.shutdown().await.unwrap();
        assert!(report.ticks >= 3);
        assert_eq!(report.status.generation, report.ticks);
        assert_eq!(report.signals_emitted, report.ticks);
        assert_eq!(report.signals_applied, report.ticks);
        assert_eq!(report.signals_failed, 0);
        assert_eq!(sink.applied.lock().len() as u64, report.ticks);

        assert!(matches!(
            runtime.shutdown().await,
            Err(RuntimeError::AlreadyShutDown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_is_respected() {
        let config = config();
        let mut runtime = FieldRuntime::spawn(
            manager(&config),
            every_tick(),
            Box::new(SilentFeed),
            Arc::new(RecordingSink::default()),
            None,
        );

        let start = tokio::time::Instant::now();
        let mut generation = runtime.subscribe();
        generation.wait_for(|&g| g >= 4).await.unwrap();
        // First tick is immediate, the rest are one period apart.
        assert!(start.elapsed() >= Duration::from_millis(3000));

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failures_are_audited_not_retried() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let config = config();
        let recorder = AuditRecorder::open(&path, RecorderConfig::default()).unwrap();
        let (feed_handle, feed) = observation_channel(16);
        feed_handle.push(ObservationEvent::now("user", "all quiet", 0.2));

        let mut runtime = FieldRuntime::spawn(
            manager(&config),
            every_tick(),
            Box::new(feed),
            Arc::new(RejectingSink),
            Some(recorder),
        );
        runtime.subscribe().wait_for(|&g| g >= 2).await.unwrap();
        let report = runtime.shutdown().await.unwrap();

        assert_eq!(report.signals_applied, 0);
        assert_eq!(report.signals_failed, report.signals_emitted);

        let player = AuditPlayer::open(&path).unwrap();
        let audit = report.audit.expect("recorder finished on shutdown");
        assert_eq!(audit.entries_written as usize, player.len());
        assert!(audit.bytes_written > 0);
        let outcomes: Vec<_> = player
            .entries()
            .iter()
            .filter_map(|e| match e {
                AuditEntry::Outcome(o) => Some(o),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len() as u64, report.signals_emitted);
        assert!(outcomes.iter().all(|o| !o.success && o.error.is_some()));
        assert!(
            player
                .entries()
                .iter()
                .any(|e| matches!(e, AuditEntry::Observation(o) if o.payload == "all quiet"))
        );
    }
}
