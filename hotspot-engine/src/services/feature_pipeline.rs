//! Feature pipeline
//!
//! Brings signals up to date: extracts features when the stored bundle is
//! not current, classifies, and writes the annotations beside the signal.
//! Used by clustering stage 1, batch regeneration and ingestion.

use crate::db::{SignalFilter, SignalRepository};
use crate::models::{ClassifiedSignal, NewSignal, Signal};
use crate::services::domain_classifier::DomainClassifier;
use crate::services::feature_extractor::FeatureExtractor;
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use hotspot_common::events::{EventBus, HotspotEvent, RegenerationCounts};
use hotspot_common::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// What happened to a signal's features
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureStatus {
    /// Stored bundle was current and reused
    Current,
    /// Bundle (re)extracted and stored
    Regenerated,
    /// Provider failed; nothing stored, signal excluded from clustering
    Degraded(String),
}

/// A signal with up-to-date annotations
#[derive(Debug, Clone)]
pub struct AnnotatedSignal {
    pub signal: Signal,
    pub status: FeatureStatus,
}

impl AnnotatedSignal {
    /// The clustering view, when features are usable
    pub fn classified(&self) -> Option<ClassifiedSignal> {
        if matches!(self.status, FeatureStatus::Degraded(_)) {
            return None;
        }
        classified(&self.signal)
    }
}

/// Clustering view of a signal with non-degraded features and a classification
pub fn classified(signal: &Signal) -> Option<ClassifiedSignal> {
    let features = signal.features.as_ref().filter(|f| !f.is_degraded())?;
    let classification = signal.classification.clone()?;
    Some(ClassifiedSignal {
        id: signal.id,
        title: signal.title.clone(),
        severity: signal.severity,
        department: signal.department.clone(),
        embedding: features.embedding.clone(),
        entities: features.entities.clone(),
        domain_tags: features.domain_tags.clone(),
        classification,
    })
}

/// Body of `POST /features/regenerate`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegenerationRequest {
    #[serde(default)]
    pub max_signals: Option<usize>,
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default = "crate::models::signal::default_scope")]
    pub scope: String,
}

/// Response of `POST /features/regenerate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerationSummary {
    pub scope: String,
    #[serde(flatten)]
    pub counts: RegenerationCounts,
    pub degraded_signal_ids: Vec<Uuid>,
    pub duration_ms: u64,
}

/// Signal annotation pipeline
pub struct FeaturePipeline {
    signals: Arc<dyn SignalRepository>,
    extractor: Arc<FeatureExtractor>,
    classifier: Arc<DomainClassifier>,
    event_bus: EventBus,
}

impl FeaturePipeline {
    pub fn new(
        signals: Arc<dyn SignalRepository>,
        extractor: Arc<FeatureExtractor>,
        classifier: Arc<DomainClassifier>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            signals,
            extractor,
            classifier,
            event_bus,
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Annotate in memory; the flag tells whether the classification changed
    async fn compute(&self, mut signal: Signal, force_regenerate: bool) -> (Signal, FeatureStatus, bool) {
        let status = if self.extractor.needs_extraction(&signal, force_regenerate) {
            let outcome = self.extractor.extract(&signal).await;
            match outcome.degraded_reason {
                Some(reason) => {
                    signal.features = Some(outcome.bundle);
                    FeatureStatus::Degraded(reason)
                }
                None => {
                    signal.features = Some(outcome.bundle);
                    signal.features_generated_at = Some(Utc::now());
                    FeatureStatus::Regenerated
                }
            }
        } else {
            FeatureStatus::Current
        };

        let classification = self.classifier.classify(&signal, signal.features.as_ref());
        let classification_changed = signal.classification.as_ref() != Some(&classification);
        signal.classification = Some(classification);

        (signal, status, classification_changed)
    }

    /// Bring one stored signal up to date and persist what changed
    pub async fn annotate(&self, signal: Signal, force_regenerate: bool) -> Result<AnnotatedSignal> {
        let (signal, status, classification_changed) = self.compute(signal, force_regenerate).await;

        if status == FeatureStatus::Regenerated {
            if let (Some(bundle), Some(generated_at)) = (&signal.features, signal.features_generated_at) {
                self.signals.write_features(signal.id, bundle, generated_at).await?;
            }
        }
        if classification_changed {
            if let Some(classification) = &signal.classification {
                self.signals.write_classification(signal.id, classification).await?;
            }
        }

        Ok(AnnotatedSignal { signal, status })
    }

    /// Annotate many signals with bounded concurrency, in completion order
    pub fn annotate_all(
        &self,
        signals: Vec<Signal>,
        force_regenerate: bool,
        concurrency: usize,
    ) -> impl Stream<Item = Result<AnnotatedSignal>> + '_ {
        stream::iter(signals)
            .map(move |signal| self.annotate(signal, force_regenerate))
            .buffer_unordered(concurrency.max(1))
    }

    /// Batch regeneration for one scope
    pub async fn regenerate(&self, request: &RegenerationRequest, concurrency: usize) -> Result<RegenerationSummary> {
        let start = Instant::now();
        let signals = self
            .signals
            .fetch_signals(&SignalFilter {
                scope: request.scope.clone(),
                received_after: None,
                limit: request.max_signals,
            })
            .await?;

        let mut counts = RegenerationCounts::default();
        let mut degraded_signal_ids = Vec::new();
        let mut stream = self.annotate_all(signals, request.force_regenerate, concurrency);
        while let Some(result) = stream.next().await {
            let annotated = result?;
            counts.processed += 1;
            match annotated.status {
                FeatureStatus::Current => counts.skipped_current += 1,
                FeatureStatus::Regenerated => counts.regenerated += 1,
                FeatureStatus::Degraded(_) => {
                    counts.degraded += 1;
                    degraded_signal_ids.push(annotated.signal.id);
                }
            }
        }
        degraded_signal_ids.sort();

        if counts.degraded > 0 {
            warn!(scope = %request.scope, degraded = counts.degraded, "Some signals could not be embedded");
        }
        info!(
            scope = %request.scope,
            processed = counts.processed,
            regenerated = counts.regenerated,
            skipped_current = counts.skipped_current,
            "Feature regeneration finished"
        );

        self.event_bus.emit_lossy(HotspotEvent::FeaturesRegenerated {
            counts: counts.clone(),
            timestamp: Utc::now(),
        });

        Ok(RegenerationSummary {
            scope: request.scope.clone(),
            counts,
            degraded_signal_ids,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Store a new signal with its features and classification
    pub async fn ingest(&self, new_signal: NewSignal) -> Result<AnnotatedSignal> {
        let signal = new_signal.into_signal();
        let (mut signal, status, _) = self.compute(signal, false).await;
        if matches!(status, FeatureStatus::Degraded(_)) {
            // Text and classification are kept; features are retried on the next run
            signal.features = None;
            signal.features_generated_at = None;
        }
        self.signals.insert_signal(&signal).await?;
        info!(signal_id = %signal.id, scope = %signal.scope, "Signal ingested");
        Ok(AnnotatedSignal { signal, status })
    }
}
