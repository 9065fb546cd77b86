//! Immutable scoring context shared by every worker

use std::sync::Arc;

use repofinder_core::{
    ActivityScorer, ActivityWindow, Candidate, Classifier, ConfidenceScorer, ConfigResult,
    OrgIdentity, RecordParts, RepoSignals, ScoredRecord, Settings, WeightTable,
};

/// Identity, taxonomies, weights and window for one run
pub struct ScoringContext {
    identity: Arc<OrgIdentity>,
    classifier: Classifier,
    confidence: ConfidenceScorer,
    activity: ActivityScorer,
    window: ActivityWindow,
}

impl ScoringContext {
    pub fn new(
        identity: OrgIdentity,
        classifier: Classifier,
        weights: WeightTable,
        window: ActivityWindow,
    ) -> ConfigResult<Self> {
        identity.validate()?;
        weights.validate()?;
        Ok(Self {
            confidence: ConfidenceScorer::new(&identity),
            identity: Arc::new(identity),
            classifier,
            activity: ActivityScorer::new(weights),
            window,
        })
    }

    /// Build from loaded settings; fails before any network call
    pub fn from_settings(identity: OrgIdentity, settings: &Settings) -> ConfigResult<Self> {
        let classifier = settings.classification.build_classifier()?;
        let weights = settings.activity.weight_table()?;
        let window = settings.activity.window()?;
        Self::new(identity, classifier, weights, window)
    }

    pub fn identity(&self) -> &Arc<OrgIdentity> {
        &self.identity
    }

    pub fn window(&self) -> &ActivityWindow {
        &self.window
    }

    pub fn weights(&self) -> &WeightTable {
        self.activity.table()
    }

    /// Score one candidate's signals into its output record
    pub fn score(&self, candidate: &mut Candidate, signals: &RepoSignals) -> ScoredRecord {
        let confidence = self.confidence.score(signals);
        candidate.apply_confidence(&confidence);

        let activity = self.activity.score(&signals.activity);
        let corpus = signals.corpus();
        let classification = self.classifier.classify_domain(&corpus);
        let project = self
            .classifier
            .classify_project_type(&corpus, &signals.root_files);
        let is_scientific = self.classifier.is_scientific(&classification.domain);

        ScoredRecord::assemble(RecordParts {
            candidate,
            signals,
            confidence: &confidence,
            activity,
            classification,
            project,
            is_scientific,
            organization_name: &self.identity.name,
        })
    }
}
