// src/analysis/analyzer.rs
//! Session-level analysis over the persisted log tree

use crate::analysis::aggregator::{DupleAggregator, DupleReport};
use crate::analysis::comparator::{ComparisonResult, SequenceComparator};
use crate::analysis::diff::{ChangeSet, DiffEngine, DiffOptions, DEFAULT_MAX_COOCCURRENCE_KEYS};
use crate::analysis::duple::PatternCount;
use crate::analysis::entity::EntityRef;
use crate::analysis::narrative::{PatternReport, DEFAULT_TOP_PATTERNS};
use crate::analysis::trends::correlate;
use crate::recording::event::Value;
use crate::runtime::task::AnalysisTask;
use crate::storage::loader::SessionStore;
use crate::utils::errors::{EngineError, Result};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Analysis settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Numbers within this distance compare equal (`0.0` = exact)
    pub float_tolerance: f64,

    /// Cap on changed keys used for pair generation (`None` = unbounded)
    pub max_cooccurrence_keys: Option<usize>,

    /// Report `time_difference` between compared structures
    pub temporal_mode: bool,

    /// Duples seen fewer times are dropped
    pub min_occurrences: usize,

    /// Upper bound on sessions read by cross-session reports
    pub max_sessions: Option<usize>,

    /// Patterns listed per report
    pub top_patterns: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            float_tolerance: 0.0,
            max_cooccurrence_keys: Some(DEFAULT_MAX_COOCCURRENCE_KEYS),
            temporal_mode: false,
            min_occurrences: 2,
            max_sessions: None,
            top_patterns: DEFAULT_TOP_PATTERNS,
        }
    }
}

impl AnalysisConfig {
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            float_tolerance: self.float_tolerance,
            max_cooccurrence_keys: self.max_cooccurrence_keys,
            temporal_mode: self.temporal_mode,
        }
    }
}

/// Read-only analysis entry point
///
/// Cheap to clone; every operation reads from disk through the store.
#[derive(Debug, Clone)]
pub struct Analyzer {
    store: SessionStore,
    config: AnalysisConfig,
    engine: DiffEngine,
}

impl Analyzer {
    pub fn new(store: SessionStore, config: AnalysisConfig) -> Self {
        let engine = DiffEngine::new(config.diff_options());
        Self {
            store,
            config,
            engine,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn diff(&self, a: &Value, b: &Value) -> ChangeSet {
        self.engine.diff(a, b)
    }

    /// State views of a session's snapshots, in tick order
    pub fn session_states(&self, session_id: &str) -> Result<Vec<Value>> {
        let report = self.store.load_snapshots(session_id)?;
        Ok(report.items.iter().map(|s| s.state()).collect())
    }

    /// Binary-tree comparison of two sessions' state sequences
    pub fn compare_sessions(&self, a: &str, b: &str) -> Result<ComparisonResult> {
        let states_a = self.session_states(a)?;
        let states_b = self.session_states(b)?;

        let result = SequenceComparator::new(self.engine).compare_sequences(&states_a, &states_b);
        info!(
            "Compared {} ({} snapshots) with {} ({} snapshots): {} diffs, {} patterns",
            a,
            states_a.len(),
            b,
            states_b.len(),
            result.comparisons,
            result.pattern_counts.len()
        );
        Ok(result)
    }

    /// Co-changing keys within one session
    pub fn find_duples(&self, session_id: &str) -> Result<DupleReport> {
        let states = self.session_states(session_id)?;
        Ok(DupleAggregator::new(self.engine).find_duples(&states, self.config.min_occurrences))
    }

    /// Load any referenced artifact as one value
    pub fn load_entity(&self, entity: &EntityRef) -> Result<Value> {
        match entity {
            EntityRef::Snapshot { session_id, tick } => {
                let snapshot = self.store.load_snapshot(session_id, tick)?;
                Ok(serde_json::to_value(snapshot)?)
            }
            EntityRef::Session(session_id) => {
                let snapshots = self.store.load_snapshots(session_id)?.into_items();
                Ok(json!({
                    "session_id": session_id,
                    "snapshots": serde_json::to_value(snapshots)?,
                }))
            }
            EntityRef::Export(file_name) => self.store.load_export(file_name),
        }
    }

    /// Diff two artifacts, whatever level each one lives at
    pub fn compare_entities(&self, a: &EntityRef, b: &EntityRef) -> Result<ChangeSet> {
        let left = self.load_entity(a)?;
        let right = self.load_entity(b)?;
        let changes = self.engine.diff(&left, &right);
        debug!("{} vs {}: {} changed paths", a, b, changes.len());
        Ok(changes)
    }

    /// Narrative report for one session, with correlations of its top patterns
    pub fn pattern_report(&self, session_id: &str) -> Result<PatternReport> {
        let states = self.session_states(session_id)?;
        let duples =
            DupleAggregator::new(self.engine).find_duples(&states, self.config.min_occurrences);

        let report = PatternReport::build(
            vec![session_id.to_string()],
            states.len(),
            &duples.pattern_counts(),
            self.config.top_patterns,
        );
        let correlations = report
            .patterns
            .iter()
            .filter_map(|line| correlate(&states, line.duple.first(), line.duple.second()))
            .collect();

        Ok(report.with_correlations(correlations))
    }

    /// Patterns merged over the newest `k` sessions
    ///
    /// `k` is further bounded by `max_sessions`. Unreadable sessions are
    /// skipped; `token` is checked before each session.
    pub fn pattern_report_for_recent(
        &self,
        k: usize,
        token: &CancellationToken,
    ) -> Result<PatternReport> {
        let limit = self.config.max_sessions.map_or(k, |max| k.min(max));
        let sessions = self.store.list_recent_sessions(limit)?;
        let aggregator = DupleAggregator::new(self.engine);

        let mut counts = PatternCount::new();
        let mut session_ids = Vec::with_capacity(sessions.len());
        let mut snapshots = 0;

        for summary in &sessions {
            if token.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let states = match self.session_states(&summary.session_id) {
                Ok(states) => states,
                Err(e) => {
                    warn!("Skipping {} in pattern report: {}", summary.session_id, e);
                    continue;
                }
            };

            let duples = aggregator.find_duples(&states, self.config.min_occurrences);
            counts.merge(&duples.pattern_counts());
            snapshots += states.len();
            session_ids.push(summary.session_id.clone());
        }

        info!(
            "Pattern report over {} sessions: {} distinct patterns",
            session_ids.len(),
            counts.len()
        );
        Ok(PatternReport::build(
            session_ids,
            snapshots,
            &counts,
            self.config.top_patterns,
        ))
    }

    /// Run [`pattern_report_for_recent`](Self::pattern_report_for_recent) in the background
    pub fn spawn_recent_report(&self, k: usize) -> AnalysisTask<PatternReport> {
        let analyzer = self.clone();
        AnalysisTask::spawn("recent-pattern-report", move |token| {
            Ok(analyzer.pattern_report_for_recent(k, &token)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::diff::TimeDifference;
    use crate::recording::event::{Event, Priority};
    use crate::recording::snapshot::Snapshot;
    use crate::runtime::task::TaskOutcome;
    use crate::storage::layout::LogLayout;
    use crate::utils::fs::atomic_write;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn write_session(layout: &LogLayout, id: &str, start: f64, health: &[(i64, i64)]) {
        let paths = layout.session(id);
        paths.create_dirs().unwrap();
        atomic_write(
            &paths.manifest,
            json!({"session_id": id, "start_time": start}).to_string().as_bytes(),
        )
        .unwrap();

        for (i, (hp, wet)) in health.iter().enumerate() {
            let ts = start + i as f64;
            let tick = format!("{:016}", (ts * 1000.0) as u64);
            let event = Event::new(
                id,
                "player",
                json!({"health": hp, "wetness": wet}),
                Priority::Normal,
            )
            .at(ts);
            let snapshot = Snapshot {
                timestamp: ts,
                snapshot_time: tick.clone(),
                session_id: id.to_string(),
                categorized_data: BTreeMap::from([("player".to_string(), vec![event])]),
            };
            atomic_write(
                &paths.snapshot_path(&tick),
                serde_json::to_vec_pretty(&snapshot).unwrap().as_slice(),
            )
            .unwrap();
        }
    }

    fn declining() -> Vec<(i64, i64)> {
        (0..8).map(|i| (100 - 5 * i, 10 * i)).collect()
    }

    fn analyzer(layout: LogLayout) -> Analyzer {
        Analyzer::new(SessionStore::new(layout), AnalysisConfig::default())
    }

    #[test]
    fn test_unknown_session() {
        let dir = tempdir().unwrap();
        let analyzer = analyzer(LogLayout::new(dir.path()));

        let err = analyzer.compare_sessions("nope", "nope").unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound { .. }));
        assert!(analyzer.pattern_report("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_pattern_report_for_session() {
        let dir = tempdir().unwrap();
        let layout = LogLayout::new(dir.path());
        write_session(&layout, "s1", 1000.0, &declining());

        let analyzer = analyzer(layout);
        let duples = analyzer.find_duples("s1").unwrap();
        assert_eq!(
            duples.get_id("player.wetness:player.health").map(|o| o.len()),
            Some(7)
        );

        let report = analyzer.pattern_report("s1").unwrap();
        assert_eq!(report.snapshots_analyzed, 8);
        assert_eq!(report.patterns[0].count, 7);
        assert_eq!(report.correlations.len(), 1);
        assert!(report.correlations[0].coefficient < -0.99);
        assert!(report
            .to_markdown()
            .contains("`health` frequently changed with `wetness` (7 times)"));
    }

    #[test]
    fn test_compare_sessions() {
        let dir = tempdir().unwrap();
        let layout = LogLayout::new(dir.path());
        write_session(&layout, "s1", 1000.0, &declining());
        write_session(&layout, "s2", 2000.0, &[(100, 0), (50, 50), (10, 90)]);

        let result = analyzer(layout).compare_sessions("s1", "s2").unwrap();

        // 8 vs 3: top, left (4 vs 1), right (3 vs 1)
        assert_eq!(result.comparisons, 3);
        let central = result.central_patterns.unwrap();
        assert_eq!(
            central.get("player.health").and_then(|c| c.new.clone()),
            Some(json!(50))
        );
    }

    #[test]
    fn test_compare_sessions_temporal_mode() {
        let dir = tempdir().unwrap();
        let layout = LogLayout::new(dir.path());
        write_session(&layout, "s1", 1000.0, &[(100, 0)]);
        write_session(&layout, "s2", 1250.5, &[(90, 20)]);

        let temporal = Analyzer::new(
            SessionStore::new(layout.clone()),
            AnalysisConfig {
                temporal_mode: true,
                ..AnalysisConfig::default()
            },
        );
        let central = temporal
            .compare_sessions("s1", "s2")
            .unwrap()
            .central_patterns
            .unwrap();
        assert_eq!(central.time_difference, Some(TimeDifference::Seconds(250.5)));
        assert_eq!(central.len(), 2);

        let plain = analyzer(layout).compare_sessions("s1", "s2").unwrap();
        assert!(plain.central_patterns.unwrap().time_difference.is_none());
    }

    #[test]
    fn test_cross_level_comparison() {
        let dir = tempdir().unwrap();
        let layout = LogLayout::new(dir.path());
        write_session(&layout, "s1", 1000.0, &[(100, 0), (90, 20)]);
        atomic_write(
            &layout.exports_dir().join("s1_export.json"),
            json!({"session_id": "s1", "snapshots": []}).to_string().as_bytes(),
        )
        .unwrap();

        let analyzer = analyzer(layout);
        let ticks = analyzer.store().snapshot_ticks("s1").unwrap();

        let snap_a = EntityRef::snapshot("s1", ticks[0].clone());
        let snap_b = EntityRef::snapshot("s1", ticks[1].clone());
        let changes = analyzer.compare_entities(&snap_a, &snap_b).unwrap();
        assert!(changes.get("timestamp").is_some());
        assert!(changes.get("snapshot_time").is_some());

        let session = EntityRef::session("s1");
        let export = EntityRef::export("s1_export.json");
        let changes = analyzer.compare_entities(&session, &export).unwrap();
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["snapshots"]);

        let changes = analyzer.compare_entities(&snap_a, &session).unwrap();
        assert!(changes.get("snapshots").is_some());

        let missing = analyzer.compare_entities(&session, &EntityRef::export("gone.json"));
        assert!(matches!(missing, Err(EngineError::EntityNotFound(_))));
    }

    #[test]
    fn test_recent_report_respects_cancellation() {
        let dir = tempdir().unwrap();
        let layout = LogLayout::new(dir.path());
        write_session(&layout, "s1", 1000.0, &declining());

        let analyzer = analyzer(layout);
        let token = CancellationToken::new();
        token.cancel();

        assert!(matches!(
            analyzer.pattern_report_for_recent(5, &token),
            Err(EngineError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_recent_report_in_background() {
        let dir = tempdir().unwrap();
        let layout = LogLayout::new(dir.path());
        write_session(&layout, "s1", 1000.0, &declining());
        write_session(&layout, "s2", 2000.0, &declining());
        write_session(&layout, "s3", 3000.0, &declining());
        // No manifest, so not listed
        std::fs::create_dir_all(layout.session("broken").dir).unwrap();

        let config = AnalysisConfig {
            max_sessions: Some(2),
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(SessionStore::new(layout), config);

        let report = match analyzer.spawn_recent_report(10).join().await {
            TaskOutcome::Completed(report) => report,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(report.session_ids, vec!["s2", "s3"]);
        assert_eq!(report.snapshots_analyzed, 16);
        assert_eq!(report.patterns[0].count, 14);
    }
}
