//! # Ripple: Change Impact Analysis over Static Dependency Graphs
//!
//! Ripple extracts symbol-level facts (definitions, imports, calls) from source
//! files with tree-sitter, merges them into one typed dependency graph across
//! repositories, and answers the question "what does this change touch?".
//!
//! ## Design Philosophy
//!
//! - **Heuristic, not semantic** - Calls are resolved by name in a fixed,
//!   auditable order; there is no type inference
//! - **Degrade, don't fail** - Unparsable files, unresolved calls, and unmapped
//!   paths produce partial, explainable results
//! - **Explicit state** - A [`Session`] owns one graph and its configuration;
//!   caches are values, never globals
//!
//! ## Pipeline
//!
//! ```text
//! source bytes ──extract──▶ FactSheet ──build_graph──▶ DependencyGraph
//!                                                         │
//!        changed paths ──map_changed_files──▶ NodeIds ────┤
//!        diff hunks ──detector──▶ BreakingChangeRecords ──┤
//!                                                         ▼
//!                                              compute_impact ──▶ ImpactReport
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use ripple::{FactSheet, FileChange, RepositoryId, Session};
//!
//! let mut session = Session::new();
//! let repo = RepositoryId::new("api")?;
//! session.build_graph(
//!     &repo,
//!     &[
//!         FactSheet::new("auth.py").with_function("login").with_call("login", "db.connect"),
//!         FactSheet::new("db.py").with_function("connect"),
//!     ],
//! );
//!
//! let report = session.analyze(&[FileChange::modified("db.py")], Some(&repo), Vec::new())?;
//! println!("{report}");
//! # Ok::<(), ripple::Error>(())
//! ```

pub mod breaking;
pub mod changes;
pub mod config;
mod error;
pub mod extract;
pub mod graph;
pub mod impact;
pub mod store;
mod types;

pub use breaking::{
    AnnotationCache, BreakingChangeDetector, BreakingChangeRecord, CachedDetector, Location,
    RuleBasedDetector, annotate, detect_openapi_drift, map_location,
};
pub use changes::{ChangeMapping, PathMatchStrategy, map_changed_files};
pub use config::{AnalysisConfig, BreakingConfig};
pub use error::{Error, ExtractionError, ExtractionErrorKind, Result};
pub use extract::{Extraction, extract_facts, extract_repository};
pub use graph::{
    BuildStats, Confidence, CrossRepoStats, DependencyGraph, GraphDelta, GraphSnapshot, Node,
    NodeId, NodeKind, Relation, build_graph, link_cross_repository,
};
pub use impact::{ImpactConfig, ImpactRecord, ImpactReport, compute_impact};
pub use store::{SnapshotKey, SnapshotStore, SnapshotSummary};
pub use types::{CallRecord, ChangeStatus, FactSheet, FileChange, Language, RepositoryId, Severity};

use tracing::{debug, info};

/// An analysis session: one dependency graph plus the settings used on it.
///
/// The graph does not exist until the first [`Session::build_graph`] (or
/// [`Session::load_snapshot`]); queries before that return
/// [`Error::MissingGraph`].
///
/// Once [`Session::link_cross_repository`] has run, later builds re-run it, so
/// candidate cross-repository edges survive a repository rebuild.
#[derive(Debug)]
pub struct Session {
    graph: Option<DependencyGraph>,
    config: AnalysisConfig,
    detector: CachedDetector<RuleBasedDetector>,
    cross_repo_linked: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::with_config(AnalysisConfig::default())
    }
}

impl Session {
    /// Create a session with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with the given settings.
    #[must_use]
    pub fn with_config(config: AnalysisConfig) -> Self {
        let detector = CachedDetector::new(RuleBasedDetector::new(config.breaking.clone()));
        Self {
            graph: None,
            config,
            detector,
            cross_repo_linked: false,
        }
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The graph, if one has been built.
    #[must_use]
    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }

    fn require_graph(&self) -> Result<&DependencyGraph> {
        self.graph.as_ref().ok_or(Error::MissingGraph)
    }

    /// Add (or replace) a repository's contribution to the graph.
    pub fn build_graph(&mut self, repository: &RepositoryId, sheets: &[FactSheet]) -> GraphDelta {
        let graph = self.graph.get_or_insert_with(DependencyGraph::new);
        let delta = graph::build_graph(graph, repository, sheets);
        if self.cross_repo_linked {
            debug!(repository = %repository, "relinking repositories after rebuild");
            graph::link_cross_repository(graph);
        }
        delta
    }

    /// Extract facts from raw files and build the repository from them.
    ///
    /// Returns the build delta plus every per-file extraction diagnostic.
    pub fn build_repository<P, C>(
        &mut self,
        repository: &RepositoryId,
        files: &[(P, C)],
    ) -> (GraphDelta, Vec<ExtractionError>)
    where
        P: AsRef<str> + Sync,
        C: AsRef<[u8]> + Sync,
    {
        let (sheets, diagnostics): (Vec<FactSheet>, Vec<Vec<ExtractionError>>) =
            extract_repository(files)
                .into_iter()
                .map(|e| (e.sheet, e.diagnostics))
                .unzip();
        let delta = self.build_graph(repository, &sheets);
        (delta, diagnostics.into_iter().flatten().collect())
    }

    /// Add candidate `cross_repo_call` edges between all built repositories.
    pub fn link_cross_repository(&mut self) -> Result<CrossRepoStats> {
        let graph = self.graph.as_mut().ok_or(Error::MissingGraph)?;
        let stats = graph::link_cross_repository(graph);
        self.cross_repo_linked = true;
        Ok(stats)
    }

    /// Map changed paths onto graph nodes.
    pub fn map_changed_files<S: AsRef<str>>(
        &self,
        repository: Option<&RepositoryId>,
        paths: &[S],
    ) -> Result<ChangeMapping> {
        Ok(changes::map_changed_files(self.require_graph()?, repository, paths))
    }

    /// Compute impacts of `changed` nodes.
    pub fn compute_impact(
        &self,
        changed: &[NodeId],
        breaking: &[BreakingChangeRecord],
    ) -> Result<ImpactReport> {
        Ok(impact::compute_impact(
            self.require_graph()?,
            changed,
            breaking,
            &self.config.impact,
        ))
    }

    /// Run the rule-based detector over `changes`, with per-patch caching.
    #[must_use]
    pub fn detect_breaking_changes(&self, changes: &[FileChange]) -> Vec<BreakingChangeRecord> {
        changes
            .iter()
            .flat_map(|change| self.detector.detect(change))
            .collect()
    }

    /// Full pipeline for one change set.
    ///
    /// Detects field-level breaking changes in the patches, adds the
    /// externally produced `breaking` findings, maps every finding onto the
    /// graph, maps the changed paths, and computes impacts.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingGraph`] before any build
    /// - [`Error::NoChangesResolved`] if `changes` is non-empty but none of
    ///   its paths match a node
    pub fn analyze(
        &self,
        changes: &[FileChange],
        repository: Option<&RepositoryId>,
        breaking: Vec<BreakingChangeRecord>,
    ) -> Result<ImpactReport> {
        let graph = self.require_graph()?;

        let mut findings = self.detect_breaking_changes(changes);
        findings.extend(breaking);
        let findings = annotate(graph, findings);

        let paths: Vec<&str> = changes.iter().map(|c| c.file_path.as_str()).collect();
        let mapping = changes::map_changed_files(graph, repository, &paths);
        if !changes.is_empty() && mapping.is_empty() {
            return Err(Error::NoChangesResolved {
                paths: mapping.unmapped,
            });
        }

        let report = impact::compute_impact(graph, &mapping.nodes, &findings, &self.config.impact);
        info!(
            changed_files = changes.len(),
            changed_nodes = mapping.nodes.len(),
            unmapped = mapping.unmapped.len(),
            impacts = report.total(),
            breaking = report.breaking_changes.len(),
            "analyzed change set"
        );
        Ok(report)
    }

    /// Persist the current graph under `key`.
    pub fn save_snapshot(&self, store: &SnapshotStore, key: &SnapshotKey) -> Result<()> {
        store.save(key, &self.require_graph()?.to_snapshot())
    }

    /// Replace the graph with the snapshot stored under `key`.
    ///
    /// Returns `false` (and leaves the session untouched) if no snapshot exists.
    /// A snapshot holding `cross_repo_call` edges was linked, so later builds
    /// re-link as they would in the session that saved it.
    pub fn load_snapshot(&mut self, store: &SnapshotStore, key: &SnapshotKey) -> Result<bool> {
        let Some(snapshot) = store.load(key)? else {
            return Ok(false);
        };
        self.graph = Some(DependencyGraph::from_snapshot(&snapshot)?);
        self.cross_repo_linked = snapshot
            .edges
            .iter()
            .any(|edge| edge.relation == Relation::CrossRepoCall);
        Ok(true)
    }

    /// Discard the graph and cached findings.
    pub fn reset(&mut self) {
        self.graph = None;
        self.cross_repo_linked = false;
        self.detector.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepositoryId {
        RepositoryId::new("api").expect("valid repository id")
    }

    fn session() -> Session {
        let mut session = Session::new();
        session.build_graph(
            &repo(),
            &[
                FactSheet::new("auth.py")
                    .with_function("login")
                    .with_call("login", "db.connect"),
                FactSheet::new("db.py").with_function("connect"),
            ],
        );
        session
    }

    #[test]
    fn queries_before_build_report_missing_graph() {
        let session = Session::new();

        assert!(matches!(session.compute_impact(&[], &[]), Err(Error::MissingGraph)));
        assert!(matches!(
            session.map_changed_files::<&str>(None, &[]),
            Err(Error::MissingGraph)
        ));
        assert!(matches!(session.analyze(&[], None, Vec::new()), Err(Error::MissingGraph)));
    }

    #[test]
    fn analyze_reports_direct_impact() {
        let session = session();

        let report = session
            .analyze(&[FileChange::modified("db.py")], Some(&repo()), Vec::new())
            .expect("analysis");

        assert_eq!(report.direct.len(), 1);
        assert_eq!(report.direct[0].affected, NodeId::function(&repo(), "auth.py", "login"));
    }

    #[test]
    fn analyze_with_no_changes_is_empty() {
        let report = session().analyze(&[], None, Vec::new()).expect("analysis");

        assert!(report.is_empty());
    }

    #[test]
    fn analyze_rejects_change_set_that_maps_to_nothing() {
        let result = session().analyze(&[FileChange::modified("docs/README.md")], None, Vec::new());

        match result {
            Err(Error::NoChangesResolved { paths }) => assert_eq!(paths, vec!["docs/README.md"]),
            other => panic!("expected NoChangesResolved, got {other:?}"),
        }
    }

    #[test]
    fn analyze_detects_and_maps_field_removal() {
        let mut session = Session::new();
        session.build_graph(&repo(), &[FactSheet::new("models.py").with_class("User")]);
        let change =
            FileChange::modified("models.py").with_patch("-    email = Column(String(120))\n");

        let report = session.analyze(&[change], None, Vec::new()).expect("analysis");

        assert_eq!(report.breaking_changes.len(), 1);
        let finding = &report.breaking_changes[0];
        assert_eq!(finding.change_type, "field_removed");
        assert_eq!(finding.location, Location::Node(NodeId::file(&repo(), "models.py")));
        assert_eq!(report.location_boosts.get("api::file::models.py"), Some(&5));
    }

    fn gateway_sheets() -> [FactSheet; 1] {
        [FactSheet::new("routes.py")
            .with_function("handle")
            .with_call("handle", "client.validate_token")]
    }

    fn linked_session(gateway: &RepositoryId, auth: &RepositoryId) -> Session {
        let mut session = Session::new();
        session.build_graph(gateway, &gateway_sheets());
        session.build_graph(auth, &[FactSheet::new("service.py").with_function("validate_token")]);
        session.link_cross_repository().expect("link");
        session
    }

    fn has_cross_repo_edge(session: &Session, gateway: &RepositoryId, auth: &RepositoryId) -> bool {
        session.graph().expect("graph").has_edge(
            &NodeId::function(gateway, "routes.py", "handle"),
            &NodeId::function(auth, "service.py", "validate_token"),
            Relation::CrossRepoCall,
        )
    }

    #[test]
    fn rebuild_after_linking_keeps_cross_repository_edges() {
        let gateway = RepositoryId::new("gateway").expect("valid repository id");
        let auth = RepositoryId::new("auth").expect("valid repository id");
        let mut session = linked_session(&gateway, &auth);

        session.build_graph(&gateway, &gateway_sheets());

        assert!(has_cross_repo_edge(&session, &gateway, &auth));
    }

    #[test]
    fn rebuild_after_loading_linked_snapshot_keeps_cross_repository_edges() {
        let gateway = RepositoryId::new("gateway").expect("valid repository id");
        let auth = RepositoryId::new("auth").expect("valid repository id");
        let store = SnapshotStore::open_in_memory().expect("store");
        let key: SnapshotKey = "auth@a1,gateway@g1".parse().expect("valid key");
        linked_session(&gateway, &auth)
            .save_snapshot(&store, &key)
            .expect("save");

        let mut restored = Session::new();
        assert!(restored.load_snapshot(&store, &key).expect("load"));
        restored.build_graph(&gateway, &gateway_sheets());

        assert!(has_cross_repo_edge(&restored, &gateway, &auth));
    }

    #[test]
    fn rebuild_after_loading_unlinked_snapshot_adds_no_cross_repository_edges() {
        let gateway = RepositoryId::new("gateway").expect("valid repository id");
        let auth = RepositoryId::new("auth").expect("valid repository id");
        let store = SnapshotStore::open_in_memory().expect("store");
        let key: SnapshotKey = "auth@a1,gateway@g1".parse().expect("valid key");
        let mut writer = Session::new();
        writer.build_graph(&gateway, &gateway_sheets());
        writer.build_graph(&auth, &[FactSheet::new("service.py").with_function("validate_token")]);
        writer.save_snapshot(&store, &key).expect("save");

        let mut restored = Session::new();
        assert!(restored.load_snapshot(&store, &key).expect("load"));
        restored.build_graph(&gateway, &gateway_sheets());

        assert!(!has_cross_repo_edge(&restored, &gateway, &auth));
    }

    #[test]
    fn reset_discards_graph() {
        let mut session = session();

        session.reset();

        assert!(session.graph().is_none());
    }

    #[test]
    fn snapshot_round_trip_through_store() {
        let store = SnapshotStore::open_in_memory().expect("store");
        let key: SnapshotKey = "api@abc123".parse().expect("valid key");
        let original = session();
        original.save_snapshot(&store, &key).expect("save");

        let mut restored = Session::new();
        assert!(restored.load_snapshot(&store, &key).expect("load"));
        assert!(!restored
            .load_snapshot(&store, &"api@other".parse().expect("valid key"))
            .expect("load missing"));

        assert_eq!(
            restored.graph().map(DependencyGraph::to_snapshot),
            original.graph().map(DependencyGraph::to_snapshot)
        );
    }
}
