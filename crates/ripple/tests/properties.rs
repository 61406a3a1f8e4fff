//! Property-based tests for graph construction, path mapping, and impact.
//!
//! Invariants that hold for any fact input:
//! - Every symbol node has exactly one `defines` edge from its file
//! - Rebuilding a repository from the same facts yields the same graph
//! - Mapping does not depend on the order of changed paths
//! - Node ids of any accepted repository id parse back unchanged
//! - Impact analysis is deterministic
//! - A callee defined in the caller's own file wins over other files

use std::collections::BTreeSet;

use proptest::prelude::*;
use ripple::{
    DependencyGraph, FactSheet, ImpactConfig, NodeId, NodeKind, Relation, RepositoryId,
    build_graph, compute_impact, map_changed_files,
};

const NAMES: &[&str] = &["connect", "login", "save", "load", "render", "validate"];

fn repo() -> RepositoryId {
    RepositoryId::new("svc").expect("valid repository id")
}

/// One file's facts: defined function indices and (caller, callee) index pairs.
fn sheet_strategy(index: usize) -> impl Strategy<Value = FactSheet> {
    (
        prop::collection::btree_set(0..NAMES.len(), 1..4),
        prop::collection::vec((0..NAMES.len(), 0..NAMES.len()), 0..6),
        prop::option::of(0..NAMES.len()),
    )
        .prop_map(move |(functions, calls, class)| {
            let functions: Vec<&str> = functions.into_iter().map(|i| NAMES[i]).collect();
            let mut sheet = FactSheet::new(format!("pkg/mod{index}.py"));
            for name in &functions {
                sheet = sheet.with_function(*name);
            }
            if let Some(class) = class {
                sheet = sheet.with_class(format!("{}Model", NAMES[class]));
            }
            for (caller, callee) in calls {
                let caller = functions[caller % functions.len()];
                sheet = sheet.with_call(caller, NAMES[callee]);
            }
            sheet
        })
}

fn sheets_strategy() -> impl Strategy<Value = Vec<FactSheet>> {
    (1usize..5).prop_flat_map(|count| {
        (0..count)
            .map(sheet_strategy)
            .collect::<Vec<_>>()
    })
}

/// Sheets plus changed paths (some unmappable) and a shuffled copy of them.
fn sheets_with_paths_strategy() -> impl Strategy<Value = (Vec<FactSheet>, Vec<String>, Vec<String>)> {
    (sheets_strategy(), prop::collection::vec(0usize..6, 1..5)).prop_flat_map(|(sheets, picks)| {
        let paths: Vec<String> = picks
            .iter()
            .map(|&i| {
                sheets
                    .get(i)
                    .map_or_else(|| format!("docs/page{i}.md"), |sheet| sheet.file_path.clone())
            })
            .collect();
        (Just(sheets), Just(paths.clone()), Just(paths).prop_shuffle())
    })
}

/// Short strings dense in separator characters, plus arbitrary text.
fn repository_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z:,@]{0,6}",
        Just("external".to_string()),
        "external[a-z:]{0,3}",
        any::<String>(),
    ]
}

fn edge_set(graph: &DependencyGraph) -> BTreeSet<(NodeId, NodeId, Relation)> {
    graph
        .edges()
        .map(|(source, target, relation)| (source.id(), target.id(), relation))
        .collect()
}

fn built(sheets: &[FactSheet]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    build_graph(&mut graph, &repo(), sheets);
    graph
}

proptest! {
    #[test]
    fn every_symbol_has_one_defining_file(sheets in sheets_strategy()) {
        let graph = built(&sheets);

        for (idx, node) in graph.nodes() {
            let defines = graph.predecessors(idx, Some(Relation::Defines));
            match node.kind() {
                NodeKind::Function | NodeKind::Class => {
                    prop_assert_eq!(defines.len(), 1, "{} defined {} times", node.id(), defines.len());
                    let file = graph.node_at(defines[0].0).map(|n| n.id());
                    prop_assert_eq!(
                        file,
                        node.file_path().map(|path| NodeId::file(&repo(), path))
                    );
                }
                NodeKind::File | NodeKind::External => prop_assert!(defines.is_empty()),
            }
        }
    }

    #[test]
    fn rebuilding_same_facts_is_idempotent(sheets in sheets_strategy()) {
        let mut graph = built(&sheets);
        let nodes = graph.node_count();
        let edges = edge_set(&graph);

        build_graph(&mut graph, &repo(), &sheets);

        prop_assert_eq!(graph.node_count(), nodes);
        prop_assert_eq!(edge_set(&graph), edges);
    }

    #[test]
    fn mapping_ignores_changed_path_order(
        (sheets, paths, shuffled) in sheets_with_paths_strategy(),
    ) {
        let graph = built(&sheets);

        let given = map_changed_files(&graph, None, &paths);
        let permuted = map_changed_files(&graph, None, &shuffled);

        prop_assert_eq!(given.nodes, permuted.nodes);
        prop_assert_eq!(given.unmapped, permuted.unmapped);
    }

    #[test]
    fn valid_repository_ids_round_trip_through_node_ids(raw in repository_text_strategy()) {
        match RepositoryId::new(raw.as_str()) {
            Ok(repository) => {
                for id in [
                    NodeId::file(&repository, "pkg/a.py"),
                    NodeId::function(&repository, "pkg/a.py", "Job.run"),
                    NodeId::class(&repository, "pkg/a.py", "Job"),
                ] {
                    let parsed: NodeId = id.to_string().parse().map_err(TestCaseError::fail)?;
                    prop_assert_eq!(&parsed, &id);
                    prop_assert_eq!(parsed.repository(), Some(&repository));
                }
            }
            Err(_) => prop_assert!(
                raw.is_empty()
                    || raw == "external"
                    || raw.ends_with(':')
                    || ["::", ",", "@"].iter().any(|bad| raw.contains(bad)),
                "rejected unambiguous repository id {:?}",
                raw
            ),
        }
    }

    #[test]
    fn impact_is_deterministic(sheets in sheets_strategy(), changed in 0..NAMES.len()) {
        let graph = built(&sheets);
        let rebuilt = built(&sheets);
        let ids: Vec<NodeId> = sheets
            .iter()
            .filter(|sheet| sheet.functions.iter().any(|f| f == NAMES[changed]))
            .map(|sheet| NodeId::function(&repo(), sheet.file_path.as_str(), NAMES[changed]))
            .collect();
        let config = ImpactConfig::default();

        let first = compute_impact(&graph, &ids, &[], &config);
        let second = compute_impact(&graph, &ids, &[], &config);
        let third = compute_impact(&rebuilt, &ids, &[], &config);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &third);
        for record in first.direct.iter().chain(&first.indirect) {
            prop_assert_ne!(&record.source, &record.affected);
        }
    }

    #[test]
    fn same_file_definition_takes_precedence(others in 1usize..4) {
        let mut sheets = vec![
            FactSheet::new("core/local.py")
                .with_function("entry")
                .with_function("helper")
                .with_call("entry", "helper"),
        ];
        for i in 0..others {
            sheets.push(FactSheet::new(format!("other/dup{i}.py")).with_function("helper"));
        }

        let graph = built(&sheets);

        let entry = NodeId::function(&repo(), "core/local.py", "entry");
        prop_assert!(graph.has_edge(
            &entry,
            &NodeId::function(&repo(), "core/local.py", "helper"),
            Relation::Calls,
        ));
        for i in 0..others {
            let path = format!("other/dup{i}.py");
            prop_assert!(!graph.has_edge(
                &entry,
                &NodeId::function(&repo(), path.as_str(), "helper"),
                Relation::Calls,
            ));
        }
    }
}
