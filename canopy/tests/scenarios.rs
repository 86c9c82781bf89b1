//! End-to-end diffs over small trees.

use canopy::indextree::NodeId;
use canopy::{
    CancellationToken, DiffError, Edit, EditKind, Forest, ForestComparer, Match, MatchingConfig,
    NodeData, TreeComparer, diff_batch, diff_trees, diff_trees_with_match,
};
use facet_testhelpers::test;
use std::cell::Cell;
use std::sync::mpsc;

type TestForest = Forest<&'static str, &'static str>;

/// Add a root with one leaf child per value.
fn flat(forest: &mut TestForest, values: &[&'static str]) -> (NodeId, Vec<NodeId>) {
    let root = forest.add_root(NodeData::new("root", ""));
    let leaves = values
        .iter()
        .map(|&v| forest.add_child(root, NodeData::new("leaf", v)))
        .collect();
    (root, leaves)
}

fn diff(forest: &TestForest, old: NodeId, new: NodeId) -> (Vec<Edit<NodeId>>, Match<NodeId>) {
    diff_trees_with_match(
        &forest.comparer(),
        old,
        new,
        &MatchingConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap()
}

#[test]
fn test_identical_sequences() {
    let mut forest = TestForest::new();
    let (old, a) = flat(&mut forest, &["a", "b", "c"]);
    let (new, b) = flat(&mut forest, &["a", "b", "c"]);

    let (ops, matching) = diff(&forest, old, new);

    assert!(ops.is_empty(), "expected no edits, got {:?}", ops);
    for (o, n) in a.iter().zip(&b) {
        assert!(matching.contains(*o, *n));
    }
    // Three leaves plus the roots.
    assert_eq!(matching.len(), 4);
}

#[test]
fn test_removed_element() {
    let mut forest = TestForest::new();
    let (old, a) = flat(&mut forest, &["a", "b", "c"]);
    let (new, b) = flat(&mut forest, &["a", "c"]);

    let (ops, matching) = diff(&forest, old, new);

    assert!(matching.contains(a[0], b[0]));
    assert!(matching.contains(a[2], b[1]));
    assert_eq!(ops, vec![Edit::Delete { old: a[1] }]);
}

#[test]
fn test_inserted_element() {
    let mut forest = TestForest::new();
    let (old, a) = flat(&mut forest, &["a", "c"]);
    let (new, b) = flat(&mut forest, &["a", "b", "c"]);

    let (ops, matching) = diff(&forest, old, new);

    assert!(matching.contains(a[0], b[0]));
    assert!(matching.contains(a[1], b[2]));
    assert_eq!(ops, vec![Edit::Insert { new: b[1] }]);
}

#[test]
fn test_swapped_siblings_reorder() {
    let mut forest = TestForest::new();
    let (old, a) = flat(&mut forest, &["a", "b"]);
    let (new, b) = flat(&mut forest, &["b", "a"]);

    let (ops, matching) = diff(&forest, old, new);

    assert!(matching.contains(a[0], b[1]));
    assert!(matching.contains(a[1], b[0]));
    assert_eq!(ops.len(), 1, "got {:?}", ops);
    assert_eq!(ops[0].kind(), EditKind::Reorder);
}

#[test]
fn test_changed_statement_is_one_update() {
    let mut forest = TestForest::new();
    let old = forest.add_root(NodeData::new("block", ""));
    let x = forest.add_child(old, NodeData::new("decl", "int i = 1;").with_span(0..10));
    let new = forest.add_root(NodeData::new("block", ""));
    let x2 = forest.add_child(new, NodeData::new("decl", "int i = 2;").with_span(0..10));

    let (ops, _) = diff(&forest, old, new);

    assert_eq!(ops, vec![Edit::Update { old: x, new: x2 }]);
}

#[test]
fn test_reorder_deep_in_the_tree() {
    // fn -> [params, body -> [s1, s2, s3]]  with body reordered to [s3, s1, s2]
    let mut forest = TestForest::new();
    let old = forest.add_root(NodeData::new("fn", "main"));
    forest.add_child(old, NodeData::new("params", ""));
    let body = forest.add_child(old, NodeData::new("body", ""));
    let s1 = forest.add_child(body, NodeData::new("stmt", "s1"));
    let s2 = forest.add_child(body, NodeData::new("stmt", "s2"));
    let s3 = forest.add_child(body, NodeData::new("stmt", "s3"));

    let new = forest.add_root(NodeData::new("fn", "main"));
    forest.add_child(new, NodeData::new("params", ""));
    let body2 = forest.add_child(new, NodeData::new("body", ""));
    let s3b = forest.add_child(body2, NodeData::new("stmt", "s3"));
    let s1b = forest.add_child(body2, NodeData::new("stmt", "s1"));
    let s2b = forest.add_child(body2, NodeData::new("stmt", "s2"));

    let (ops, matching) = diff(&forest, old, new);

    assert!(matching.contains(s1, s1b));
    assert!(matching.contains(s2, s2b));
    assert_eq!(ops, vec![Edit::Reorder { old: s3, new: s3b }]);
}

#[test]
fn test_edits_render_with_spans() {
    let mut forest = TestForest::new();
    let old = forest.add_root(NodeData::new("file", ""));
    forest.add_child(old, NodeData::new("item", "struct A;").with_span(0..9));
    let new = forest.add_root(NodeData::new("file", ""));

    let comparer = forest.comparer();
    let ops = diff_trees(
        &comparer,
        old,
        new,
        &MatchingConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    let rendered: Vec<String> = ops
        .iter()
        .map(|op| op.display(&comparer).to_string())
        .collect();
    assert_eq!(rendered, vec!["[Delete] \"item\"@0..9".to_string()]);
}

#[test]
fn test_wide_level_falls_back_to_index_pairing() {
    let values: Vec<&'static str> = vec!["v"; 64];
    let mut forest = TestForest::new();
    let (old, a) = flat(&mut forest, &values);
    let (new, b) = flat(&mut forest, &values[..63]);

    // 65 × 64 cells exceeds the limit: no LCS for the root level.
    let config = MatchingConfig {
        max_alignment_cells: 1000,
        ..MatchingConfig::default()
    };
    let (ops, matching) = diff_trees_with_match(
        &forest.comparer(),
        old,
        new,
        &config,
        &CancellationToken::new(),
    )
    .unwrap();

    for (o, n) in a.iter().zip(&b) {
        assert!(matching.contains(*o, *n));
    }
    assert_eq!(ops, vec![Edit::Delete { old: a[63] }]);
}

#[test]
fn test_deep_trees_do_not_overflow() {
    let depth = 20_000;
    let mut forest: Forest<u8, u32> = Forest::new();
    let old = forest.add_root(NodeData::new(0, 0));
    let new = forest.add_root(NodeData::new(0, 0));
    let (mut old_tip, mut new_tip) = (old, new);
    for level in 1..depth {
        old_tip = forest.add_child(old_tip, NodeData::new(1, level));
        new_tip = forest.add_child(new_tip, NodeData::new(1, level));
    }
    let leaf = forest.add_child(new_tip, NodeData::new(2, 0));

    let ops = diff_trees(
        &forest.comparer(),
        old,
        new,
        &MatchingConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(ops, vec![Edit::Insert { new: leaf }]);
}

#[test]
fn test_batch_keeps_input_order() {
    let mut forest = TestForest::new();
    let (old1, _) = flat(&mut forest, &["a"]);
    let (new1, b1) = flat(&mut forest, &["a", "b"]);
    let (old2, a2) = flat(&mut forest, &["x", "y"]);
    let (new2, _) = flat(&mut forest, &["x"]);
    let (old3, _) = flat(&mut forest, &["same"]);
    let (new3, _) = flat(&mut forest, &["same"]);

    let comparer = forest.comparer();
    let results = diff_batch(
        &comparer,
        &[(old1, new1), (old2, new2), (old3, new3)],
        &MatchingConfig::default(),
        &CancellationToken::new(),
    );

    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Ok(vec![Edit::Insert { new: b1[1] }]));
    assert_eq!(results[1], Ok(vec![Edit::Delete { old: a2[1] }]));
    assert_eq!(results[2], Ok(vec![]));
}

#[test]
fn test_cancelled_batch_yields_nothing_usable() {
    let mut forest = TestForest::new();
    let (old, _) = flat(&mut forest, &["a"]);
    let (new, _) = flat(&mut forest, &["b"]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let results = diff_batch(
        &forest.comparer(),
        &[(old, new), (old, new)],
        &MatchingConfig::default(),
        &cancel,
    );

    assert!(results.iter().all(|r| *r == Err(DiffError::Cancelled)));
}

/// Blocks inside the first `distance` call until another thread has
/// cancelled, so the cancellation lands while an LCS table is being filled.
struct PausingComparer<'f> {
    inner: ForestComparer<'f, u8, u32>,
    paused: Cell<bool>,
    started: mpsc::Sender<()>,
    resume: mpsc::Receiver<()>,
}

impl TreeComparer for PausingComparer<'_> {
    type Node = NodeId;
    type Label = u8;

    fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.children(node)
    }

    fn label(&self, node: NodeId) -> u8 {
        self.inner.label(node)
    }

    fn trees_equal(&self, old: NodeId, new: NodeId) -> bool {
        self.inner.trees_equal(old, new)
    }

    fn values_equal(&self, old: NodeId, new: NodeId) -> bool {
        self.inner.values_equal(old, new)
    }

    fn distance(&self, old: NodeId, new: NodeId) -> f64 {
        if !self.paused.replace(true) {
            self.started.send(()).unwrap();
            self.resume.recv().unwrap();
        }
        self.inner.distance(old, new)
    }
}

#[test]
fn test_cancel_from_another_thread() {
    // No child is identical, so the gap between anchors is the whole
    // 200 × 200 level and is aligned with `distance`.
    let mut forest: Forest<u8, u32> = Forest::new();
    let old = forest.add_root(NodeData::new(0, 0));
    let new = forest.add_root(NodeData::new(0, 0));
    for i in 0..200 {
        forest.add_child(old, NodeData::new(1, i));
        forest.add_child(new, NodeData::new(1, i + 1_000));
    }

    let (started_tx, started_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel();
    let comparer = PausingComparer {
        inner: forest.comparer(),
        paused: Cell::new(false),
        started: started_tx,
        resume: resume_rx,
    };

    let cancel = CancellationToken::new();
    let remote = cancel.clone();
    std::thread::scope(|scope| {
        scope.spawn(move || {
            started_rx.recv().unwrap();
            remote.cancel();
            resume_tx.send(()).unwrap();
        });

        let result = diff_trees(&comparer, old, new, &MatchingConfig::default(), &cancel);
        assert_eq!(result, Err(DiffError::Cancelled));
    });
    assert!(comparer.paused.get(), "the diff never reached the alignment");
}
