//! Logical-order labels for concurrently executing work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A node in the tree of spawned work, capturing where in *program* order a
/// concurrent unit was created.
///
/// Contexts carry identity only, no ownership of work: cloning a context
/// yields another handle to the same node. Each per-repo procedure receives a
/// context chained from its caller's via [`SchedulingContext::child`], and
/// every log line it emits is tagged with [`SchedulingContext::label`] so an
/// offline pass ([`crate::sched::replay`]) can re-sort interleaved concurrent
/// output into the order the workflow code was written in.
#[derive(Clone)]
pub struct SchedulingContext {
    node: Arc<ContextNode>,
}

struct ContextNode {
    parent: Option<Arc<ContextNode>>,
    ordinal: u64,
    next_child: AtomicU64,
}

impl SchedulingContext {
    /// A fresh root context for one workflow invocation.
    pub fn new() -> Self {
        SchedulingContext {
            node: Arc::new(ContextNode {
                parent: None,
                ordinal: 0,
                next_child: AtomicU64::new(0),
            }),
        }
    }

    /// Derive a child context. Children are numbered in creation order, which
    /// is the tie-breaker that lets the replay pass order siblings.
    pub fn child(&self) -> Self {
        let ordinal = self.node.next_child.fetch_add(1, Ordering::Relaxed);
        SchedulingContext {
            node: Arc::new(ContextNode {
                parent: Some(Arc::clone(&self.node)),
                ordinal,
                next_child: AtomicU64::new(0),
            }),
        }
    }

    /// The dotted ordinal path from the root, e.g. `"0.2.1"`.
    ///
    /// Used purely for log correlation.
    pub fn label(&self) -> String {
        let mut path = Vec::new();
        let mut cursor = Some(&self.node);
        while let Some(node) = cursor {
            path.push(node.ordinal);
            cursor = node.parent.as_ref();
        }
        path.reverse();
        path.iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Default for SchedulingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchedulingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulingContext")
            .field("label", &self.label())
            .finish()
    }
}

impl std::fmt::Display for SchedulingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}
