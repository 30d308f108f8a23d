//! Depth-first rewriting over `TargetExpr` trees.
//!
//! A rewriter overrides [`ExprRewriter::rewrite`] to intercept the nodes it
//! cares about and falls through to [`ExprRewriter::rewrite_children`] for
//! everything else. Because `map_children` hands back the original `Arc` when
//! nothing changed, an intercepting rewriter that touches only a few nodes
//! leaves the rest of the tree shared with the input.

use std::sync::Arc;

use super::TargetExpr;

pub trait ExprRewriter {
    type Error;

    /// Rewrite one node. The default recurses into children; implementors
    /// intercept the node kinds they handle and delegate the rest here.
    fn rewrite(&mut self, expr: &Arc<TargetExpr>) -> Result<Arc<TargetExpr>, Self::Error> {
        self.rewrite_children(expr)
    }

    /// Rewrite every child of `expr`, rebuilding only when a child changed.
    fn rewrite_children(&mut self, expr: &Arc<TargetExpr>) -> Result<Arc<TargetExpr>, Self::Error> {
        expr.map_children(|child| self.rewrite(child))
    }
}
