//! Read model trait for query-side views.

/// A view that answers queries from data folded out of the journal.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of top-level entries (orders, agents) held by the view.
    fn count(&self) -> usize;
}
