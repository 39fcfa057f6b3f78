// ── trustmem Atoms: Collaborator Traits ─────────────────────────────────────
// The embedding and text-generation services are opaque collaborators. The
// engine only calls them through these traits; timeouts, retries and
// backpressure are the implementor's business.

use super::error::EngineResult;

/// `text → fixed-length vector`. Must be deterministic for identical input.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> EngineResult<Vec<f32>>;
}

/// `(query, ranked memory texts) → candidate answer`.
/// `None` (or an empty string) means "no candidate" and is not a gate failure.
pub trait Generator: Send + Sync {
    fn generate(&self, query: &str, memories: &[String]) -> Option<String>;
}
