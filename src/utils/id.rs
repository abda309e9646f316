use std::fmt;
use std::sync::Arc;

/// Fallback id source for re-serialized parts that have no original id to reuse.
#[derive(Clone)]
pub struct IdGenerator {
    generate: Arc<dyn Fn() -> String + Send + Sync>,
}

impl IdGenerator {
    /// uuid v4 (simple form) behind an optional prefix.
    pub fn uuid(prefix: Option<String>) -> Self {
        let prefix = prefix.unwrap_or_default();
        Self::from_fn(move || format!("{}{}", prefix, uuid::Uuid::new_v4().simple()))
    }

    pub fn from_fn(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            generate: Arc::new(f),
        }
    }

    pub fn next_id(&self) -> String {
        (self.generate)()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::uuid(None)
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}
