//! # Where a run executes.

/// Execution context for work launched by the controllers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Launch {
    /// Spawned on the calling tokio runtime's async scheduler.
    ///
    /// The work closure is invoked immediately by the launching call; only the
    /// returned future runs in the background.
    #[default]
    Inline,

    /// Driven on a dedicated blocking worker thread (`spawn_blocking`) using the
    /// current runtime handle.
    ///
    /// Use when the work mixes async waits with CPU-heavy or blocking sections.
    Threaded,
}

impl Launch {
    /// Short label for events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Launch::Inline => "inline",
            Launch::Threaded => "threaded",
        }
    }
}
