//! Run-once gate tied to document readiness.

/// `document.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentReadiness {
    Loading,
    Interactive,
    Complete,
}

impl DocumentReadiness {
    pub fn is_ready(self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Runs an initialiser exactly once: immediately if the document is ready,
/// otherwise on the first [`ReadyGate::content_loaded`].
pub struct ReadyGate {
    pending: Option<Box<dyn FnOnce() + Send>>,
}

impl ReadyGate {
    pub fn new(readiness: DocumentReadiness, init: impl FnOnce() + Send + 'static) -> Self {
        let mut gate = Self {
            pending: Some(Box::new(init)),
        };
        if readiness.is_ready() {
            gate.fire();
        }
        gate
    }

    /// The "content loaded" signal. Returns true if this call ran the
    /// initialiser.
    pub fn content_loaded(&mut self) -> bool {
        self.fire()
    }

    pub fn has_fired(&self) -> bool {
        self.pending.is_none()
    }

    fn fire(&mut self) -> bool {
        match self.pending.take() {
            Some(init) => {
                init();
                true
            }
            None => false,
        }
    }
}
