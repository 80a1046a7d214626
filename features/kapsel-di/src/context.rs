use std::cell::RefCell;

use crate::{errors::ScopeError, types::InstanceKey};

/// Bookkeeping of one in-flight construction
struct Frame {
    key: InstanceKey,
    /// Deepest placement reported by the dependencies consumed so far
    depth: usize,
}

/// Per-call-chain instantiation state: cycle detection and depth accumulation.
///
/// A fresh context is created at every public resolution entry point and
/// threaded through nested construction by reference. It reasons about one
/// logical dependency chain and is never shared between concurrent
/// resolutions.
pub(crate) struct InstantiationContext {
    frames: RefCell<Vec<Frame>>,
}

impl InstantiationContext {
    pub(crate) fn new() -> Self {
        InstantiationContext {
            frames: RefCell::new(Vec::new()),
        }
    }

    /// Pushes a frame for `key`.
    ///
    /// Fails if the key is already under construction on this chain; the
    /// error message renders the complete chain in dependency order.
    pub(crate) fn begin(&self, key: &InstanceKey) -> Result<(), ScopeError> {
        let mut frames = self.frames.borrow_mut();
        if frames.iter().any(|frame| frame.key == *key) {
            let mut chain: Vec<String> = frames.iter().map(|frame| frame.key.to_string()).collect();
            chain.push(key.to_string());
            return Err(ScopeError::CircularDependency {
                chain: chain.join(" -> "),
            });
        }
        frames.push(Frame {
            key: key.clone(),
            depth: 0,
        });
        Ok(())
    }

    /// Pops the current frame and returns the placement depth of its object.
    pub(crate) fn end(&self) -> usize {
        let frame = self
            .frames
            .borrow_mut()
            .pop()
            .expect("unbalanced instantiation frame");
        frame.depth
    }

    /// Reports the depth a resolved dependency was placed at.
    ///
    /// The current frame keeps the maximum over all its dependencies; outside
    /// of any construction this is a no-op.
    pub(crate) fn on_dependency_found(&self, depth: usize) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            if depth > frame.depth {
                frame.depth = depth;
            }
        }
    }
}
