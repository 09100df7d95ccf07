//! LIFO stack of active phase contexts.

use super::context::PhaseContext;
use super::state::PhaseState;

/// Ordered stack of open phase contexts, innermost on top.
///
/// Alongside the frames the stack keeps a per-state activation count so the
/// runaway and depth checks do not need to walk every frame.
#[derive(Debug, Clone)]
pub struct PhaseStack {
    frames: Vec<PhaseContext>,
    activations: [usize; PhaseState::COUNT],
}

impl Default for PhaseStack {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseStack {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            activations: [0; PhaseState::COUNT],
        }
    }

    /// Pushes a context on top.
    pub fn push(&mut self, context: PhaseContext) {
        self.activations[context.state().index()] += 1;
        self.frames.push(context);
    }

    /// Removes and returns the top context.
    pub fn pop(&mut self) -> Option<PhaseContext> {
        let context = self.frames.pop()?;
        let count = &mut self.activations[context.state().index()];
        *count = count.saturating_sub(1);
        Some(context)
    }

    /// Returns the top context.
    #[must_use]
    pub fn peek(&self) -> Option<&PhaseContext> {
        self.frames.last()
    }

    /// Returns the top context mutably.
    pub fn peek_mut(&mut self) -> Option<&mut PhaseContext> {
        self.frames.last_mut()
    }

    /// Number of open frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns whether no phase is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterates frames from top (innermost) to bottom.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &PhaseContext> {
        self.frames.iter().rev()
    }

    /// Number of frames currently open for `state`.
    #[must_use]
    pub const fn activations(&self, state: PhaseState) -> usize {
        self.activations[state.index()]
    }

    /// Returns whether `state` is anywhere on the stack.
    #[must_use]
    pub const fn contains(&self, state: PhaseState) -> bool {
        self.activations(state) > 0
    }

    /// Returns whether entering `state` now would be a runaway activation:
    /// the state does not allow reentry and is already on the stack.
    ///
    /// Reentrant states never trip this check. Their repeated activations
    /// are bounded by the processing depth ceiling instead.
    #[must_use]
    pub const fn check_for_runaways(&self, state: PhaseState) -> bool {
        !state.policy().allows_reentry && self.contains(state)
    }
}
