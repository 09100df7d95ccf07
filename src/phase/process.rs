//! Draining captured side effects when a phase completes.
//!
//! Each [`Processing`] mode has one [`PhaseProcessor`]. A processor only
//! drains the capture kinds its state's policy records; anything else left
//! in the context is reported as unprocessed by the tracker.
//!
//! Block changes are applied depth-first. Follow-up changes the host
//! returns are replayed as [`PhaseState::NeighborNotify`] activations one
//! level deeper, from an explicit work list, and every level goes through
//! the depth guard.

use crate::capability::CapabilityQuery;
use crate::config::handle::ConfigHandle;
use crate::config::schema::PhaseTrackerSettings;
use crate::diagnostics::printer::PhasePrinter;

use super::context::{BlockChange, CapturedEntity, Cause, PhaseContext};
use super::event::WorldEvent;
use super::host::EngineHost;
use super::stack::PhaseStack;
use super::state::{PhaseState, Processing};

// ============================================================================
// Processors
// ============================================================================

/// Drains a completed context into the host.
pub trait PhaseProcessor: Sync {
    /// Processes `context`, which has already been popped off the stack.
    fn process(&self, scope: &mut ProcessScope<'_>, context: &mut PhaseContext);
}

/// One outward event per captured change or entity.
#[derive(Debug, Clone, Copy)]
pub struct ImmediateProcessor;

/// One outward event per capture kind.
#[derive(Debug, Clone, Copy)]
pub struct BatchedProcessor;

/// Hands captures to the parent phase.
#[derive(Debug, Clone, Copy)]
pub struct DeferredProcessor;

/// Applies captures without outward events.
#[derive(Debug, Clone, Copy)]
pub struct PassthroughProcessor;

/// Returns the processor for a processing mode.
#[must_use]
pub const fn processor_for(processing: Processing) -> &'static dyn PhaseProcessor {
    match processing {
        Processing::Immediate => &ImmediateProcessor,
        Processing::Batched => &BatchedProcessor,
        Processing::Deferred => &DeferredProcessor,
        Processing::Passthrough => &PassthroughProcessor,
    }
}

impl PhaseProcessor for ImmediateProcessor {
    fn process(&self, scope: &mut ProcessScope<'_>, context: &mut PhaseContext) {
        let policy = context.state().policy();
        if policy.captures_blocks {
            for change in context.take_blocks() {
                let survivors = scope.post_block_event(context, vec![change]);
                scope.apply_blocks(context, survivors, true);
            }
        }
        if policy.captures_entities {
            for entity in context.take_entities() {
                let survivors = scope.post_spawn_event(context, vec![entity]);
                scope.spawn_entities(context, survivors);
            }
        }
    }
}

impl PhaseProcessor for BatchedProcessor {
    fn process(&self, scope: &mut ProcessScope<'_>, context: &mut PhaseContext) {
        let policy = context.state().policy();
        if policy.captures_blocks {
            let changes = context.take_blocks();
            if !changes.is_empty() {
                let survivors = scope.post_block_event(context, changes);
                scope.apply_blocks(context, survivors, true);
            }
        }
        if policy.captures_entities {
            let entities = context.take_entities();
            if !entities.is_empty() {
                let survivors = scope.post_spawn_event(context, entities);
                scope.spawn_entities(context, survivors);
            }
        }
    }
}

impl PhaseProcessor for DeferredProcessor {
    fn process(&self, scope: &mut ProcessScope<'_>, context: &mut PhaseContext) {
        let policy = context.state().policy();
        if let Some(parent) = scope.parent_mut().filter(|p| !p.is_halted()) {
            let parent_policy = parent.state().policy();
            if policy.captures_blocks && parent_policy.captures_blocks {
                for change in context.take_blocks() {
                    parent.capture_block_change(change);
                }
            }
            if policy.captures_entities && parent_policy.captures_entities {
                for entity in context.take_entities() {
                    parent.capture_entity(entity);
                }
            }
        }
        // No parent, or a parent that cannot hold some kind.
        ImmediateProcessor.process(scope, context);
    }
}

impl PhaseProcessor for PassthroughProcessor {
    fn process(&self, scope: &mut ProcessScope<'_>, context: &mut PhaseContext) {
        let policy = context.state().policy();
        if policy.captures_blocks {
            let changes = context.take_blocks();
            scope.apply_blocks(context, changes, false);
        }
        if policy.captures_entities {
            let entities = context.take_entities();
            scope.spawn_entities(context, entities);
        }
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Tracker state lent to a processor for the duration of one completion.
pub struct ProcessScope<'a> {
    stack: &'a mut PhaseStack,
    printer: &'a mut PhasePrinter,
    config: &'a mut ConfigHandle,
    capabilities: &'a dyn CapabilityQuery,
    host: &'a mut dyn EngineHost,
}

impl<'a> ProcessScope<'a> {
    pub(crate) fn new(
        stack: &'a mut PhaseStack,
        printer: &'a mut PhasePrinter,
        config: &'a mut ConfigHandle,
        capabilities: &'a dyn CapabilityQuery,
        host: &'a mut dyn EngineHost,
    ) -> Self {
        Self {
            stack,
            printer,
            config,
            capabilities,
            host,
        }
    }

    /// Remaining stack; the completing context is no longer on it.
    #[must_use]
    pub fn stack(&self) -> &PhaseStack {
        &*self.stack
    }

    /// The phase that will be on top once this completion finishes.
    pub fn parent_mut(&mut self) -> Option<&mut PhaseContext> {
        self.stack.peek_mut()
    }

    /// Current tracker settings.
    #[must_use]
    pub fn settings(&self) -> &PhaseTrackerSettings {
        self.config.settings()
    }

    /// Depth guard; see [`check_max_depth`].
    pub fn check_max_depth(&mut self, context: &PhaseContext, depth: usize) -> bool {
        check_max_depth(self.printer, self.config, context, depth)
    }

    /// Posts one block event covering every change whose type allows event
    /// creation. Returns the changes to apply, in capture order: changes
    /// without events, plus evented changes a listener left valid.
    pub fn post_block_event(
        &mut self,
        context: &PhaseContext,
        changes: Vec<BlockChange>,
    ) -> Vec<BlockChange> {
        let evented: Vec<bool> = changes
            .iter()
            .map(|c| self.capabilities.block_flags(&c.replacement).block_event_creation)
            .collect();
        let batch: Vec<BlockChange> = changes
            .iter()
            .zip(&evented)
            .filter(|(_, e)| **e)
            .map(|(c, _)| c.clone())
            .collect();
        if batch.is_empty() {
            return changes;
        }

        let mut event = WorldEvent::change_block(context.state(), causes(context), batch);
        self.host.post_event(&mut event);

        let mut verdicts = match event {
            WorldEvent::ChangeBlock(event) if !event.cancelled => event.transactions,
            _ => Vec::new(),
        }
        .into_iter();

        changes
            .into_iter()
            .zip(evented)
            .filter_map(|(change, evented)| {
                if !evented {
                    return Some(change);
                }
                verdicts
                    .next()
                    .filter(|t| t.valid)
                    .map(|t| t.to_change())
            })
            .collect()
    }

    /// Posts one spawn event covering every entity whose type allows event
    /// creation. Returns entities without events followed by the evented
    /// entities listeners kept.
    pub fn post_spawn_event(
        &mut self,
        context: &PhaseContext,
        entities: Vec<CapturedEntity>,
    ) -> Vec<CapturedEntity> {
        let (evented, mut plain): (Vec<_>, Vec<_>) = entities.into_iter().partition(|e| {
            self.capabilities
                .entity_flags(&e.kind)
                .entity_event_creation
        });
        if evented.is_empty() {
            return plain;
        }

        let mut event = WorldEvent::spawn_entity(context.state(), causes(context), evented);
        self.host.post_event(&mut event);

        if let WorldEvent::SpawnEntity(event) = event {
            if !event.cancelled {
                plain.extend(event.entities);
            }
        }
        plain
    }

    /// Applies `changes` in order, replaying each change's follow-ups
    /// depth-first before moving to the next change.
    ///
    /// Follow-ups run as neighbor notifications at `context.depth() + 1`
    /// and deeper. A notification past the depth ceiling is discarded
    /// together with everything it would have caused.
    pub fn apply_blocks(&mut self, context: &PhaseContext, changes: Vec<BlockChange>, with_events: bool) {
        let mut pending: Vec<(BlockChange, Cause, usize)> = Vec::new();
        for change in changes {
            let follow_ups = self.apply_one(context, &change);
            push_follow_ups(&mut pending, &change, follow_ups, context.depth() + 1);

            while let Some((change, source, depth)) = pending.pop() {
                let mut notify = PhaseContext::new(PhaseState::NeighborNotify).with_source(source);
                for cause in context.cause_chain() {
                    notify = notify.with_cause(cause.clone());
                }
                notify.open(depth);
                if self.check_max_depth(&notify, depth) {
                    continue;
                }

                let survivors = if with_events {
                    self.post_block_event(&notify, vec![change])
                } else {
                    vec![change]
                };
                for change in survivors {
                    let follow_ups = self.apply_one(&notify, &change);
                    push_follow_ups(&mut pending, &change, follow_ups, depth + 1);
                }
            }
        }
    }

    /// Spawns entities in order. Host failures are reported per state.
    pub fn spawn_entities(&mut self, context: &PhaseContext, entities: Vec<CapturedEntity>) {
        for entity in entities {
            if let Err(error) = self.host.spawn_entity(&entity) {
                tracing::debug!(entity = %entity, %error, "entity spawn failed");
                self.printer.entity_spawn_exception(
                    self.config.settings(),
                    &*self.stack,
                    context,
                    &error,
                );
            }
        }
    }

    fn apply_one(&mut self, context: &PhaseContext, change: &BlockChange) -> Vec<BlockChange> {
        match self.host.apply_block_change(change) {
            Ok(follow_ups) => follow_ups,
            Err(error) => {
                tracing::debug!(change = %change, %error, "block change failed");
                self.printer.block_tracking_exception(
                    self.config.settings(),
                    &*self.stack,
                    context,
                    &error,
                );
                Vec::new()
            }
        }
    }
}

fn causes(context: &PhaseContext) -> Vec<Cause> {
    context.cause_chain().cloned().collect()
}

/// Queues follow-ups so the first one is processed next.
fn push_follow_ups(
    pending: &mut Vec<(BlockChange, Cause, usize)>,
    parent: &BlockChange,
    follow_ups: Vec<BlockChange>,
    depth: usize,
) {
    for change in follow_ups.into_iter().rev() {
        let source = Cause::Block {
            state: parent.replacement.clone(),
            pos: parent.pos,
        };
        pending.push((change, source, depth));
    }
}

// ============================================================================
// Depth guard
// ============================================================================

/// Returns `true` when `depth` is past the configured ceiling for
/// `context`'s state, reporting the breach once per state.
///
/// A neighbor notification that breaches the legacy ceiling of 100 raises
/// the global ceiling to 1000 and writes the configuration back before
/// re-checking. A failed write is logged and otherwise ignored.
pub(crate) fn check_max_depth(
    printer: &mut PhasePrinter,
    config: &mut ConfigHandle,
    context: &PhaseContext,
    depth: usize,
) -> bool {
    let mut max_depth = config.settings().max_block_processing_depth;
    if depth <= max_depth {
        return false;
    }

    if max_depth == PhaseTrackerSettings::LEGACY_MAX_DEPTH
        && context.state() == PhaseState::NeighborNotify
    {
        max_depth = PhaseTrackerSettings::NEIGHBOR_NOTIFY_MAX_DEPTH;
        config.settings_mut().max_block_processing_depth = max_depth;
        match config.save() {
            Ok(true) => tracing::info!(max_depth, "raised max_block_processing_depth and saved configuration"),
            Ok(false) => tracing::info!(max_depth, "raised max_block_processing_depth (no backing file)"),
            Err(error) => tracing::warn!(%error, "failed to persist raised max_block_processing_depth"),
        }
        if depth <= max_depth {
            return false;
        }
    }

    printer.max_depth_exceeded(config.settings(), context, depth, max_depth);
    true
}
