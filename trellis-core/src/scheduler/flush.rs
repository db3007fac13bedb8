//! Flush Engine
//!
//! One flush drains the open tick and every tick chained behind it.
//!
//! # Per-Tick Algorithm
//!
//! 1. Sort the tick's cells by the pre-order position of their owner, then
//!    by slot index, and fold each queue. Cells whose owner is gone are
//!    disposed.
//! 2. Seed a breadth-first worklist with every owner of a changed cell.
//!    Pop the shallowest instance, evaluate it, and push what the
//!    evaluation scheduled: children receiving new props and subscribers of
//!    changed providers. Both are strictly deeper, so no instance is
//!    evaluated twice in one tick.
//! 3. Tear down the subtrees parents stopped producing.
//! 4. Reconcile effects of every evaluated instance, in evaluation order.
//!
//! No arena borrow is held while user code runs (updaters, `render`,
//! effect bodies, cleanups).

use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexSet;

use super::{FlushReport, Runtime};
use crate::error::{Result, RuntimeError, SlotViolation};
use crate::reactive::{FlushOutcome, Flushable, ProviderEntry};
use crate::scope::{Provided, Scope};
use crate::tree::{HookSlot, InstanceId, InstanceStatus, OrderKey};

/// Work an evaluation hands back to the tick.
#[derive(Debug, Default)]
struct Evaluated {
    scheduled: Vec<InstanceId>,
    removed: Vec<InstanceId>,
}

impl Runtime {
    /// Run the flush loop. `seeds` are evaluated in the first tick whether
    /// or not any of their cells changed.
    pub(super) fn drive(&self, mut seeds: Vec<InstanceId>) -> Result<FlushReport> {
        if !self.shared.ticks.borrow_mut().begin_flush() {
            tracing::trace!("flush requested during a flush; deferred to the running one");
            return Ok(FlushReport::default());
        }

        let limit = self.shared.config.max_chained_ticks;
        let mut report = FlushReport::default();

        loop {
            let mut ticks = self.shared.ticks.borrow_mut();
            if seeds.is_empty() && !ticks.is_open() {
                break;
            }
            if report.ticks >= limit {
                let dropped = ticks.discard();
                ticks.finish_flush();
                drop(ticks);
                tracing::warn!(limit, dropped, "chained tick limit reached; pending requests dropped");
                return Err(RuntimeError::TickLimitExceeded { limit });
            }
            let Some((tick, cells)) = ticks.take_tick(!seeds.is_empty()) else {
                break;
            };
            drop(ticks);

            let span = tracing::debug_span!("flush", tick);
            let _entered = span.enter();
            self.run_tick(cells, std::mem::take(&mut seeds), &mut report);
            report.ticks += 1;
        }

        self.shared.ticks.borrow_mut().finish_flush();
        if !report.is_noop() {
            tracing::debug!(
                ticks = report.ticks,
                evaluated = report.evaluated.len(),
                torn_down = report.torn_down.len(),
                effects = report.effects_run,
                "flush finished"
            );
        }
        Ok(report)
    }

    fn run_tick(&self, cells: Vec<Rc<dyn Flushable>>, seeds: Vec<InstanceId>, report: &mut FlushReport) {
        let positions = self.shared.arena.borrow().preorder_positions();
        let mut ordered = Vec::with_capacity(cells.len());
        for cell in cells {
            match positions.get(&cell.owner()) {
                Some(&position) => ordered.push((position, cell.slot(), cell)),
                None => {
                    tracing::trace!(owner = %cell.owner(), "disposing cell of an unmounted instance");
                    cell.dispose();
                }
            }
        }
        ordered.sort_by_key(|(position, slot, _)| (*position, *slot));

        let mut dirty = IndexSet::new();
        for (_, _, cell) in ordered {
            report.cells_flushed += 1;
            if cell.flush() == FlushOutcome::Changed {
                report.cells_changed += 1;
                dirty.insert(cell.owner());
            }
        }
        dirty.extend(seeds);
        if dirty.is_empty() {
            tracing::trace!("no cell changed; tick is a no-op");
            return;
        }

        let mut worklist: BTreeMap<OrderKey, InstanceId> = {
            let arena = self.shared.arena.borrow();
            dirty
                .into_iter()
                .filter_map(|id| arena.order_key(id).map(|key| (key, id)))
                .collect()
        };

        let mut evaluated = Vec::new();
        let mut removed = Vec::new();
        while let Some((_, id)) = worklist.pop_first() {
            let Some(outcome) = self.evaluate(id) else {
                continue;
            };
            evaluated.push(id);
            let arena = self.shared.arena.borrow();
            for next in outcome.scheduled {
                if let Some(key) = arena.order_key(next) {
                    worklist.insert(key, next);
                }
            }
            removed.extend(outcome.removed);
        }

        self.teardown(&removed, report);
        self.reconcile_effects(&evaluated, report);
        report.evaluated.extend(evaluated);
    }

    /// Evaluate one instance. Returns `None` if it is gone or not live.
    fn evaluate(&self, id: InstanceId) -> Option<Evaluated> {
        let (element, mut slots, committed) = {
            let mut arena = self.shared.arena.borrow_mut();
            let record = arena.get_mut(id)?;
            if !record.status.is_live() {
                return None;
            }
            (
                record.element.clone(),
                std::mem::take(&mut record.slots),
                record.layout_committed,
            )
        };

        tracing::trace!(instance = %id, component = element.name(), "evaluating");
        let mut scope = Scope::new(self, id, &mut slots, committed);
        let rendered = element.render(&mut scope);
        let outcome = scope.finish(rendered.is_ok());

        if let Some((slot, violation)) = outcome.violation {
            clear_staged_effects(&mut slots);
            self.store(id, slots, InstanceStatus::Faulted);
            tracing::warn!(
                instance = %id,
                component = element.name(),
                slot,
                %violation,
                "instance faulted"
            );
            self.report(RuntimeError::StaleSlot {
                instance: id,
                slot,
                violation,
            });
            return Some(Evaluated::default());
        }

        let view = match rendered {
            Ok(view) => view,
            Err(source) => {
                if committed {
                    clear_staged_effects(&mut slots);
                } else {
                    let mut scratch = FlushReport::default();
                    for slot in slots.drain(..) {
                        self.release_slot(id, slot, &mut scratch);
                    }
                }
                self.store(id, slots, InstanceStatus::Failed);
                tracing::debug!(instance = %id, component = element.name(), error = %source, "presentation failed");
                self.report(RuntimeError::Presentation { instance: id, source });
                return Some(Evaluated::default());
            }
        };

        let (content, children) = view.into_parts();
        let mut arena = self.shared.arena.borrow_mut();
        let record = arena.get_mut(id)?;
        record.slots = slots;
        record.layout_committed = true;
        record.status = InstanceStatus::Rendered;
        record.evaluations += 1;
        record.content = content;

        let mut scheduled = Vec::new();
        for Provided { context, value, changed } in outcome.provided {
            match record.providers.get_mut(&context) {
                Some(entry) if changed => {
                    entry.replace(value);
                    scheduled.extend(entry.subscribers());
                }
                Some(_) => {}
                None => {
                    record.providers.insert(context, ProviderEntry::new(value));
                }
            }
        }

        let update = arena.update_children(id, children);
        scheduled.extend(update.scheduled);
        Some(Evaluated {
            scheduled,
            removed: update.removed,
        })
    }

    /// Put taken slots back after a failed evaluation.
    fn store(&self, id: InstanceId, slots: Vec<HookSlot>, status: InstanceStatus) {
        if let Some(record) = self.shared.arena.borrow_mut().get_mut(id) {
            record.slots = slots;
            record.status = status;
            record.evaluations += 1;
        }
    }

    /// Tear down each subtree: parents before children, slots in
    /// declaration order.
    pub(super) fn teardown(&self, roots: &[InstanceId], report: &mut FlushReport) {
        for &root in roots {
            let order = self.shared.arena.borrow().subtree_preorder(root);
            for id in order {
                let Some(record) = self.shared.arena.borrow_mut().remove(id) else {
                    continue;
                };
                tracing::debug!(instance = %id, component = record.element.name(), "tearing down");
                for slot in record.slots {
                    self.release_slot(id, slot, report);
                }
                report.torn_down.push(id);
            }
        }
    }

    /// Release everything one slot holds.
    fn release_slot(&self, id: InstanceId, slot: HookSlot, report: &mut FlushReport) {
        match slot {
            HookSlot::Effect(mut effect) => {
                if let Some(cleanup) = effect.take_cleanup() {
                    cleanup.run();
                    report.cleanups_run += 1;
                }
            }
            HookSlot::State { handle, .. } | HookSlot::Reducer { handle, .. } => handle.dispose(),
            HookSlot::Context(context) => {
                if let Some(provider) = context.provider {
                    let mut arena = self.shared.arena.borrow_mut();
                    if let Some(entry) = arena
                        .get_mut(provider)
                        .and_then(|record| record.providers.get_mut(&context.context))
                    {
                        entry.unsubscribe(id);
                    }
                }
            }
            HookSlot::Ref(_) | HookSlot::Memo(_) | HookSlot::Provider(_) => {}
        }
    }

    /// Run stale effects of the evaluated instances, top-down.
    fn reconcile_effects(&self, evaluated: &[InstanceId], report: &mut FlushReport) {
        let mode = self.shared.config.equality;
        for &id in evaluated {
            let count = self
                .shared
                .arena
                .borrow()
                .get(id)
                .map_or(0, |record| record.slots.len());

            for index in 0..count {
                let work = match self
                    .shared
                    .arena
                    .borrow_mut()
                    .get_mut(id)
                    .and_then(|record| record.slots.get_mut(index))
                {
                    Some(HookSlot::Effect(slot)) => slot.take_work(mode),
                    _ => None,
                };
                let Some(work) = work else {
                    continue;
                };

                if let Some((previous, current)) = work.length_change {
                    self.report(RuntimeError::StaleSlot {
                        instance: id,
                        slot: work.index,
                        violation: SlotViolation::DependencyCountChanged { previous, current },
                    });
                }
                if let Some(cleanup) = work.cleanup {
                    cleanup.run();
                    report.cleanups_run += 1;
                }

                tracing::trace!(instance = %id, slot = work.index, "running effect");
                report.effects_run += 1;
                let cleanup = match (work.body)() {
                    Ok(cleanup) => cleanup,
                    Err(source) => {
                        tracing::debug!(instance = %id, slot = work.index, error = %source, "effect failed");
                        self.report(RuntimeError::EffectBody {
                            instance: id,
                            slot: work.index,
                            source,
                        });
                        None
                    }
                };

                if let Some(HookSlot::Effect(slot)) = self
                    .shared
                    .arena
                    .borrow_mut()
                    .get_mut(id)
                    .and_then(|record| record.slots.get_mut(index))
                {
                    slot.install(cleanup);
                }
            }
        }
    }
}

fn clear_staged_effects(slots: &mut [HookSlot]) {
    for slot in slots {
        if let HookSlot::Effect(effect) = slot {
            effect.clear_staged();
        }
    }
}
