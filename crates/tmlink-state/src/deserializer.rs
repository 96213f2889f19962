use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::binding::{self, Field};
use crate::error::Result;
use crate::raw::RawState;
use crate::record::{split_items, Item};
use crate::state::{RobotState, SharedState};

/// Items decoded per record; anything after is ignored.
pub const MAX_ITEMS: usize = 100;

/// What to do with the item at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Copy the item's bytes into this field.
    Copy(Field),
    /// Ignore the item.
    Skip,
}

/// One learned position: the item name seen there and its action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Item name seen at this position while learning.
    pub name: String,
    /// What replay does with the item at this position.
    pub action: Action,
}

#[derive(Debug)]
enum Phase {
    Learning,
    Replaying(Vec<PlanStep>),
}

/// Summary of one decoded record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Bytes of the record covered by the decoded items.
    pub consumed: usize,
    /// Items decoded.
    pub items: usize,
    /// Items copied into the state.
    pub copied: usize,
    /// Items skipped.
    pub skipped: usize,
    /// Copies whose declared length differed from the destination size.
    pub clamped: usize,
    /// Positions whose name did not match the learned plan.
    pub plan_mismatches: usize,
    /// Required items absent from the learning record.
    pub missing_required: Vec<String>,
}

/// Decodes binary state records into [`RobotState`].
///
/// The first successfully split record is used to learn a per-position plan.
/// Later records replay that plan. A position whose name differs from the
/// learned one is resolved through the binding table instead.
#[derive(Debug)]
pub struct StateDeserializer {
    raw: RawState,
    phase: Phase,
}

impl Default for StateDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDeserializer {
    /// A deserializer that learns its plan from the next record.
    pub fn new() -> Self {
        Self {
            raw: RawState::default(),
            phase: Phase::Learning,
        }
    }

    /// Returns true until the first record has been decoded.
    pub fn is_learning(&self) -> bool {
        matches!(self.phase, Phase::Learning)
    }

    /// The learned plan, once available.
    pub fn plan(&self) -> Option<&[PlanStep]> {
        match &self.phase {
            Phase::Learning => None,
            Phase::Replaying(plan) => Some(plan.as_slice()),
        }
    }

    /// Decode `record` and publish into `state`.
    ///
    /// For callers that already hold the state lock.
    pub fn decode_record(&mut self, record: &[u8], state: &mut RobotState) -> Result<DecodeReport> {
        let report = self.stage(record)?;
        self.raw.publish(state);
        Ok(report)
    }

    /// Decode `record`, then publish into `shared` under its lock.
    pub fn decode_record_with_lock(
        &mut self,
        record: &[u8],
        shared: &SharedState,
    ) -> Result<DecodeReport> {
        let report = self.stage(record)?;
        self.raw.publish(&mut shared.lock());
        Ok(report)
    }

    fn stage(&mut self, record: &[u8]) -> Result<DecodeReport> {
        let (items, consumed) = split_items(record, MAX_ITEMS)?;
        if consumed < record.len() {
            debug!(
                consumed,
                len = record.len(),
                max_items = MAX_ITEMS,
                "state record item limit reached, ignoring the rest"
            );
        }

        let mut report = DecodeReport {
            consumed,
            items: items.len(),
            ..DecodeReport::default()
        };

        let actions = match &self.phase {
            Phase::Learning => None,
            Phase::Replaying(plan) => Some(resolve(plan, &items, &mut report)),
        };

        match actions {
            Some(actions) => {
                for (item, action) in items.iter().zip(actions) {
                    apply(&mut self.raw, item, action, false, &mut report);
                }
            }
            None => {
                let plan = self.learn(&items, &mut report);
                self.phase = Phase::Replaying(plan);
            }
        }
        Ok(report)
    }

    fn learn(&mut self, items: &[Item<'_>], report: &mut DecodeReport) -> Vec<PlanStep> {
        let mut seen = HashSet::new();
        let mut plan = Vec::with_capacity(items.len());

        for item in items {
            let name = item.name_str();
            let action = match binding::lookup(&name) {
                Some(binding) => {
                    info!(item = %name, "state item checked");
                    seen.insert(binding.field);
                    Action::Copy(binding.field)
                }
                None => {
                    info!(item = %name, "state item skipped");
                    Action::Skip
                }
            };
            apply(&mut self.raw, item, action, true, report);
            plan.push(PlanStep { name, action });
        }

        info!(
            total = plan.len(),
            checked = report.copied,
            skipped = report.skipped,
            "state record layout learned"
        );

        for name in binding::required_names() {
            let present = binding::lookup(name).is_some_and(|b| seen.contains(&b.field));
            if !present {
                warn!(item = name, "required state item not present");
                report.missing_required.push(name.to_string());
            }
        }
        plan
    }
}

/// Pair each item with its action, falling back to the table on a name mismatch.
fn resolve(plan: &[PlanStep], items: &[Item<'_>], report: &mut DecodeReport) -> Vec<Action> {
    items
        .iter()
        .enumerate()
        .map(|(pos, item)| match plan.get(pos) {
            Some(step) if step.name.as_bytes() == item.name => step.action,
            step => {
                report.plan_mismatches += 1;
                let name = item.name_str();
                warn!(
                    position = pos,
                    expected = step.map(|s| s.name.as_str()),
                    found = %name,
                    "state record layout changed"
                );
                binding::lookup(&name).map_or(Action::Skip, |b| Action::Copy(b.field))
            }
        })
        .collect()
}

fn apply(raw: &mut RawState, item: &Item<'_>, action: Action, learning: bool, report: &mut DecodeReport) {
    let Action::Copy(field) = action else {
        report.skipped += 1;
        return;
    };
    let Some(slot) = raw.slot_mut(field) else {
        report.skipped += 1;
        return;
    };

    let n = slot.len().min(item.data.len());
    slot[..n].copy_from_slice(&item.data[..n]);
    report.copied += 1;

    if item.data.len() != slot.len() {
        report.clamped += 1;
        if learning {
            warn!(
                item = %item.name_str(),
                declared = item.data.len(),
                capacity = slot.len(),
                "state item size mismatch"
            );
        } else {
            debug!(
                item = %item.name_str(),
                declared = item.data.len(),
                capacity = slot.len(),
                "state item size mismatch"
            );
        }
    }
}
