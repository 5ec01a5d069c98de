// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Per-group item proposal: a stack machine with accept/reject/recall.
//!
//! The selector owns one group's items for the duration of a sphere
//! build. Items sit on the `unused` stack with the lowest priority on
//! top (the caller loads them sorted descending); proposals pop from
//! `unused` onto `proposed`, and each sphere ends by promoting the
//! proposed batch to `accepted` or demoting it to `rejected`.
//! `finish_accepting` closes a sphere and recycles rejected items back
//! onto `unused`, preserving priority order.
//!
//! For coupled groups, an item whose dual location has become permanently
//! reachable belongs to a sphere of the dual group and is retired to
//! `discarded` before it can be proposed.
//!
//! The `cap` bounds how many proposals this selector may still have
//! accepted; proposal is blocked once the live batch would exceed it.
//! Stage setup sizes the cap (item count for plain groups, location
//! count for coupled ones) and [`increment_cap`](GroupItemSelector::increment_cap)
//! adjusts it later.

use std::rc::Rc;

use crate::rando::errors::RandoError;
use crate::rando::placement::{PlacedState, RandoItem};

/// Stack machine over one group's items.
#[derive(Debug)]
pub struct GroupItemSelector {
    label: String,
    coupled: bool,
    /// Proposal stack; top (end) holds the lowest priority.
    unused: Vec<Rc<RandoItem>>,
    proposed: Vec<Rc<RandoItem>>,
    rejected: Vec<Rc<RandoItem>>,
    accepted: Vec<Rc<RandoItem>>,
    discarded: Vec<Rc<RandoItem>>,
    cap: i32,
}

impl GroupItemSelector {
    /// `items` must arrive sorted by priority descending, so the lowest
    /// priority ends up on top of the stack.
    pub fn new(label: &str, items: Vec<Rc<RandoItem>>, coupled: bool, cap: i32) -> Self {
        assert!(cap >= 0, "selector cap must be non-negative");
        Self {
            label: label.to_string(),
            coupled,
            unused: items,
            proposed: Vec::new(),
            rejected: Vec::new(),
            accepted: Vec::new(),
            discarded: Vec::new(),
            cap,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cap(&self) -> i32 {
        self.cap
    }

    /// Adjust the cap. Negative adjustments are allowed only while the
    /// result stays non-negative.
    pub fn increment_cap(&mut self, delta: i32) -> Result<(), RandoError> {
        let next = self.cap + delta;
        if next < 0 {
            return Err(RandoError::OutOfLocations(format!(
                "selector {} cap driven negative ({})",
                self.label, next
            )));
        }
        self.cap = next;
        Ok(())
    }

    /// Retire items whose dual location is already permanently reachable.
    /// Only meaningful for coupled groups; a no-op otherwise.
    fn discard_reachable_duals(&mut self) {
        if !self.coupled {
            return;
        }
        while let Some(top) = self.unused.last() {
            let retired = top
                .dual()
                .is_some_and(|dual| dual.reachable() == PlacedState::Permanent);
            if !retired {
                break;
            }
            let item = self.unused.pop().expect("peeked item pops");
            tracing::trace!(item = item.name(), group = %self.label, "dual reached, discarding");
            self.discarded.push(item);
        }
    }

    fn can_propose(&self) -> bool {
        !self.unused.is_empty() && (self.proposed.len() as i32) < self.cap
    }

    /// Priority of the next proposable item, if any.
    pub fn try_get_next_proposal_priority(&mut self) -> Option<f32> {
        self.discard_reachable_duals();
        if !self.can_propose() {
            return None;
        }
        self.unused.last().map(|item| item.priority())
    }

    /// Pop the next item into the proposed batch, marking it temporary.
    pub fn try_propose_next(&mut self) -> Option<Rc<RandoItem>> {
        self.discard_reachable_duals();
        if !self.can_propose() {
            return None;
        }
        let item = self.unused.pop().expect("can_propose checked non-empty");
        item.set_placed(PlacedState::Temporary);
        self.proposed.push(item.clone());
        Some(item)
    }

    /// Peek the most recent proposal without moving it.
    pub fn try_recall_last(&self) -> Option<&Rc<RandoItem>> {
        self.proposed.last()
    }

    /// Promote the most recent proposal to accepted, consuming cap.
    ///
    /// # Panics
    ///
    /// Panics if there is no live proposal.
    pub fn accept_last(&mut self) {
        let item = self
            .proposed
            .pop()
            .expect("accept_last with empty proposal stack");
        self.accepted.push(item);
        self.cap -= 1;
    }

    /// Demote the most recent proposal to rejected.
    ///
    /// # Panics
    ///
    /// Panics if there is no live proposal.
    pub fn reject_last(&mut self) {
        let item = self
            .proposed
            .pop()
            .expect("reject_last with empty proposal stack");
        item.set_placed(PlacedState::None);
        self.rejected.push(item);
    }

    /// Reject every live proposal.
    pub fn reject_all(&mut self) {
        while !self.proposed.is_empty() {
            self.reject_last();
        }
    }

    /// Accept every live proposal, in proposal order.
    pub fn accept_all(&mut self) {
        while !self.proposed.is_empty() {
            // accept_last pops from the end; draining keeps batch order
            // in `accepted` reversed per pop, which is fine: collection
            // order is not meaningful within a sphere.
            self.accept_last();
        }
    }

    /// Reset a whole sphere: live proposals and accepted-but-uncollected
    /// items all return to rejected, and their cap is restored.
    pub fn reject_current_and_unaccept_all(&mut self) {
        self.reject_all();
        let restored = self.accepted.len() as i32;
        while let Some(item) = self.accepted.pop() {
            item.set_placed(PlacedState::None);
            self.rejected.push(item);
        }
        self.cap += restored;
    }

    /// Drain the accepted batch (the items of the sphere being emitted).
    pub fn collect_accepted(&mut self) -> Vec<Rc<RandoItem>> {
        std::mem::take(&mut self.accepted)
    }

    /// Close the sphere: recycle rejected items back onto the proposal
    /// stack in priority order.
    pub fn finish_accepting(&mut self) {
        while let Some(item) = self.rejected.pop() {
            self.unused.push(item);
        }
        // Restore the stack invariant (lowest priority on top).
        self.unused.sort_by(|a, b| {
            b.priority()
                .partial_cmp(&a.priority())
                .expect("priorities are never NaN")
        });
    }

    /// All items placed, nothing left to propose or recycle.
    pub fn finished(&self) -> bool {
        self.unused.is_empty() && self.proposed.is_empty() && self.rejected.is_empty()
    }

    /// End-of-group sweep: whatever was never placed is discarded.
    ///
    /// # Panics
    ///
    /// Panics if proposals are still live or accepted items were never
    /// collected; both mean the sphere builder lost track of a batch.
    pub fn finish(&mut self) {
        assert!(
            self.proposed.is_empty(),
            "finish with live proposals in group {}",
            self.label
        );
        assert!(
            self.accepted.is_empty(),
            "finish with uncollected accepted items in group {}",
            self.label
        );
        self.discarded.append(&mut self.rejected);
        self.discarded.append(&mut self.unused);
    }

    /// Retire every item whose dual is permanently reachable, wherever
    /// it sits in the stack. Called by the sphere builder at settle
    /// points (after reachability commits); the propose-time check only
    /// sees the stack top.
    pub(crate) fn refresh_discards(&mut self) {
        if !self.coupled {
            return;
        }
        let mut i = 0;
        while i < self.unused.len() {
            let retired = self.unused[i]
                .dual()
                .is_some_and(|dual| dual.reachable() == PlacedState::Permanent);
            if retired {
                let item = self.unused.remove(i);
                tracing::trace!(
                    item = item.name(),
                    group = %self.label,
                    "dual reached, discarding"
                );
                self.discarded.push(item);
            } else {
                i += 1;
            }
        }
    }

    /// The discarded list so far, in retirement order.
    pub fn discarded(&self) -> &[Rc<RandoItem>] {
        &self.discarded
    }

    /// Drain the discarded list (coupled duals and end-of-group sweepings).
    pub fn collect_discarded(&mut self) -> Vec<Rc<RandoItem>> {
        std::mem::take(&mut self.discarded)
    }
}
