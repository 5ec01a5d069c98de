// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Sphere-by-sphere reachability expansion.
//!
//! The builder drives one stage's groups from the start state to full
//! placement-readiness, emitting *spheres*: batches of items together
//! with the locations those items newly unlock.
//!
//! # Algorithm
//!
//! Sphere 0 carries the locations reachable before any proposal. Then,
//! repeatedly:
//!
//! 1. Try each priority layer on its own: checkpoint the progression,
//!    propose the layer across all selectors, propagate, and look for
//!    newly reachable locations. A layer that unlocks nothing is
//!    rejected and the checkpoint rewound.
//! 2. If no single layer makes progress, recycle the rejections and
//!    propose layers *cumulatively* (conjunctive requirements need
//!    several items at once) until something unlocks or the selectors
//!    exhaust, which is the out-of-locations failure.
//! 3. Once every pending location is reachable, any remaining items form
//!    a final sphere of their own: there is nothing left to unlock.
//!
//! Rejected proposals are retracted with checkpoint/rewind, so location
//! reachability flags are only ever written for spheres that commit.

use std::rc::Rc;

use crate::progression::ProgressionManager;
use crate::rando::errors::RandoError;
use crate::rando::placement::{PlacedState, RandoItem, RandoLocation};
use crate::rando::selector::GroupItemSelector;

/// One group's slice of a sphere.
#[derive(Debug, Clone, Default)]
pub struct SphereContents {
    pub items: Vec<Rc<RandoItem>>,
    pub locations: Vec<Rc<RandoLocation>>,
}

/// A batch of simultaneously placeable items and the locations they
/// unlock, one entry per group in stage declaration order.
#[derive(Debug, Clone)]
pub struct Sphere {
    pub groups: Vec<SphereContents>,
}

impl Sphere {
    /// Total items across groups.
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    /// Total locations across groups.
    pub fn location_count(&self) -> usize {
        self.groups.iter().map(|g| g.locations.len()).sum()
    }
}

/// Everything a finished expansion produced.
#[derive(Debug)]
pub struct SphereOutcome {
    pub spheres: Vec<Sphere>,
    /// Per group: items retired without placement (coupled duals whose
    /// location side was reached, end-of-group sweepings).
    pub discarded: Vec<Vec<Rc<RandoItem>>>,
}

/// Iteratively advances reachability for one stage.
pub struct SphereBuilder<'a> {
    pm: &'a mut ProgressionManager,
    selectors: Vec<GroupItemSelector>,
    /// Per group: locations not yet reachable, in priority order.
    pending: Vec<Vec<Rc<RandoLocation>>>,
    /// Per group: how many discarded items have had their effects
    /// granted to the progression.
    granted_discards: Vec<usize>,
    /// Mark applied to newly reachable locations.
    mode: PlacedState,
}

impl<'a> SphereBuilder<'a> {
    pub fn new(
        pm: &'a mut ProgressionManager,
        selectors: Vec<GroupItemSelector>,
        pending: Vec<Vec<Rc<RandoLocation>>>,
        mode: PlacedState,
    ) -> Self {
        assert_eq!(selectors.len(), pending.len(), "one selector per group");
        let group_count = selectors.len();
        Self {
            pm,
            selectors,
            pending,
            granted_discards: vec![0; group_count],
            mode,
        }
    }

    /// Run the expansion to completion.
    pub fn advance_all(mut self) -> Result<SphereOutcome, RandoError> {
        let mut spheres = Vec::new();

        // Sphere 0: locations reachable from the start state alone.
        let initial = self.commit_reachable();
        tracing::debug!(locations = initial.iter().map(Vec::len).sum::<usize>(), "sphere 0");
        spheres.push(Sphere {
            groups: initial
                .into_iter()
                .map(|locations| SphereContents {
                    items: Vec::new(),
                    locations,
                })
                .collect(),
        });

        loop {
            self.settle_discards(&mut spheres);

            if self
                .selectors
                .iter()
                .all(|s| s.finished() || s.cap() == 0)
            {
                break;
            }

            // Nothing left to unlock: the remaining items form one final
            // sphere (if any are proposable at all).
            if self.pending.iter().all(Vec::is_empty) {
                if let Some(sphere) = self.drain_remaining() {
                    spheres.push(sphere);
                }
                break;
            }

            if let Some(sphere) = self.advance_one()? {
                tracing::debug!(
                    index = spheres.len(),
                    items = sphere.item_count(),
                    locations = sphere.location_count(),
                    "sphere emitted"
                );
                spheres.push(sphere);
            }
        }

        let mut discarded = Vec::with_capacity(self.selectors.len());
        for selector in &mut self.selectors {
            selector.finish();
            discarded.push(selector.collect_discarded());
        }

        // A discarded couple settles on its own dual; that location is
        // consumed and must not also receive a strategy placement.
        for (g, items) in discarded.iter().enumerate() {
            for item in items {
                let Some(dual) = item.dual() else { continue };
                for sphere in &mut spheres {
                    sphere.groups[g]
                        .locations
                        .retain(|l| !Rc::ptr_eq(l, &dual));
                }
            }
        }

        Ok(SphereOutcome { spheres, discarded })
    }

    /// Retire coupled items whose duals are now permanently reachable,
    /// granting their effects (they are obtainable at their known dual),
    /// and commit any locations that unlock for free as item-less
    /// spheres. Repeats until nothing moves.
    fn settle_discards(&mut self, spheres: &mut Vec<Sphere>) {
        loop {
            let mut granted = 0usize;
            for (idx, selector) in self.selectors.iter_mut().enumerate() {
                selector.refresh_discards();
                let fresh: Vec<_> = selector.discarded()[self.granted_discards[idx]..].to_vec();
                self.granted_discards[idx] += fresh.len();
                granted += fresh.len();
                for item in fresh {
                    self.pm.add(item.item().as_ref());
                }
            }
            if granted == 0 {
                return;
            }
            let freebies = self.commit_reachable();
            if freebies.iter().any(|locations| !locations.is_empty()) {
                spheres.push(Sphere {
                    groups: freebies
                        .into_iter()
                        .map(|locations| SphereContents {
                            items: Vec::new(),
                            locations,
                        })
                        .collect(),
                });
            }
        }
    }

    /// Produce the next sphere: layer sweep first, cumulative fallback
    /// second.
    fn advance_one(&mut self) -> Result<Option<Sphere>, RandoError> {
        // Phase 1: each priority layer alone.
        while let Some(frontier) = self.next_frontier() {
            let snapshot = self.pm.checkpoint();
            self.propose_layer(frontier);
            if self.any_newly_reachable() {
                return Ok(Some(self.commit_sphere()));
            }
            self.pm.rewind(&snapshot);
            for selector in &mut self.selectors {
                selector.reject_all();
            }
        }

        // Phase 2: no single layer unlocked anything. Recycle and
        // accumulate layers until something does.
        for selector in &mut self.selectors {
            selector.finish_accepting();
        }
        loop {
            let Some(frontier) = self.next_frontier() else {
                return Err(RandoError::OutOfLocations(format!(
                    "selectors exhausted with {} location(s) still locked",
                    self.pending.iter().map(Vec::len).sum::<usize>()
                )));
            };
            self.propose_layer(frontier);
            if self.any_newly_reachable() {
                return Ok(Some(self.commit_sphere()));
            }
        }
    }

    /// Smallest next proposal priority across selectors.
    fn next_frontier(&mut self) -> Option<f32> {
        self.selectors
            .iter_mut()
            .filter_map(|s| s.try_get_next_proposal_priority())
            .min_by(|a, b| a.partial_cmp(b).expect("priorities are never NaN"))
    }

    /// Propose every item whose priority equals the frontier, applying
    /// its effects to the progression.
    fn propose_layer(&mut self, frontier: f32) {
        for selector in &mut self.selectors {
            while selector.try_get_next_proposal_priority() == Some(frontier) {
                let item = selector
                    .try_propose_next()
                    .expect("priority peek implies proposable");
                self.pm.add(item.item().as_ref());
            }
        }
    }

    fn any_newly_reachable(&self) -> bool {
        self.pending
            .iter()
            .flatten()
            .any(|loc| loc.logic().can_get(&*self.pm))
    }

    /// Accept the live proposals and commit newly reachable locations as
    /// one sphere.
    fn commit_sphere(&mut self) -> Sphere {
        let locations = self.commit_reachable();
        let mut groups = Vec::with_capacity(self.selectors.len());
        for (selector, locations) in self.selectors.iter_mut().zip(locations) {
            selector.accept_all();
            let items = selector.collect_accepted();
            selector.finish_accepting();
            groups.push(SphereContents { items, locations });
        }
        Sphere { groups }
    }

    /// Mark every currently reachable pending location and remove it from
    /// the pending pool. Returns the newly reachable locations per group.
    fn commit_reachable(&mut self) -> Vec<Vec<Rc<RandoLocation>>> {
        let mode = self.mode;
        let pm = &*self.pm;
        self.pending
            .iter_mut()
            .map(|pending| {
                let mut reached = Vec::new();
                pending.retain(|loc| {
                    if loc.logic().can_get(pm) {
                        loc.set_reachable(mode);
                        reached.push(loc.clone());
                        false
                    } else {
                        true
                    }
                });
                reached
            })
            .collect()
    }

    /// Accept everything still proposable into a final, location-less
    /// sphere. Returns `None` when nothing was proposable.
    fn drain_remaining(&mut self) -> Option<Sphere> {
        while let Some(frontier) = self.next_frontier() {
            self.propose_layer(frontier);
        }
        let mut groups = Vec::with_capacity(self.selectors.len());
        let mut any = false;
        for selector in &mut self.selectors {
            selector.accept_all();
            let items = selector.collect_accepted();
            any |= !items.is_empty();
            groups.push(SphereContents {
                items,
                locations: Vec::new(),
            });
        }
        any.then_some(Sphere { groups })
    }
}
