//! Sub-emitter hierarchy.
//!
//! When a particle of a system with sub-emitter templates dies, the system
//! queues a [`SubEmission`](crate::SubEmission). A [`SystemTree`] owns every
//! system of a hierarchy, turns queued sub-emissions into new started
//! systems, and keeps the parent/child links:
//!
//! - a parent lists its live children in
//!   [`active_sub_systems`](crate::ParticleSystem::active_sub_systems),
//! - a child points back with [`root`](crate::ParticleSystem::root).
//!
//! Links are [`SystemId`]s into the tree's arena rather than references, so
//! disposing a parent never leaves a dangling pointer: ids of removed systems
//! simply stop resolving.
//!
//! # Example
//!
//! ```ignore
//! let mut tree = SystemTree::new();
//! let rockets = tree.insert(ParticleSystem::new(presets::firework(Vec3::ZERO)));
//! tree.start(rockets)?;
//!
//! loop {
//!     let tick = clock.tick();
//!     let report = tree.step(&tick.context(&NoTransforms));
//!     for (_, system) in tree.iter() {
//!         system.render(&mut renderer);
//!     }
//! }
//! ```

use crate::emitter::{NoTransforms, TransformResolver};
use crate::error::{ParticleError, Result};
use crate::system::{FrameContext, ParticleSystem};
use slotmap::{new_key_type, SlotMap};
use tracing::debug;

new_key_type! {
    /// Handle to a system owned by a [`SystemTree`].
    pub struct SystemId;
}

/// Summary of one [`SystemTree::step`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeStepReport {
    /// Systems stepped this frame.
    pub stepped: usize,
    /// Particles emitted across all systems.
    pub emitted: usize,
    /// Particles recycled across all systems.
    pub recycled: usize,
    /// Child systems created from sub-emissions.
    pub spawned: Vec<SystemId>,
    /// Systems that finished stopping.
    pub ended: Vec<SystemId>,
    /// Systems removed because they ended with `dispose_on_stop`.
    pub disposed: Vec<SystemId>,
}

/// Arena of particle systems linked by sub-emission.
#[derive(Debug, Default)]
pub struct SystemTree {
    systems: SlotMap<SystemId, ParticleSystem>,
}

impl SystemTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level system. It is not started.
    pub fn insert(&mut self, system: ParticleSystem) -> SystemId {
        let id = self.systems.insert(system);
        debug!(?id, "particle system added to tree");
        id
    }

    pub fn get(&self, id: SystemId) -> Option<&ParticleSystem> {
        self.systems.get(id)
    }

    pub fn get_mut(&mut self, id: SystemId) -> Option<&mut ParticleSystem> {
        self.systems.get_mut(id)
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SystemId, &ParticleSystem)> {
        self.systems.iter()
    }

    /// Start a system, spawning children for anything its pre-warm killed.
    pub fn start(&mut self, id: SystemId) -> Result<()> {
        self.start_with(id, &NoTransforms)
    }

    pub fn start_with(&mut self, id: SystemId, transforms: &dyn TransformResolver) -> Result<()> {
        self.systems
            .get_mut(id)
            .ok_or(ParticleError::UnknownSystem(id))?
            .start_with(transforms);
        self.spawn_pending(id);
        Ok(())
    }

    /// Stop a system. With `cascade`, every live descendant stops as well.
    pub fn stop(&mut self, id: SystemId, cascade: bool) -> Result<()> {
        if !self.systems.contains_key(id) {
            return Err(ParticleError::UnknownSystem(id));
        }
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(system) = self.systems.get_mut(current) else {
                continue;
            };
            system.stop();
            if cascade {
                pending.extend_from_slice(system.active_sub_systems());
            }
        }
        Ok(())
    }

    /// Step every system once.
    ///
    /// Systems spawned during the step start immediately but are first
    /// stepped on the next frame. Systems that end with `dispose_on_stop`
    /// are removed after every system has stepped.
    pub fn step(&mut self, frame: &FrameContext<'_>) -> TreeStepReport {
        let mut report = TreeStepReport::default();
        let ids: Vec<SystemId> = self.systems.keys().collect();

        for id in ids {
            // Deaths queued outside a tree step, e.g. a pre-warm started
            // through `get_mut`.
            let queued_earlier = match self.systems.get(id) {
                Some(system) => !system.pending_sub_emissions().is_empty(),
                None => continue,
            };
            if queued_earlier {
                report.spawned.extend(self.spawn_pending(id));
            }

            let Some(system) = self.systems.get_mut(id) else {
                continue;
            };
            let outcome = system.step(frame);
            report.stepped += 1;
            report.emitted += outcome.emitted;
            report.recycled += outcome.recycled;

            if outcome.auto_stopped {
                // Children follow their parent into the stopping state.
                let _ = self.stop(id, true);
            }
            report.spawned.extend(self.spawn_pending(id));
            if outcome.animation_ended {
                report.ended.push(id);
            }
            if outcome.dispose_requested {
                report.disposed.push(id);
            }
        }

        for &id in &report.disposed {
            let _ = self.dispose(id);
        }
        report
    }

    /// Remove a system from the tree.
    ///
    /// The system is unlinked from its parent. Its children stay in the tree
    /// as top-level systems.
    pub fn dispose(&mut self, id: SystemId) -> Result<ParticleSystem> {
        let mut system = self.systems.remove(id).ok_or(ParticleError::UnknownSystem(id))?;

        if let Some(parent) = system.root().and_then(|root| self.systems.get_mut(root)) {
            parent.active_sub_systems_mut().retain(|child| *child != id);
        }
        for child in system.active_sub_systems() {
            if let Some(child) = self.systems.get_mut(*child) {
                child.set_root(None);
            }
        }
        system.active_sub_systems_mut().clear();
        system.set_root(None);

        debug!(?id, name = system.name(), remaining = self.systems.len(), "particle system disposed");
        Ok(system)
    }

    /// Turn the queued sub-emissions of `parent` into started child systems.
    fn spawn_pending(&mut self, parent: SystemId) -> Vec<SystemId> {
        let Some(parent_system) = self.systems.get_mut(parent) else {
            return Vec::new();
        };
        let children: Vec<ParticleSystem> = parent_system
            .drain_sub_emissions()
            .iter()
            .filter_map(|emission| parent_system.spawn_sub_system(emission))
            .collect();
        if children.is_empty() {
            return Vec::new();
        }

        let mut spawned = Vec::with_capacity(children.len());
        for mut child in children {
            child.set_root(Some(parent));
            let id = self.systems.insert(child);
            spawned.push(id);
        }
        if let Some(parent_system) = self.systems.get_mut(parent) {
            parent_system.active_sub_systems_mut().extend_from_slice(&spawned);
        }
        debug!(?parent, count = spawned.len(), "sub-emitters spawned");

        // A child's own pre-warm may already have killed particles.
        let mut descendants = Vec::new();
        for &id in &spawned {
            if let Some(child) = self.systems.get_mut(id) {
                child.start();
            }
            descendants.extend(self.spawn_pending(id));
        }
        spawned.extend(descendants);
        spawned
    }
}
