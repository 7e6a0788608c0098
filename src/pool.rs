//! Particle pool.
//!
//! The pool keeps two disjoint lists: `active` particles, simulated and
//! rendered every frame, and `free` stock waiting to be reused. Dead particles
//! are never dropped; they move to the free list and come back on the next
//! [`acquire`](ParticlePool::acquire).
//!
//! Removal is a swap with the last active particle, so the active list stays
//! dense and removal is O(1). The price is that removal reorders the active
//! list, which only affects draw order.

use crate::particle::Particle;

/// Active and free particles of one system.
#[derive(Clone, Debug, Default)]
pub struct ParticlePool {
    active: Vec<Particle>,
    free: Vec<Particle>,
    capacity: usize,
}

impl ParticlePool {
    /// Create an empty pool holding at most `capacity` active particles.
    pub fn new(capacity: usize) -> Self {
        Self {
            active: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
        }
    }

    /// Take a particle from the free stock, or allocate a new one.
    ///
    /// Reused particles have their age reset to 0 and their sprite cell set
    /// to `start_cell`; every other attribute is stale and must be rewritten
    /// by the caller. The particle is not active until [`push`](Self::push)ed.
    pub fn acquire(&mut self, start_cell: u32) -> Particle {
        match self.free.pop() {
            Some(mut particle) => {
                particle.rewind(start_cell);
                particle
            }
            None => Particle {
                cell_index: start_cell,
                ..Particle::default()
            },
        }
    }

    /// Append a particle to the active list.
    pub fn push(&mut self, particle: Particle) {
        debug_assert!(self.active.len() < self.capacity, "particle pool over capacity");
        self.active.push(particle);
    }

    /// Retire the active particle at `index`.
    ///
    /// The last active particle takes its slot (unless `index` already is
    /// the last one) and the retired particle moves to the free list. The
    /// caller iterating with a forward index must revisit `index` afterwards.
    pub fn recycle(&mut self, index: usize) {
        let Some(last) = self.active.pop() else {
            return;
        };
        let retired = if index < self.active.len() {
            std::mem::replace(&mut self.active[index], last)
        } else {
            last
        };
        self.free.push(retired);
    }

    /// Drop every particle, active and free.
    pub fn reset(&mut self) {
        self.active.clear();
        self.free.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.active.len() >= self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of particles waiting for reuse.
    #[inline]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Active particles in render order.
    pub fn active(&self) -> &[Particle] {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut [Particle] {
        &mut self.active
    }

    pub fn free(&self) -> &[Particle] {
        &self.free
    }
}
