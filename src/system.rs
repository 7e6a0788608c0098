//! Particle system: state machine and per-frame update.
//!
//! A [`ParticleSystem`] owns one [`ParticlePool`], one configuration and one
//! random source. The host drives it with one [`step`](ParticleSystem::step)
//! per frame; each step
//!
//! 1. works out the scaled time step from the host frame ratio,
//! 2. decides how many particles to emit (manual burst or rate with a
//!    fractional carry),
//! 3. emits them, up to the pool capacity,
//! 4. ages every active particle, recycling the ones that expired and
//!    queuing sub-emissions at their death position,
//! 5. packs vertex records for the renderer.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped --start()--> Started --stop()--> Stopping --(no particles left)--> Stopped
//! ```
//!
//! A stopping system emits nothing new but keeps aging its particles until
//! the last one expires.
//!
//! # Example
//!
//! ```ignore
//! let mut system = ParticleSystem::new(
//!     ParticleSystemConfig::new("sparks", 500)
//!         .with_emitter(EmitterAnchor::Point(Vec3::ZERO))
//!         .with_emit_rate(100.0),
//! );
//! system.start();
//!
//! let mut clock = FrameClock::new();
//! loop {
//!     let tick = clock.tick();
//!     system.step(&tick.context(&NoTransforms));
//!     system.render(&mut renderer);
//! }
//! ```

use crate::config::ParticleSystemConfig;
use crate::emitter::{EmitterAnchor, NoTransforms, StartDirectionFn, StartPositionFn, TransformResolver};
use crate::gradient::lerp_color;
use crate::particle::{Particle, SpriteCellPolicy};
use crate::pool::ParticlePool;
use crate::random::ParticleRng;
use crate::render::{DrawCall, ParticleRenderer};
use crate::sub_emitter::SystemId;
use crate::vertex::{quad_indices, QuadCorner, RenderCaps, VertexLayout, QUAD_CORNERS};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Callback fired when a stopping system runs out of particles.
///
/// Receives the system name.
pub type AnimationEndFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-frame input from the host.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    /// Frame time relative to a 60 fps frame (1.0 at 60 fps, 2.0 at 30 fps).
    pub ratio: f32,
    /// Monotonically increasing frame id. A system ignores a second step
    /// with the same id.
    pub frame_id: u64,
    /// Resolves node anchors to world matrices.
    pub transforms: &'a dyn TransformResolver,
}

impl FrameContext<'static> {
    /// Context for hosts without a scene graph.
    pub fn new(ratio: f32, frame_id: u64) -> Self {
        Self {
            ratio,
            frame_id,
            transforms: &NoTransforms,
        }
    }
}

impl<'a> FrameContext<'a> {
    pub fn with_transforms<'b>(self, transforms: &'b dyn TransformResolver) -> FrameContext<'b> {
        FrameContext {
            ratio: self.ratio,
            frame_id: self.frame_id,
            transforms,
        }
    }
}

impl fmt::Debug for FrameContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameContext")
            .field("ratio", &self.ratio)
            .field("frame_id", &self.frame_id)
            .finish_non_exhaustive()
    }
}

/// Run state of a particle system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SystemState {
    /// Idle. Steps do nothing.
    #[default]
    Stopped,
    /// Emitting and updating.
    Started,
    /// No new particles; existing ones age out.
    Stopping,
}

/// What happened during one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Particles emitted this step.
    pub emitted: usize,
    /// Particles that expired and went back to the free stock.
    pub recycled: usize,
    /// Sub-emissions queued by expiring particles.
    pub sub_emissions: usize,
    /// `target_stop_duration` was reached this step.
    pub auto_stopped: bool,
    /// The system went from stopping to stopped this step.
    pub animation_ended: bool,
    /// The system ended and is configured to be disposed.
    pub dispose_requested: bool,
}

/// A sub-emitter template to instantiate at a particle's death position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubEmission {
    /// Index into the configuration's `sub_emitters`.
    pub template: usize,
    /// Where the particle died.
    pub position: Vec3,
}

/// A pool of particles driven by one emitter.
#[derive(Clone)]
pub struct ParticleSystem {
    config: ParticleSystemConfig,
    pool: ParticlePool,
    rng: ParticleRng,
    state: SystemState,
    alive: bool,
    /// Fractional particles carried over between steps.
    emit_excess: f32,
    /// Scaled time spent in the started state.
    run_time: f32,
    last_frame_id: Option<u64>,
    render_ready: bool,
    caps: RenderCaps,
    vertices: Vec<f32>,
    packed_layout: VertexLayout,
    packed_count: usize,
    indices: Vec<u32>,
    start_position_fn: Option<StartPositionFn>,
    start_direction_fn: Option<StartDirectionFn>,
    on_animation_end: Option<AnimationEndFn>,
    pending_sub_emissions: Vec<SubEmission>,
    root: Option<SystemId>,
    active_sub_systems: Vec<SystemId>,
}

impl ParticleSystem {
    /// Create a stopped system using instanced rendering.
    pub fn new(config: ParticleSystemConfig) -> Self {
        Self::with_caps(config, RenderCaps::default())
    }

    /// Create a stopped system for a renderer with the given capabilities.
    ///
    /// The pool capacity and the instancing decision are fixed here.
    pub fn with_caps(config: ParticleSystemConfig, caps: RenderCaps) -> Self {
        let capacity = config.capacity;
        let indices = if caps.instancing {
            Vec::new()
        } else {
            quad_indices(capacity)
        };
        Self {
            rng: ParticleRng::from_seed_option(config.seed),
            pool: ParticlePool::new(capacity),
            state: SystemState::Stopped,
            alive: false,
            emit_excess: 0.0,
            run_time: 0.0,
            last_frame_id: None,
            render_ready: true,
            caps,
            vertices: Vec::new(),
            packed_layout: VertexLayout::for_config(&config, caps),
            packed_count: 0,
            indices,
            start_position_fn: None,
            start_direction_fn: None,
            on_animation_end: None,
            pending_sub_emissions: Vec::new(),
            root: None,
            active_sub_systems: Vec::new(),
            config,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ParticleSystemConfig {
        &self.config
    }

    /// Mutable access to every tunable.
    ///
    /// `capacity` is read only at construction; changing it later has no
    /// effect on the pool.
    pub fn config_mut(&mut self) -> &mut ParticleSystemConfig {
        &mut self.config
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Active particles in render order.
    pub fn particles(&self) -> &[Particle] {
        self.pool.active()
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Started or stopping.
    pub fn is_started(&self) -> bool {
        self.state != SystemState::Stopped
    }

    pub fn is_stopping(&self) -> bool {
        self.state == SystemState::Stopping
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SystemState::Stopped
    }

    /// Whether the last step ended with live particles.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Emitter configured and render resources ready.
    pub fn is_ready(&self) -> bool {
        self.config.emitter.is_some() && self.render_ready
    }

    /// Tell the system whether the host's render resources (texture,
    /// pipeline) are loaded. Vertex packing is skipped while they are not.
    pub fn set_render_ready(&mut self, ready: bool) {
        self.render_ready = ready;
    }

    pub fn render_caps(&self) -> RenderCaps {
        self.caps
    }

    pub fn set_emitter(&mut self, emitter: Option<EmitterAnchor>) {
        self.config.emitter = emitter;
    }

    /// Add a lifetime color keyframe.
    pub fn add_color_gradient(&mut self, ratio: f32, color: Vec4) -> &mut Self {
        self.config.color_gradients.add(ratio, color);
        self
    }

    /// Remove the first keyframe at exactly `ratio`. Missing ratios are ignored.
    pub fn remove_color_gradient(&mut self, ratio: f32) -> &mut Self {
        self.config.color_gradients.remove(ratio);
        self
    }

    /// Replace the shape's start position. `None` restores the shape.
    pub fn set_start_position_fn(&mut self, f: Option<StartPositionFn>) {
        self.start_position_fn = f;
    }

    /// Replace the shape's start direction. `None` restores the shape.
    pub fn set_start_direction_fn(&mut self, f: Option<StartDirectionFn>) {
        self.start_direction_fn = f;
    }

    pub fn set_on_animation_end(&mut self, f: Option<AnimationEndFn>) {
        self.on_animation_end = f;
    }

    /// System that spawned this one through a sub-emitter.
    pub fn root(&self) -> Option<SystemId> {
        self.root
    }

    /// Live systems spawned by this one.
    pub fn active_sub_systems(&self) -> &[SystemId] {
        &self.active_sub_systems
    }

    pub(crate) fn set_root(&mut self, root: Option<SystemId>) {
        self.root = root;
    }

    pub(crate) fn active_sub_systems_mut(&mut self) -> &mut Vec<SystemId> {
        &mut self.active_sub_systems
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start emitting, running any configured pre-warm steps first.
    pub fn start(&mut self) {
        self.start_with(&NoTransforms);
    }

    /// Like [`start`](Self::start), resolving node anchors during pre-warm.
    pub fn start_with(&mut self, transforms: &dyn TransformResolver) {
        self.state = SystemState::Started;
        self.run_time = 0.0;
        self.last_frame_id = None;
        self.discard_undrained_sub_emissions();
        debug!(
            system = %self.config.name,
            pre_warm_cycles = self.config.pre_warm_cycles,
            "particle system started"
        );

        let cycles = self.config.pre_warm_cycles;
        if cycles == 0 {
            return;
        }
        let scaled_step = self.config.update_speed * self.config.pre_warm_step_offset;
        for _ in 0..cycles {
            if self.state == SystemState::Stopped {
                break;
            }
            self.advance(scaled_step, transforms);
        }
        if self.render_ready {
            self.pack_vertices();
        }
    }

    /// Stop emitting. Existing particles keep aging until they expire.
    ///
    /// Child systems are not reached from here; use
    /// [`SystemTree::stop`](crate::SystemTree::stop) to cascade.
    pub fn stop(&mut self) {
        if self.state == SystemState::Started {
            self.state = SystemState::Stopping;
            debug!(system = %self.config.name, particles = self.pool.len(), "particle system stopping");
        }
    }

    /// Drop every particle, active and stocked, and any queued sub-emission.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.pending_sub_emissions.clear();
        self.vertices.clear();
        self.packed_count = 0;
        self.alive = false;
    }

    // =========================================================================
    // UPDATE
    // =========================================================================

    /// Advance the system by one host frame.
    pub fn step(&mut self, frame: &FrameContext<'_>) -> StepOutcome {
        if self.state == SystemState::Stopped || self.config.emitter.is_none() {
            return StepOutcome::default();
        }
        if self.last_frame_id == Some(frame.frame_id) {
            return StepOutcome::default();
        }
        self.last_frame_id = Some(frame.frame_id);
        self.discard_undrained_sub_emissions();

        let scaled_step = self.config.update_speed * frame.ratio;
        let outcome = self.advance(scaled_step, frame.transforms);

        if self.render_ready {
            self.pack_vertices();
        }
        outcome
    }

    fn advance(&mut self, scaled_step: f32, transforms: &dyn TransformResolver) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let mut new_particles = self.new_particle_count(scaled_step);

        if self.state == SystemState::Started {
            self.run_time += scaled_step;
            let target = self.config.target_stop_duration;
            if target > 0.0 && self.run_time >= target {
                self.stop();
                outcome.auto_stopped = true;
            }
        }
        if self.state == SystemState::Stopping {
            new_particles = 0;
        }

        outcome.emitted = self.emit(new_particles, transforms);

        let queued_before = self.pending_sub_emissions.len();
        outcome.recycled = self.age_particles(scaled_step);
        outcome.sub_emissions = self.pending_sub_emissions.len() - queued_before;

        self.alive = !self.pool.is_empty();

        if self.state == SystemState::Stopping && !self.alive {
            self.state = SystemState::Stopped;
            outcome.animation_ended = true;
            outcome.dispose_requested = self.config.dispose_on_stop;
            debug!(system = %self.config.name, "particle system stopped");
            if let Some(on_end) = &self.on_animation_end {
                on_end(&self.config.name);
            }
        }

        trace!(
            system = %self.config.name,
            scaled_step,
            emitted = outcome.emitted,
            recycled = outcome.recycled,
            active = self.pool.len(),
            "particle step"
        );
        outcome
    }

    fn new_particle_count(&mut self, scaled_step: f32) -> usize {
        match self.config.manual_emit_count {
            Some(count) => {
                self.config.manual_emit_count = Some(0);
                self.emit_excess = 0.0;
                count as usize
            }
            None => {
                self.emit_excess += self.config.emit_rate * scaled_step;
                let whole = self.emit_excess.floor();
                self.emit_excess -= whole;
                whole as usize
            }
        }
    }

    fn emit(&mut self, count: usize, transforms: &dyn TransformResolver) -> usize {
        if count == 0 {
            return 0;
        }
        let Some(anchor) = self.config.emitter else {
            return 0;
        };
        let Some(world) = anchor.world_matrix(transforms) else {
            warn!(system = %self.config.name, ?anchor, "emitter transform unresolved, skipping emission");
            return 0;
        };

        let policy = SpriteCellPolicy::for_sheet(self.config.sprite_sheet.as_ref());
        let start_cell = self.config.start_cell();
        let mut emitted = 0;
        for _ in 0..count {
            if self.pool.is_full() {
                break;
            }
            let mut particle = self.pool.acquire(start_cell);
            self.initialize_particle(&mut particle, &world, policy);
            self.pool.push(particle);
            emitted += 1;
        }
        emitted
    }

    fn initialize_particle(&mut self, particle: &mut Particle, world: &Mat4, policy: SpriteCellPolicy) {
        let config = &self.config;
        let rng = &mut self.rng;

        let emit_power = rng.range(config.min_emit_power, config.max_emit_power);

        particle.position = match &self.start_position_fn {
            Some(f) => f(world, particle, rng),
            None => config.shape.start_position(world, particle, rng),
        };
        particle.direction = match &self.start_direction_fn {
            Some(f) => f(world, particle, rng),
            None => config.shape.start_direction(world, particle, rng),
        };

        particle.initial_direction = if emit_power == 0.0 {
            Some(particle.direction)
        } else {
            None
        };
        particle.direction *= emit_power;

        particle.life_time = rng.range(config.min_life_time, config.max_life_time);
        particle.size = rng.range(config.min_size, config.max_size);
        particle.scale = Vec2::new(
            rng.range(config.min_scale_x, config.max_scale_x),
            rng.range(config.min_scale_y, config.max_scale_y),
        );
        particle.angle = 0.0;
        particle.angular_speed = rng.range(config.min_angular_speed, config.max_angular_speed);

        match config.color_gradients.first_color() {
            Some(color) => {
                particle.color = color;
                particle.color_step = Vec4::ZERO;
            }
            None => {
                let blend = rng.range(0.0, 1.0);
                particle.color = lerp_color(config.color1, config.color2, blend);
                particle.color_step = (config.color_dead - particle.color) / particle.life_time;
            }
        }

        particle.sprite_policy = policy;
        particle.frame_counter = 0.0;
    }

    /// Age every active particle, recycling the expired ones.
    ///
    /// Recycling swaps the last particle into the current slot, so the index
    /// only moves forward when the current particle survives.
    fn age_particles(&mut self, scaled_step: f32) -> usize {
        let mut recycled = 0;
        let mut index = 0;
        while index < self.pool.len() {
            let particle = &mut self.pool.active_mut()[index];
            particle.age += scaled_step;

            if particle.is_expired() {
                let position = particle.position;
                self.queue_sub_emission(position);
                self.pool.recycle(index);
                recycled += 1;
                continue;
            }

            update_particle(particle, &self.config, scaled_step);
            index += 1;
        }
        recycled
    }

    fn queue_sub_emission(&mut self, position: Vec3) {
        let templates = self.config.sub_emitters.len();
        if templates == 0 {
            return;
        }
        let template = self.rng.index(templates);
        self.pending_sub_emissions.push(SubEmission { template, position });
    }

    // =========================================================================
    // SUB-EMISSION
    // =========================================================================

    /// Sub-emissions queued by the last step or pre-warm and not yet drained.
    pub fn pending_sub_emissions(&self) -> &[SubEmission] {
        &self.pending_sub_emissions
    }

    /// Take the queued sub-emissions.
    ///
    /// Only the last step's (or the pre-warm's) deaths are kept: the next
    /// step or start discards whatever was not drained.
    /// [`SystemTree`](crate::SystemTree) drains after every step; hosts
    /// driving a lone system can instantiate them with
    /// [`spawn_sub_system`](Self::spawn_sub_system).
    pub fn drain_sub_emissions(&mut self) -> Vec<SubEmission> {
        std::mem::take(&mut self.pending_sub_emissions)
    }

    fn discard_undrained_sub_emissions(&mut self) {
        if !self.pending_sub_emissions.is_empty() {
            trace!(
                system = %self.config.name,
                dropped = self.pending_sub_emissions.len(),
                "undrained sub-emissions dropped"
            );
            self.pending_sub_emissions.clear();
        }
    }

    /// Build the child system for a sub-emission, not yet started.
    ///
    /// Returns `None` when the template index is out of range.
    pub fn spawn_sub_system(&self, emission: &SubEmission) -> Option<ParticleSystem> {
        let template = self.config.sub_emitters.get(emission.template)?;
        let mut config = template.clone();
        config.name = format!("{}_sub", self.config.name);
        config.emitter = Some(EmitterAnchor::Point(emission.position));
        Some(ParticleSystem::with_caps(config, self.caps))
    }

    /// A stopped copy of this system's configuration and overrides,
    /// emitting from `position`. Particles are not copied.
    pub fn clone_at(&self, position: Vec3) -> ParticleSystem {
        let mut config = self.config.clone();
        config.emitter = Some(EmitterAnchor::Point(position));
        let mut system = ParticleSystem::with_caps(config, self.caps);
        system.start_position_fn = self.start_position_fn.clone();
        system.start_direction_fn = self.start_direction_fn.clone();
        system.on_animation_end = self.on_animation_end.clone();
        system.render_ready = self.render_ready;
        system
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    /// Layout the current configuration packs with.
    pub fn vertex_layout(&self) -> VertexLayout {
        VertexLayout::for_config(&self.config, self.caps)
    }

    /// Packed records from the last step.
    pub fn vertex_data(&self) -> &[f32] {
        &self.vertices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Quad index buffer for the whole capacity (indexed layout only).
    pub fn indices(&self) -> Option<&[u32]> {
        (!self.caps.instancing).then_some(self.indices.as_slice())
    }

    fn pack_vertices(&mut self) {
        let layout = self.vertex_layout();
        self.vertices.clear();
        self.vertices
            .reserve(self.pool.len() * layout.vertices_per_particle() * layout.stride_floats());
        for particle in self.pool.active() {
            layout.pack(particle, &mut self.vertices);
        }
        self.packed_layout = layout;
        self.packed_count = self.pool.len();
    }

    /// Hand the last packed frame to `renderer`. Returns the particle count
    /// drawn, 0 when not ready or empty.
    pub fn render(&self, renderer: &mut dyn ParticleRenderer) -> usize {
        if !self.is_ready() || self.packed_count == 0 {
            return 0;
        }
        let layout = self.packed_layout;
        let corners: &'static [QuadCorner] = &QUAD_CORNERS;
        let call = DrawCall {
            layout,
            blend_mode: self.config.blend_mode,
            texture_mask: self.config.texture_mask,
            sprite_sheet: self.config.sprite_sheet.as_ref(),
            vertices: self.vertex_bytes(),
            indices: (!layout.instanced).then(|| &self.indices[..self.packed_count * 6]),
            corners: layout.instanced.then_some(corners),
            particle_count: self.packed_count,
        };
        renderer.draw(&call);
        self.packed_count
    }
}

/// Advance one surviving particle by `scaled_step`.
fn update_particle(particle: &mut Particle, config: &ParticleSystemConfig, scaled_step: f32) {
    if config.color_gradients.is_empty() {
        particle.color += particle.color_step * scaled_step;
        if particle.color.w < 0.0 {
            particle.color.w = 0.0;
        }
    } else if let Some(color) = config.color_gradients.sample(particle.ratio()) {
        particle.color = color;
    }

    particle.angle += particle.angular_speed * scaled_step;
    particle.position += particle.direction * scaled_step;
    particle.direction += config.gravity * scaled_step;

    if let Some(sheet) = &config.sprite_sheet {
        particle.update_cell_index(sheet, scaled_step);
    }
}

impl fmt::Debug for ParticleSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("active", &self.pool.len())
            .field("free", &self.pool.free_len())
            .field("capacity", &self.pool.capacity())
            .field("root", &self.root)
            .field("active_sub_systems", &self.active_sub_systems)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpriteSheet;
    use crate::emitter::EmitterShape;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn point_config(capacity: usize) -> ParticleSystemConfig {
        ParticleSystemConfig::new("test", capacity)
            .with_emitter(EmitterAnchor::Point(Vec3::ZERO))
            .with_seed(1)
    }

    fn frames(system: &mut ParticleSystem, from: u64, count: u64, ratio: f32) -> Vec<StepOutcome> {
        (from..from + count)
            .map(|id| system.step(&FrameContext::new(ratio, id)))
            .collect()
    }

    #[test]
    fn test_step_before_start_is_noop() {
        let mut system = ParticleSystem::new(point_config(10).with_emit_rate(100.0));
        let outcome = system.step(&FrameContext::new(1.0, 1));
        assert_eq!(outcome, StepOutcome::default());
        assert!(system.particles().is_empty());
    }

    #[test]
    fn test_missing_emitter_is_not_ready() {
        let mut config = point_config(10).with_emit_rate(100.0).with_update_speed(1.0);
        config.emitter = None;
        let mut system = ParticleSystem::new(config);
        system.start();

        assert!(!system.is_ready());
        assert_eq!(system.step(&FrameContext::new(1.0, 1)), StepOutcome::default());
    }

    #[test]
    fn test_same_frame_id_steps_once() {
        let mut system = ParticleSystem::new(point_config(100).with_emit_rate(10.0).with_update_speed(1.0));
        system.start();

        let first = system.step(&FrameContext::new(1.0, 7));
        let second = system.step(&FrameContext::new(1.0, 7));
        assert_eq!(first.emitted, 10);
        assert_eq!(second, StepOutcome::default());
        assert_eq!(system.particles().len(), 10);
    }

    #[test]
    fn test_fractional_emission_carries() {
        let mut system = ParticleSystem::new(
            point_config(1_000)
                .with_emit_rate(0.5)
                .with_update_speed(1.0)
                .with_life_time(100.0, 100.0),
        );
        system.start();

        let emitted: Vec<usize> = frames(&mut system, 1, 4, 1.0).iter().map(|o| o.emitted).collect();
        assert_eq!(emitted, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_manual_emit_count_is_one_shot() {
        let mut system = ParticleSystem::new(
            point_config(100)
                .with_emit_rate(1_000.0)
                .with_update_speed(0.1)
                .with_life_time(100.0, 100.0)
                .with_manual_emit_count(7),
        );
        system.start();

        let outcomes = frames(&mut system, 1, 3, 1.0);
        assert_eq!(outcomes[0].emitted, 7);
        assert_eq!(outcomes[1].emitted, 0);
        assert_eq!(outcomes[2].emitted, 0);
        assert_eq!(system.config().manual_emit_count, Some(0));

        system.config_mut().manual_emit_count = None;
        let outcome = system.step(&FrameContext::new(1.0, 10));
        assert_eq!(outcome.emitted, 100 - 7);
    }

    #[test]
    fn test_emission_respects_capacity() {
        let mut system = ParticleSystem::new(
            point_config(5)
                .with_emit_rate(1_000.0)
                .with_update_speed(1.0)
                .with_life_time(100.0, 100.0),
        );
        system.start();

        for outcome in frames(&mut system, 1, 5, 1.0) {
            assert!(system.particles().len() <= 5);
            assert!(outcome.emitted <= 5);
        }
        assert_eq!(system.particles().len(), 5);
    }

    #[test]
    fn test_kinematics_and_gravity() {
        let mut system = ParticleSystem::new(
            point_config(1)
                .with_manual_emit_count(1)
                .with_update_speed(0.5)
                .with_life_time(10.0, 10.0)
                .with_emit_power(2.0, 2.0)
                .with_angular_speed(1.0, 1.0)
                .with_gravity(Vec3::new(0.0, -1.0, 0.0))
                .with_shape(EmitterShape::Box {
                    direction1: Vec3::X,
                    direction2: Vec3::X,
                    min_emit_box: Vec3::ZERO,
                    max_emit_box: Vec3::ZERO,
                }),
        );
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        let p = &system.particles()[0];
        assert_eq!(p.age, 0.5);
        assert_eq!(p.position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(p.direction, Vec3::new(2.0, -0.5, 0.0));
        assert_eq!(p.angle, 0.5);
        assert_eq!(p.initial_direction, None);
    }

    #[test]
    fn test_zero_power_caches_direction() {
        let mut system = ParticleSystem::new(
            point_config(1)
                .with_manual_emit_count(1)
                .with_emit_power(0.0, 0.0)
                .with_life_time(10.0, 10.0),
        );
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        let p = &system.particles()[0];
        assert_eq!(p.direction, Vec3::ZERO);
        assert_eq!(p.initial_direction, Some(Vec3::Y));
    }

    #[test]
    fn test_color_step_reaches_dead_color_and_clamps_alpha() {
        let mut system = ParticleSystem::new(
            point_config(1)
                .with_manual_emit_count(1)
                .with_update_speed(0.25)
                .with_life_time(1.0, 1.0)
                .with_colors(Vec4::ONE, Vec4::ONE, Vec4::new(0.0, 0.0, 0.0, -1.0)),
        );
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        let p = &system.particles()[0];
        assert!(p.color_step.abs_diff_eq(Vec4::new(-1.0, -1.0, -1.0, -2.0), 1e-5));
        assert!(p.color.abs_diff_eq(Vec4::new(0.75, 0.75, 0.75, 0.5), 1e-5));

        system.step(&FrameContext::new(1.0, 2));
        system.step(&FrameContext::new(1.0, 3));
        let p = &system.particles()[0];
        assert_eq!(p.color.w, 0.0);
        assert!((p.color.x - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_drives_color() {
        let mut system = ParticleSystem::new(
            point_config(1)
                .with_manual_emit_count(1)
                .with_update_speed(0.5)
                .with_life_time(1.0, 1.0)
                .with_color_gradient(0.0, Vec4::new(1.0, 0.0, 0.0, 1.0))
                .with_color_gradient(1.0, Vec4::new(0.0, 0.0, 1.0, 1.0)),
        );
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        assert_eq!(system.particles()[0].color, Vec4::new(0.5, 0.0, 0.5, 1.0));
    }

    #[test]
    fn test_add_and_remove_gradient_on_system() {
        let mut system = ParticleSystem::new(point_config(1));
        system
            .add_color_gradient(1.0, Vec4::ZERO)
            .add_color_gradient(0.0, Vec4::ONE)
            .remove_color_gradient(0.5);
        assert_eq!(system.config().color_gradients.len(), 2);
        system.remove_color_gradient(1.0);
        assert_eq!(system.config().color_gradients.len(), 1);
    }

    #[test]
    fn test_stop_winds_down_then_ends() {
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = ended.clone();
        let mut system = ParticleSystem::new(
            point_config(100)
                .with_emit_rate(10.0)
                .with_update_speed(0.25)
                .with_life_time(1.0, 1.0)
                .with_dispose_on_stop(true),
        );
        system.set_on_animation_end(Some(Arc::new(move |_name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        system.start();
        system.step(&FrameContext::new(1.0, 1));
        assert!(system.is_alive());

        system.stop();
        assert_eq!(system.state(), SystemState::Stopping);

        let outcomes = frames(&mut system, 2, 2, 1.0);
        assert!(outcomes.iter().all(|o| o.emitted == 0));
        assert!(outcomes.iter().all(|o| !o.animation_ended));
        assert!(system.is_stopping());

        let last = system.step(&FrameContext::new(1.0, 4));
        assert!(last.animation_ended);
        assert!(last.dispose_requested);
        assert!(system.is_stopped());
        assert!(!system.is_alive());
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_target_stop_duration() {
        let mut system = ParticleSystem::new(
            point_config(100)
                .with_emit_rate(4.0)
                .with_update_speed(0.25)
                .with_life_time(0.25, 0.25)
                .with_target_stop_duration(0.5),
        );
        system.start();

        let outcomes = frames(&mut system, 1, 3, 1.0);
        assert!(!outcomes[0].auto_stopped);
        assert!(outcomes[1].auto_stopped);
        assert_eq!(outcomes[1].emitted, 0);
        assert!(outcomes[1].animation_ended);
        assert!(system.is_stopped());
    }

    #[test]
    fn test_pre_warm_runs_without_frames() {
        let mut system = ParticleSystem::new(
            point_config(100)
                .with_emit_rate(1.0)
                .with_update_speed(1.0)
                .with_life_time(100.0, 100.0)
                .with_pre_warm(5, 2.0),
        );
        system.start();

        assert_eq!(system.particles().len(), 10);
        assert!(system.particles().iter().any(|p| p.age > 0.0));
        assert!(!system.vertex_data().is_empty());
    }

    #[test]
    fn test_sprite_cell_starts_at_configured_cell() {
        let mut system = ParticleSystem::new(
            point_config(4)
                .with_manual_emit_count(1)
                .with_life_time(10.0, 10.0)
                .with_sprite_sheet(SpriteSheet {
                    start_cell: 3,
                    end_cell: 8,
                    change_speed: 5.0,
                    ..SpriteSheet::default()
                }),
        );
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        let p = &system.particles()[0];
        assert_eq!(p.cell_index, 3);
        assert_eq!(p.sprite_policy(), SpriteCellPolicy::Custom);
    }

    #[test]
    fn test_start_position_override_wins() {
        let mut system = ParticleSystem::new(
            point_config(1)
                .with_manual_emit_count(1)
                .with_update_speed(0.0)
                .with_life_time(10.0, 10.0),
        );
        system.set_start_position_fn(Some(Arc::new(|world: &Mat4, _p: &Particle, _rng: &mut ParticleRng| {
            world.transform_point3(Vec3::new(0.0, 42.0, 0.0))
        })));
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        assert_eq!(system.particles()[0].position, Vec3::new(0.0, 42.0, 0.0));
    }

    #[test]
    fn test_node_anchor_resolved_per_frame() {
        let mut config = point_config(10).with_manual_emit_count(1).with_update_speed(0.0);
        config.emitter = Some(EmitterAnchor::Node(crate::emitter::NodeId(1)));
        config.shape = EmitterShape::Box {
            direction1: Vec3::Y,
            direction2: Vec3::Y,
            min_emit_box: Vec3::ZERO,
            max_emit_box: Vec3::ZERO,
        };
        let mut system = ParticleSystem::new(config);
        system.start();

        // Unresolvable node: emission skipped.
        assert_eq!(system.step(&FrameContext::new(1.0, 1)).emitted, 0);

        system.config_mut().manual_emit_count = Some(1);
        let scene = |_node: crate::emitter::NodeId| Some(Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)));
        let frame = FrameContext::new(1.0, 2).with_transforms(&scene);
        assert_eq!(system.step(&frame).emitted, 1);
        assert_eq!(system.particles()[0].position, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_render_hands_packed_data() {
        let mut system = ParticleSystem::with_caps(
            point_config(8)
                .with_manual_emit_count(3)
                .with_life_time(10.0, 10.0),
            RenderCaps { instancing: false },
        );
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        let mut seen = Vec::new();
        let drawn = system.render(&mut |call: &DrawCall<'_>| {
            seen.push((call.particle_count, call.index_count(), call.vertices.len(), call.indices.map(|i| i.len())));
        });

        let stride = system.vertex_layout().stride_bytes() as usize;
        assert_eq!(drawn, 3);
        assert_eq!(seen, vec![(3, 18, 3 * 4 * stride, Some(18))]);
    }

    #[test]
    fn test_not_ready_skips_packing_and_render() {
        let mut system = ParticleSystem::new(point_config(8).with_manual_emit_count(2).with_life_time(10.0, 10.0));
        system.set_render_ready(false);
        system.start();
        system.step(&FrameContext::new(1.0, 1));

        assert_eq!(system.particles().len(), 2);
        assert!(system.vertex_data().is_empty());
        let mut draws = 0;
        assert_eq!(system.render(&mut |_call: &DrawCall<'_>| draws += 1), 0);
        assert_eq!(draws, 0);
    }

    #[test]
    fn test_reset_clears_pool() {
        let mut system = ParticleSystem::new(point_config(8).with_manual_emit_count(4).with_life_time(10.0, 10.0));
        system.start();
        system.step(&FrameContext::new(1.0, 1));
        system.reset();

        assert!(system.particles().is_empty());
        assert_eq!(system.pool().free_len(), 0);
    }

    #[test]
    fn test_undrained_sub_emissions_do_not_pile_up() {
        let mut system = ParticleSystem::new(
            point_config(100)
                .with_emit_rate(50.0)
                .with_update_speed(0.1)
                .with_life_time(0.5, 0.5)
                .with_sub_emitter(ParticleSystemConfig::new("spark", 4)),
        );
        system.start();

        let mut deaths = 0;
        for outcome in frames(&mut system, 1, 1_000, 1.0) {
            deaths += outcome.sub_emissions;
            assert_eq!(system.pending_sub_emissions().len(), outcome.sub_emissions);
            assert!(system.pending_sub_emissions().len() <= system.capacity());
        }
        assert!(deaths > 1_000);

        let last = system.pending_sub_emissions().len();
        assert_eq!(system.drain_sub_emissions().len(), last);
        assert!(system.pending_sub_emissions().is_empty());
    }

    #[test]
    fn test_clone_at_moves_emitter_only() {
        let system = ParticleSystem::new(point_config(8).with_emit_rate(3.0));
        let clone = system.clone_at(Vec3::new(1.0, 1.0, 1.0));

        assert_eq!(clone.config().emitter, Some(EmitterAnchor::Point(Vec3::ONE)));
        assert_eq!(clone.config().emit_rate, 3.0);
        assert!(clone.is_stopped());
    }
}
