//! Integration tests for particle system behavior.
//!
//! These drive systems through the public API only, the way a host engine
//! would: one step per frame, then a render call.

use emberfall::prelude::*;
use emberfall::StepOutcome;

fn point_system(config: ParticleSystemConfig) -> ParticleSystem {
    ParticleSystem::new(config.with_emitter(EmitterAnchor::Point(Vec3::ZERO)).with_seed(11))
}

fn step(system: &mut ParticleSystem, frame: u64) -> StepOutcome {
    system.step(&FrameContext::new(1.0, frame))
}

// ============================================================================
// Emission
// ============================================================================

#[test]
fn test_capacity_caps_same_step_emission() {
    // Emitted then expired within the same step.
    let mut system = point_system(
        ParticleSystemConfig::new("burst", 2)
            .with_emit_rate(100.0)
            .with_update_speed(1.0)
            .with_life_time(0.02, 0.02),
    );
    system.start();

    let outcome = step(&mut system, 1);

    assert_eq!(outcome.emitted, 2);
    assert_eq!(outcome.recycled, 2);
    assert!(system.particles().is_empty());
    assert!(!system.is_alive());
    assert!(system.is_started());
}

#[test]
fn test_rate_converges() {
    let rate = 37.0;
    let update_speed = 0.01;
    let frames = 600u64;
    let mut system = point_system(
        ParticleSystemConfig::new("steady", 100_000)
            .with_emit_rate(rate)
            .with_update_speed(update_speed)
            .with_life_time(1_000.0, 1_000.0),
    );
    system.start();

    let emitted: usize = (1..=frames).map(|frame| step(&mut system, frame).emitted).sum();

    let expected = rate * update_speed * frames as f32;
    assert!((emitted as f32 - expected).abs() <= 1.0, "emitted {emitted}, expected {expected}");
}

#[test]
fn test_pool_never_exceeds_capacity() {
    let mut system = point_system(
        ParticleSystemConfig::new("flood", 64)
            .with_emit_rate(10_000.0)
            .with_update_speed(0.01)
            .with_life_time(0.05, 0.3),
    );
    system.start();

    for frame in 1..200 {
        step(&mut system, frame);
        assert!(system.particles().len() <= 64);
        assert!(system.particles().len() + system.pool().free_len() <= 64);
    }
}

// ============================================================================
// Lifetime
// ============================================================================

#[test]
fn test_particle_lives_ceil_life_over_step() {
    // (life, step, steps until recycled), emission step included.
    let cases = [
        (0.9, 0.25, 4),
        (0.7, 0.2, 4),
        (1.0, 0.1, 10),
        (2.0, 0.3, 7),
        (1.2, 0.05, 24),
        (1.25, 0.05, 25),
        (1.5, 0.05, 30),
    ];

    for (life, update_speed, expected) in cases {
        let mut system = point_system(
            ParticleSystemConfig::new("one", 1)
                .with_manual_emit_count(1)
                .with_update_speed(update_speed)
                .with_life_time(life, life),
        );
        system.start();

        for frame in 1..expected {
            let outcome = step(&mut system, frame);
            assert_eq!(outcome.recycled, 0, "life {life} step {update_speed}: recycled at frame {frame}");
            assert_eq!(system.particles().len(), 1);
        }
        let last = step(&mut system, expected);
        assert_eq!(last.recycled, 1, "life {life} step {update_speed}: alive after frame {expected}");
        assert!(system.particles().is_empty());
    }
}

#[test]
fn test_stop_then_natural_end() {
    let mut system = point_system(
        ParticleSystemConfig::new("fade", 100)
            .with_emit_rate(8.0)
            .with_update_speed(0.25)
            .with_life_time(1.0, 1.0),
    );
    system.start();
    step(&mut system, 1);
    step(&mut system, 2);
    system.stop();

    let mut frame = 3;
    while !system.is_stopped() {
        let outcome = step(&mut system, frame);
        assert_eq!(outcome.emitted, 0);
        frame += 1;
        assert!(frame < 20, "system never ended");
    }
    assert!(system.particles().is_empty());

    // Stopped systems ignore steps.
    assert_eq!(step(&mut system, frame + 1), StepOutcome::default());
}

#[test]
fn test_restart_after_end() {
    let mut system = point_system(
        ParticleSystemConfig::new("again", 10)
            .with_emit_rate(4.0)
            .with_update_speed(0.25)
            .with_life_time(0.5, 0.5)
            .with_target_stop_duration(0.5),
    );
    system.start();
    for frame in 1..10 {
        step(&mut system, frame);
    }
    assert!(system.is_stopped());

    system.start();
    assert_eq!(step(&mut system, 10).emitted, 1);
}

// ============================================================================
// Color
// ============================================================================

#[test]
fn test_gradient_sampled_by_age() {
    let mut system = point_system(
        ParticleSystemConfig::new("grad", 1)
            .with_manual_emit_count(1)
            .with_update_speed(0.25)
            .with_life_time(1.0, 1.0)
            .with_color_gradient(1.0, Vec4::new(0.0, 1.0, 0.0, 0.0))
            .with_color_gradient(0.0, Vec4::new(1.0, 0.0, 0.0, 1.0)),
    );
    system.start();

    step(&mut system, 1);
    assert_eq!(system.particles()[0].color, Vec4::new(0.75, 0.25, 0.0, 0.75));
    step(&mut system, 2);
    assert_eq!(system.particles()[0].color, Vec4::new(0.5, 0.5, 0.0, 0.5));
}

#[test]
fn test_alpha_never_negative() {
    let mut system = point_system(
        ParticleSystemConfig::new("fade", 50)
            .with_emit_rate(20.0)
            .with_update_speed(0.1)
            .with_life_time(0.5, 2.0)
            .with_colors(Vec4::ONE, Vec4::new(1.0, 1.0, 1.0, 0.2), Vec4::new(0.0, 0.0, 0.0, -3.0)),
    );
    system.start();

    for frame in 1..100 {
        step(&mut system, frame);
        assert!(system.particles().iter().all(|p| p.color.w >= 0.0));
    }
}

// ============================================================================
// Shapes and persistence
// ============================================================================

#[test]
fn test_sphere_particles_start_inside_radius() {
    let center = Vec3::new(5.0, 0.0, -2.0);
    let mut system = ParticleSystem::new(
        ParticleSystemConfig::new("ball", 500)
            .with_emitter(EmitterAnchor::Point(center))
            .with_shape(EmitterShape::Sphere {
                radius: 2.0,
                direction_randomizer: 0.0,
            })
            .with_manual_emit_count(500)
            .with_update_speed(0.0)
            .with_seed(4),
    );
    system.start();
    step(&mut system, 1);

    assert_eq!(system.particles().len(), 500);
    for p in system.particles() {
        assert!(p.position.distance(center) <= 2.0 + 1e-4);
        assert!((p.direction.length() - 1.0).abs() < 1e-3);
    }
}

#[test]
fn test_saved_config_replays_identically() {
    let config = presets::fire(Vec3::new(0.0, 1.0, 0.0), 50.0).with_seed(99);
    let restored = ParticleSystemConfig::from_json(&config.to_json().unwrap()).unwrap();

    let mut a = ParticleSystem::new(config);
    let mut b = ParticleSystem::new(restored);
    a.start();
    b.start();
    for frame in 1..30 {
        step(&mut a, frame);
        step(&mut b, frame);
    }

    assert_eq!(a.particles(), b.particles());
    assert_eq!(a.vertex_data(), b.vertex_data());
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_instanced_draw_call() {
    let mut system = point_system(
        ParticleSystemConfig::new("draw", 10)
            .with_manual_emit_count(4)
            .with_life_time(10.0, 10.0)
            .with_blend_mode(BlendMode::Add),
    );
    system.start();
    step(&mut system, 1);

    let mut calls = Vec::new();
    let drawn = system.render(&mut |call: &DrawCall<'_>| {
        calls.push((call.particle_count, call.blend_mode, call.corners.map(|c| c.len()), call.index_count()));
        assert_eq!(call.vertices.len() as u64, 4 * call.layout.stride_bytes());
    });

    assert_eq!(drawn, 4);
    assert_eq!(calls, vec![(4, BlendMode::Add, Some(4), 0)]);
}
