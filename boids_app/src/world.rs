//! Simulation state: the free-flying player camera and the scenery it flies through

use flock_render::foundation::math::utils::deg_to_rad;
use flock_render::prelude::*;

/// Pitch is held inside this range so the view never flips over
pub const PITCH_LIMIT: f32 = 89.5;

/// One frame of player input, already reduced from window events
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Cursor travel since the previous frame, in pixels
    pub mouse_delta: (f64, f64),
    /// Wheel travel since the previous frame
    pub scroll: f64,
}

/// Free-flying camera with momentum
///
/// Velocity is added to the position once per tick; acceleration and
/// braking are scaled by the frame time.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub position: Vec3,
    pub velocity: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub fov: f32,
    pub accel: f32,
    pub decel: f32,
    pub max_speed: f32,
    pub min_speed: f32,
    pub sensitivity: f32,
    pub inverted: bool,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            velocity: Vec3::zeros(),
            pitch: 0.0,
            yaw: 0.0,
            fov: 70.0,
            accel: 0.3,
            decel: -0.8,
            max_speed: 0.5,
            min_speed: 0.001,
            sensitivity: 0.3,
            inverted: true,
        }
    }
}

impl Player {
    /// Apply mouse look, then thrust or braking, then move
    pub fn update(&mut self, delta_time: f32, controls: &Controls, captured: bool) {
        if captured {
            self.look(controls);
        }

        let yaw = deg_to_rad(self.yaw);
        let forward = Vec3::new(yaw.cos(), 0.0, yaw.sin());
        let right = forward.cross(&Vec3::y());
        let up = Vec3::y();

        let mut thrust = Vec3::zeros();
        if captured {
            for (held, direction) in [
                (controls.forward, forward),
                (controls.backward, -forward),
                (controls.right, right),
                (controls.left, -right),
                (controls.up, up),
                (controls.down, -up),
            ] {
                if held {
                    thrust += direction;
                }
            }
        }

        // Opposing keys cancel out, which counts as coasting. Braking never
        // reverses the direction of travel.
        if thrust.norm() < 0.9 {
            let speed = self.velocity.norm();
            let step = delta_time * (speed / self.max_speed + 0.2) * self.decel;
            if -step >= speed {
                self.velocity = Vec3::zeros();
            } else {
                self.velocity += self.velocity / speed * step;
            }
        } else {
            self.velocity += thrust.normalize() * (delta_time * self.accel);
        }

        let speed = self.velocity.norm();
        if speed > self.max_speed {
            self.velocity *= self.max_speed / speed;
        }
        if speed < self.min_speed {
            self.velocity = Vec3::zeros();
        }

        self.position += self.velocity;
    }

    fn look(&mut self, controls: &Controls) {
        let (dx, dy) = controls.mouse_delta;
        let dy = dy as f32 * self.sensitivity;
        if self.inverted {
            self.pitch -= dy;
        } else {
            self.pitch += dy;
        }
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw += dx as f32 * self.sensitivity;

        // Scrolling up makes the ship gentler, down makes it twitchier.
        if controls.scroll > 0.0 {
            self.accel *= 0.8;
        } else if controls.scroll < 0.0 {
            self.accel /= 0.8;
        }
    }

    /// Push this player's view into the renderer's camera
    pub fn apply_to<D: GraphicsDevice>(&self, renderer: &mut Renderer<D>) {
        renderer.update_camera(self.pitch, self.yaw, self.fov, 0.0, self.position);
    }
}

/// Cubes spinning in a ring around the origin, plus an optional textured quad
pub struct Scenery {
    ring: Vec<(Handle<Model>, Vec3)>,
    billboard: Option<Handle<Model>>,
    elapsed: f32,
}

const QUAD_POSITIONS: [f32; 12] = [-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0];
const QUAD_UVS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

impl Scenery {
    /// Create the ring models, and a quad showing `texture` when given
    ///
    /// # Errors
    /// Propagates any renderer failure; models created before it are left
    /// for the renderer to release on drop.
    pub fn build<D: GraphicsDevice>(
        renderer: &mut Renderer<D>,
        ring_size: usize,
        radius: f32,
        texture: Option<Handle<Texture>>,
    ) -> RenderResult<Self> {
        let defaults = *renderer.defaults();
        let mut ring = Vec::with_capacity(ring_size);
        for i in 0..ring_size {
            let angle = std::f32::consts::TAU * i as f32 / ring_size as f32;
            let base = Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius);
            let template = Model::new(defaults.test_mesh, defaults.error_texture, defaults.color_shader)
                .with_position(base);
            ring.push((renderer.create_model(&template, true)?, base));
        }

        let billboard = match texture {
            Some(texture) => {
                let quad = renderer.create_mesh(&MeshData::new(&QUAD_POSITIONS, &QUAD_INDICES).with_uvs(&QUAD_UVS))?;
                let template = Model::new(quad, texture, defaults.texture_shader)
                    .with_position(Vec3::new(0.0, 2.0, 0.0))
                    .with_scale(Vec3::repeat(1.5));
                Some(renderer.create_model(&template, true)?)
            }
            None => None,
        };

        Ok(Self {
            ring,
            billboard,
            elapsed: 0.0,
        })
    }

    /// Spin every ring model about its own vertical axis
    ///
    /// # Errors
    /// Fails with [`RenderError::InvalidHandle`] if a ring model has been
    /// released behind the scenery's back.
    pub fn tick<D: GraphicsDevice>(&mut self, renderer: &mut Renderer<D>, delta_time: f32) -> RenderResult<()> {
        self.elapsed += delta_time;
        for (i, &(model, base)) in self.ring.iter().enumerate() {
            let phase = i as f32 * 0.5;
            let rotation = Vec3::new(0.0, self.elapsed + phase, (self.elapsed * 0.5).sin() * 0.3);
            let bob = base + Vec3::y() * ((self.elapsed + phase).sin() * 0.5);
            renderer.update_model_transform(model, bob, rotation, Vec3::repeat(0.5))?;
        }
        Ok(())
    }

    /// Number of models this scenery owns
    pub fn model_count(&self) -> usize {
        self.ring.len() + usize::from(self.billboard.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn held_forward() -> Controls {
        Controls {
            forward: true,
            ..Controls::default()
        }
    }

    #[test]
    fn test_thrust_accelerates_along_yaw() {
        let mut player = Player::default();
        player.update(1.0, &held_forward(), true);
        assert_relative_eq!(player.velocity, Vec3::new(0.3, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(player.position, Vec3::new(0.3, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_speed_is_capped() {
        let mut player = Player::default();
        for _ in 0..10 {
            player.update(1.0, &held_forward(), true);
        }
        assert_relative_eq!(player.velocity.norm(), player.max_speed, epsilon = 1e-5);
    }

    #[test]
    fn test_coasting_brakes_to_a_stop() {
        let mut player = Player::default();
        player.update(1.0, &held_forward(), true);
        for _ in 0..200 {
            player.update(0.05, &Controls::default(), true);
        }
        assert_eq!(player.velocity, Vec3::zeros());
    }

    #[test]
    fn test_opposing_keys_coast() {
        let mut player = Player::default();
        let both = Controls {
            forward: true,
            backward: true,
            ..Controls::default()
        };
        player.update(1.0, &both, true);
        assert_eq!(player.velocity, Vec3::zeros());
    }

    #[test]
    fn test_pitch_clamped_and_inverted() {
        let mut player = Player::default();
        let look = Controls {
            mouse_delta: (10.0, 1000.0),
            ..Controls::default()
        };
        player.update(0.0, &look, true);
        assert_relative_eq!(player.pitch, -PITCH_LIMIT);
        assert_relative_eq!(player.yaw, 3.0);
    }

    #[test]
    fn test_released_cursor_ignores_input() {
        let mut player = Player::default();
        let look = Controls {
            forward: true,
            mouse_delta: (50.0, 50.0),
            ..Controls::default()
        };
        player.update(1.0, &look, false);
        assert_eq!(player.yaw, 0.0);
        assert_eq!(player.velocity, Vec3::zeros());
    }

    #[test]
    fn test_scroll_scales_acceleration() {
        let mut player = Player::default();
        let scroll_up = Controls {
            scroll: 1.0,
            ..Controls::default()
        };
        player.update(0.0, &scroll_up, true);
        assert_relative_eq!(player.accel, 0.24, epsilon = 1e-6);
    }

    #[test]
    fn test_scenery_spins_ring_models() {
        let mut renderer = Renderer::new(HeadlessDevice::new(), RendererConfig::default()).unwrap();
        let mut scenery = Scenery::build(&mut renderer, 4, 3.0, None).unwrap();
        assert_eq!(scenery.model_count(), 4);

        scenery.tick(&mut renderer, 1.0).unwrap();
        let first = renderer.get_model(scenery.ring[0].0).unwrap();
        assert_relative_eq!(first.rotation.y, 1.0);
        assert_relative_eq!(first.position.x, 3.0, epsilon = 1e-5);

        // Ring plus the hidden test model.
        assert_eq!(renderer.draw(1.0).batch.draw_calls, 4);
    }

    #[test]
    fn test_scenery_with_texture_adds_billboard() {
        let mut renderer = Renderer::new(HeadlessDevice::new(), RendererConfig::default()).unwrap();
        let texture = renderer.defaults().error_texture;
        let scenery = Scenery::build(&mut renderer, 2, 3.0, Some(texture)).unwrap();
        assert_eq!(scenery.model_count(), 3);
        assert_eq!(renderer.draw(0.0).batch.draw_calls, 3);
    }
}
