use glam::{Mat4, UVec2, Vec3};

use crate::scene::input::{FrameInput, Key};
use crate::settings::CameraSettings;

const PITCH_LIMIT: f32 = 89.0;
const MIN_FOV: f32 = 1.0;
const MAX_FOV: f32 = 60.0;

/// Fly camera with a front/up basis and perspective projection.
///
/// Every setter recomputes the cached matrices it affects, so `view` and
/// `projection` are always consistent with the parameters.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    /// Degrees.
    yaw: f32,
    /// Degrees, clamped to ±89.
    pitch: f32,
    /// Vertical field of view in degrees.
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    pub speed: f32,
    pub sensitivity: f32,

    view: Mat4,
    projection: Mat4,
}

impl Camera {
    #[must_use]
    pub fn new(settings: &CameraSettings, viewport: UVec2) -> Self {
        let position = Vec3::from_array(settings.position);
        let front = Vec3::from_array(settings.front).normalize_or(Vec3::NEG_Z);
        let pitch = front.y.clamp(-1.0, 1.0).asin().to_degrees();
        let yaw = front.z.atan2(front.x).to_degrees();

        let mut camera = Self {
            position,
            front,
            up: Vec3::Y,
            yaw,
            pitch,
            fov: settings.fov,
            aspect: aspect_of(viewport),
            near: settings.near,
            far: settings.far,
            speed: settings.speed,
            sensitivity: settings.sensitivity,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view();
        camera.update_projection();
        camera
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    #[inline]
    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    #[must_use]
    pub fn fov(&self) -> f32 {
        self.fov
    }

    #[inline]
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    #[inline]
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// View-projection without the camera translation, for the skybox.
    #[must_use]
    pub fn rotation_view_projection(&self) -> Mat4 {
        let rotation_only = Mat4::look_at_rh(Vec3::ZERO, self.front, self.up);
        self.projection * rotation_only
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_view();
    }

    /// Recomputes the aspect ratio for a new viewport size.
    pub fn set_viewport(&mut self, size: UVec2) {
        self.aspect = aspect_of(size);
        self.update_projection();
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(MIN_FOV, MAX_FOV);
        self.update_projection();
    }

    /// Applies yaw/pitch deltas in degrees.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.front = front_from_angles(self.yaw, self.pitch);
        self.update_view();
    }

    /// WASD/QE movement, right-drag look and scroll zoom.
    pub fn update(&mut self, input: &FrameInput) {
        let step = self.speed * input.delta_time;
        let right = self.front.cross(self.up).normalize_or_zero();

        let mut offset = Vec3::ZERO;
        let held = |key| input.key(key).is_held();
        if held(Key::W) {
            offset += self.front;
        }
        if held(Key::S) {
            offset -= self.front;
        }
        if held(Key::D) {
            offset += right;
        }
        if held(Key::A) {
            offset -= right;
        }
        if held(Key::E) {
            offset += self.up;
        }
        if held(Key::Q) {
            offset -= self.up;
        }
        self.position += offset * step;

        if input.right_mouse.is_held() {
            let delta = input.mouse_delta * self.sensitivity;
            self.rotate(delta.x, -delta.y);
        } else {
            self.update_view();
        }

        if input.scroll_delta.y != 0.0 {
            self.set_fov(self.fov - input.scroll_delta.y);
        }
    }

    /// Camera mirrored about the horizontal plane `y = height`.
    ///
    /// Height above the plane and pitch are negated and the basis is
    /// re-derived, which is what a planar reflection needs.
    #[must_use]
    pub fn mirrored(&self, height: f32) -> Self {
        let mut mirrored = self.clone();
        mirrored.position.y = 2.0 * height - self.position.y;
        mirrored.pitch = -self.pitch;
        mirrored.front = front_from_angles(mirrored.yaw, mirrored.pitch);
        mirrored.update_view();
        mirrored
    }

    fn update_view(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.position + self.front, self.up);
    }

    fn update_projection(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far);
    }
}

fn front_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
}

fn aspect_of(size: UVec2) -> f32 {
    size.x.max(1) as f32 / size.y.max(1) as f32
}
