//! The playable level state: loads a level description from JSON, flies a
//! free-look camera through it, and draws its cubes, models, and light.

use std::fs;
use std::path::{Path, PathBuf};

use glam::{IVec2, Mat4, Vec2, Vec3, Vec4};
use keel_core::Action;
use keel_platform::MouseMode;
use keel_render::{GlyphDraw, Material, Renderer, TextureHandle};
use keel_runtime::{AppState, SwitchParams, TickCtx};
use serde::Deserialize;

use crate::EDITOR_STATE;

/// Degrees of look rotation per pixel of mouse travel.
const CAMERA_SPEED: f32 = 0.1;
/// Pitch stops just short of straight up/down so the view basis stays sane.
const CAMERA_PITCH_LIMIT_DEG: f32 = 89.0;
/// Fly speed in world units per second.
const MOVE_SPEED: f32 = 4.0;
/// Crosshair quad edge in screen pixels.
const CROSSHAIR_SIZE: f32 = 4.0;

#[derive(Debug, Deserialize, Clone)]
pub struct LevelFile {
    pub name: String,
    pub camera: LevelCamera,
    #[serde(default)]
    pub cubes: Vec<LevelCube>,
    #[serde(default)]
    pub models: Vec<LevelModel>,
    pub light: LevelLight,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LevelCamera {
    pub position: [f32; 3],
    #[serde(default = "default_yaw_deg")]
    pub yaw_deg: f32,
    #[serde(default)]
    pub pitch_deg: f32,
}

/// A flat-shaded cube. Solid color unless a texture path is given.
#[derive(Debug, Deserialize, Clone)]
pub struct LevelCube {
    pub position: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: f32,
    pub color: [f32; 3],
    #[serde(default)]
    pub texture: Option<String>,
}

/// A cube drawn with the full material pipeline. Any texture slot left
/// unset falls back to the renderer's default material.
#[derive(Debug, Deserialize, Clone)]
pub struct LevelModel {
    pub position: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub material: Option<LevelMaterial>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LevelMaterial {
    #[serde(default)]
    pub albedo: Option<String>,
    #[serde(default)]
    pub metallic_roughness: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub emissive: Option<String>,
    #[serde(default)]
    pub occlusion: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LevelLight {
    pub position: [f32; 3],
    #[serde(default)]
    pub orbit_radius: f32,
    #[serde(default = "default_orbit_speed")]
    pub orbit_speed: f32,
}

/// Loads and validates a level description from a JSON file.
pub fn load_level_from_path(path: &Path) -> Result<LevelFile, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read level file {}: {e}", path.display()))?;
    let level: LevelFile = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse level file {}: {e}", path.display()))?;
    validate_level(&level)?;
    Ok(level)
}

fn validate_level(level: &LevelFile) -> Result<(), String> {
    if level.name.is_empty() {
        return Err("Level validation failed: name is empty".to_string());
    }
    for (index, cube) in level.cubes.iter().enumerate() {
        if cube.scale <= 0.0 {
            return Err(format!(
                "Level validation failed: cube {index} has non-positive scale"
            ));
        }
        if cube.color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(format!(
                "Level validation failed: cube {index} color is outside [0, 1]"
            ));
        }
    }
    for (index, model) in level.models.iter().enumerate() {
        if model.scale <= 0.0 {
            return Err(format!(
                "Level validation failed: model {index} has non-positive scale"
            ));
        }
    }
    if level.light.orbit_radius < 0.0 {
        return Err("Level validation failed: light orbit radius is negative".to_string());
    }
    if level.cubes.is_empty() && level.models.is_empty() {
        log::warn!(
            "Level '{}' has nothing to draw. This is allowed but often accidental.",
            level.name
        );
    }
    Ok(())
}

/// Fallback level used when the level file is missing or malformed.
fn default_level() -> LevelFile {
    LevelFile {
        name: "built-in".to_string(),
        camera: LevelCamera {
            position: [0.0, 0.0, 0.0],
            yaw_deg: default_yaw_deg(),
            pitch_deg: 0.0,
        },
        cubes: vec![
            LevelCube {
                position: [0.0, 0.0, -5.0],
                scale: 1.0,
                color: [0.8, 0.2, 0.2],
                texture: None,
            },
            LevelCube {
                position: [2.5, 0.0, -6.0],
                scale: 1.0,
                color: [0.2, 0.8, 0.2],
                texture: None,
            },
            LevelCube {
                position: [-2.5, 0.0, -6.0],
                scale: 1.0,
                color: [0.2, 0.2, 0.8],
                texture: None,
            },
        ],
        models: vec![LevelModel {
            position: [0.0, 1.8, -7.0],
            scale: 1.0,
            material: None,
        }],
        light: LevelLight {
            position: [0.0, 0.75, -5.0],
            orbit_radius: 0.0,
            orbit_speed: default_orbit_speed(),
        },
    }
}

pub struct LevelState {
    level_path: PathBuf,
    level: LevelFile,
    position: Vec3,
    /// Look angles in radians.
    yaw: f32,
    pitch: f32,
    time: f32,
}

impl LevelState {
    pub fn new(level_path: PathBuf) -> Self {
        Self {
            level_path,
            level: default_level(),
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            time: 0.0,
        }
    }

    fn apply_look(&mut self, motion: IVec2) {
        self.yaw += (motion.x as f32 * -CAMERA_SPEED).to_radians();
        let limit = CAMERA_PITCH_LIMIT_DEG.to_radians();
        self.pitch = (self.pitch + (motion.y as f32 * CAMERA_SPEED).to_radians())
            .clamp(-limit, limit);
    }
}

impl AppState for LevelState {
    fn on_init(&mut self) -> Result<(), String> {
        match load_level_from_path(&self.level_path) {
            Ok(level) => {
                log::info!(
                    "Loaded level '{}' ({} cubes, {} models)",
                    level.name,
                    level.cubes.len(),
                    level.models.len()
                );
                self.level = level;
            }
            Err(e) => log::warn!("{e}; using the built-in level"),
        }
        self.position = Vec3::from(self.level.camera.position);
        self.yaw = self.level.camera.yaw_deg.to_radians();
        self.pitch = self.level.camera.pitch_deg.to_radians();
        Ok(())
    }

    fn on_switch(&mut self, ctx: &mut TickCtx<'_>, _params: SwitchParams) {
        ctx.set_clear_color(Vec3::splat(0.2));
        ctx.set_mouse_mode(MouseMode::Visible);
        log::info!("Entered level '{}'", self.level.name);
    }

    fn update(&mut self, ctx: &mut TickCtx<'_>, delta: f32) {
        if ctx.input.is_just_pressed(Action::ToggleEditor) {
            ctx.switch_state(EDITOR_STATE, None);
        }

        match ctx.mouse_mode {
            MouseMode::Visible => {
                if ctx.input.is_just_pressed(Action::Primary) {
                    ctx.set_mouse_mode(MouseMode::RelativeCaptured);
                }
            }
            MouseMode::RelativeCaptured => {
                if ctx.input.is_just_pressed(Action::Escape) {
                    ctx.set_mouse_mode(MouseMode::Visible);
                }
                self.apply_look(ctx.input.mouse_relative());
            }
        }

        let direction = direction_from(self.yaw, self.pitch);
        let flat = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
        let right = flat.cross(Vec3::Y);
        let mut wish = Vec3::ZERO;
        if ctx.input.is_pressed(Action::Forward) {
            wish += flat;
        }
        if ctx.input.is_pressed(Action::Back) {
            wish -= flat;
        }
        if ctx.input.is_pressed(Action::Right) {
            wish += right;
        }
        if ctx.input.is_pressed(Action::Left) {
            wish -= right;
        }
        if ctx.input.is_pressed(Action::Jump) {
            wish += Vec3::Y;
        }
        if ctx.input.is_pressed(Action::Crouch) {
            wish -= Vec3::Y;
        }
        if wish != Vec3::ZERO {
            self.position += wish.normalize() * MOVE_SPEED * delta;
        }

        self.time += delta;
    }

    fn render(&mut self, renderer: &mut Renderer) {
        let direction = direction_from(self.yaw, self.pitch);
        renderer.set_camera(self.position, self.position + direction);

        for cube in &self.level.cubes {
            let texture = match &cube.texture {
                Some(path) => renderer.acquire_texture(path),
                None => None,
            };
            let texture = match texture {
                Some(handle) => handle,
                None => renderer.acquire_solid_color(
                    cube.color[0],
                    cube.color[1],
                    cube.color[2],
                    1.0,
                ),
            };
            let transform = Mat4::from_translation(Vec3::from(cube.position))
                * Mat4::from_scale(Vec3::splat(cube.scale));
            renderer.render_geometry(transform, texture);
        }

        for model in &self.level.models {
            let material = resolve_material(renderer, model.material.as_ref());
            let transform = Mat4::from_translation(Vec3::from(model.position))
                * Mat4::from_scale(Vec3::splat(model.scale));
            renderer.render_model(transform, &material);
        }

        renderer.render_light(light_position(&self.level.light, self.time));

        let white = renderer.acquire_solid_color(1.0, 1.0, 1.0, 1.0);
        let (screen_w, screen_h) = renderer.screen_size();
        let size = Vec2::splat(CROSSHAIR_SIZE);
        renderer.render_glyph(&GlyphDraw {
            position: Vec2::new(screen_w as f32, screen_h as f32) * 0.5 - size * 0.5,
            size,
            uv_offset: Vec2::ZERO,
            uv_scale: Vec2::ONE,
            color: Vec4::ONE,
            texture: white,
        });
    }
}

/// View direction for the given yaw/pitch, both in radians.
fn direction_from(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
}

/// Light position at `time` seconds. Radius zero keeps the light fixed;
/// `orbit_speed` is in revolutions per second around the base position.
fn light_position(light: &LevelLight, time: f32) -> Vec3 {
    let base = Vec3::from(light.position);
    if light.orbit_radius <= 0.0 {
        return base;
    }
    let angle = time * light.orbit_speed * std::f32::consts::TAU;
    base + Vec3::new(angle.cos(), 0.0, angle.sin()) * light.orbit_radius
}

fn resolve_material(renderer: &mut Renderer, slots: Option<&LevelMaterial>) -> Material {
    let mut material = renderer.default_material();
    let Some(slots) = slots else {
        return material;
    };
    material.albedo = slot_texture(renderer, slots.albedo.as_deref(), material.albedo);
    material.metallic_roughness = slot_texture(
        renderer,
        slots.metallic_roughness.as_deref(),
        material.metallic_roughness,
    );
    material.normal = slot_texture(renderer, slots.normal.as_deref(), material.normal);
    material.emissive = slot_texture(renderer, slots.emissive.as_deref(), material.emissive);
    material.occlusion = slot_texture(renderer, slots.occlusion.as_deref(), material.occlusion);
    material
}

fn slot_texture(
    renderer: &mut Renderer,
    path: Option<&str>,
    fallback: TextureHandle,
) -> TextureHandle {
    match path {
        Some(path) => renderer.acquire_texture(path).unwrap_or(fallback),
        None => fallback,
    }
}

const fn default_yaw_deg() -> f32 {
    -90.0
}

const fn default_scale() -> f32 {
    1.0
}

const fn default_orbit_speed() -> f32 {
    0.25
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .subsec_nanos();
        std::env::temp_dir().join(format!(
            "keel_level_{}_{}_{nanos}.json",
            name_hint,
            std::process::id()
        ))
    }

    fn write_level_file(path: &Path, contents: &str) {
        fs::write(path, contents).expect("failed to write level file");
    }

    const VALID_LEVEL: &str = r#"{
        "name": "test",
        "camera": { "position": [1.0, 2.0, 3.0] },
        "cubes": [
            { "position": [0.0, 0.0, -5.0], "color": [0.5, 0.5, 0.5] }
        ],
        "light": { "position": [0.0, 0.75, -5.0], "orbit_radius": 2.0 }
    }"#;

    #[test]
    fn load_level_from_path_parses_valid_level() {
        let path = temp_file_path("valid");
        write_level_file(&path, VALID_LEVEL);

        let level = load_level_from_path(&path).expect("level should load");
        let _ = fs::remove_file(&path);

        assert_eq!(level.name, "test");
        assert_eq!(level.camera.position, [1.0, 2.0, 3.0]);
        assert_eq!(level.cubes.len(), 1);
        assert_eq!(level.light.orbit_radius, 2.0);
    }

    #[test]
    fn load_level_from_path_applies_defaults() {
        let path = temp_file_path("defaults");
        write_level_file(&path, VALID_LEVEL);

        let level = load_level_from_path(&path).expect("level should load");
        let _ = fs::remove_file(&path);

        assert_eq!(level.camera.yaw_deg, -90.0);
        assert_eq!(level.camera.pitch_deg, 0.0);
        assert_eq!(level.cubes[0].scale, 1.0);
        assert!(level.cubes[0].texture.is_none());
        assert!(level.models.is_empty());
        assert_eq!(level.light.orbit_speed, 0.25);
    }

    #[test]
    fn load_level_from_path_rejects_invalid_json() {
        let path = temp_file_path("invalid_json");
        write_level_file(&path, "{ not json");

        let result = load_level_from_path(&path);
        let _ = fs::remove_file(&path);

        let error = result.expect_err("malformed JSON should fail");
        assert!(error.contains("Failed to parse level file"));
    }

    #[test]
    fn load_level_from_path_rejects_missing_file() {
        let path = temp_file_path("missing");
        let error = load_level_from_path(&path).expect_err("missing file should fail");
        assert!(error.contains("Failed to read level file"));
    }

    #[test]
    fn load_level_from_path_rejects_out_of_range_color() {
        let path = temp_file_path("bad_color");
        write_level_file(
            &path,
            r#"{
                "name": "test",
                "camera": { "position": [0.0, 0.0, 0.0] },
                "cubes": [
                    { "position": [0.0, 0.0, 0.0], "color": [1.5, 0.0, 0.0] }
                ],
                "light": { "position": [0.0, 0.0, 0.0] }
            }"#,
        );

        let result = load_level_from_path(&path);
        let _ = fs::remove_file(&path);

        let error = result.expect_err("out-of-range color should fail");
        assert!(error.contains("color is outside"));
    }

    #[test]
    fn load_level_from_path_rejects_non_positive_scale() {
        let path = temp_file_path("bad_scale");
        write_level_file(
            &path,
            r#"{
                "name": "test",
                "camera": { "position": [0.0, 0.0, 0.0] },
                "cubes": [
                    { "position": [0.0, 0.0, 0.0], "scale": 0.0, "color": [0.5, 0.5, 0.5] }
                ],
                "light": { "position": [0.0, 0.0, 0.0] }
            }"#,
        );

        let result = load_level_from_path(&path);
        let _ = fs::remove_file(&path);

        let error = result.expect_err("zero scale should fail");
        assert!(error.contains("non-positive scale"));
    }

    #[test]
    fn load_level_from_path_rejects_negative_orbit_radius() {
        let path = temp_file_path("bad_orbit");
        write_level_file(
            &path,
            r#"{
                "name": "test",
                "camera": { "position": [0.0, 0.0, 0.0] },
                "light": { "position": [0.0, 0.0, 0.0], "orbit_radius": -1.0 }
            }"#,
        );

        let result = load_level_from_path(&path);
        let _ = fs::remove_file(&path);

        let error = result.expect_err("negative orbit radius should fail");
        assert!(error.contains("orbit radius is negative"));
    }

    #[test]
    fn default_level_passes_validation() {
        let level = default_level();
        validate_level(&level).expect("built-in level should validate");
    }

    #[test]
    fn direction_from_faces_negative_z_at_default_yaw() {
        let direction = direction_from(default_yaw_deg().to_radians(), 0.0);
        assert!(direction.x.abs() < 1e-6);
        assert!(direction.y.abs() < 1e-6);
        assert!((direction.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn apply_look_clamps_pitch() {
        let mut state = LevelState::new(PathBuf::from("unused.json"));
        state.apply_look(IVec2::new(0, 100_000));
        assert!((state.pitch - CAMERA_PITCH_LIMIT_DEG.to_radians()).abs() < 1e-6);
        state.apply_look(IVec2::new(0, -200_000));
        assert!((state.pitch + CAMERA_PITCH_LIMIT_DEG.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn apply_look_turns_left_for_positive_x_motion() {
        let mut state = LevelState::new(PathBuf::from("unused.json"));
        let start = state.yaw;
        state.apply_look(IVec2::new(10, 0));
        assert!(state.yaw < start);
    }

    #[test]
    fn light_position_orbits_around_base() {
        let light = LevelLight {
            position: [1.0, 2.0, 3.0],
            orbit_radius: 2.0,
            orbit_speed: 0.25,
        };
        let at_start = light_position(&light, 0.0);
        assert!((at_start - Vec3::new(3.0, 2.0, 3.0)).length() < 1e-5);

        // A quarter speed for one second is a quarter revolution.
        let quarter = light_position(&light, 1.0);
        assert!((quarter - Vec3::new(1.0, 2.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn light_position_stays_fixed_without_orbit() {
        let light = LevelLight {
            position: [1.0, 2.0, 3.0],
            orbit_radius: 0.0,
            orbit_speed: 0.25,
        };
        assert_eq!(light_position(&light, 12.5), Vec3::new(1.0, 2.0, 3.0));
    }
}
