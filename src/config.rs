use std::path::PathBuf;

use clap::Parser;
use glam::Vec3;

use crate::lights::{AmbientLight, Color, Lights, PointLight};

#[derive(Debug, Parser)]
#[command(name = "shaderview")]
#[command(about = "Renders a glTF model with a custom shader material", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the glTF model
    model: Option<PathBuf>,

    /// Uniform scale applied to the loaded model
    #[arg(long)]
    scale: Option<f32>,

    /// Show the debug overlay on startup (toggle with F1)
    #[arg(long)]
    gui: bool,

    /// Disable shader hot reloading
    #[arg(long)]
    no_watch: bool,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
pub struct ControlsConfig {
    pub min_distance: f32,
    pub max_distance: f32,
    pub target: Vec3,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub window_title: String,
    pub model_path: PathBuf,
    pub model_scale: f32,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lights: Lights,
    pub max_pixel_ratio: f64,
    pub show_gui: bool,
    pub watch_shaders: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_title: "shaderview".to_string(),
            model_path: PathBuf::from("assets/model/scene.gltf"),
            model_scale: 10.0,
            camera: CameraConfig {
                fov_y_degrees: 45.0,
                near: 0.25,
                far: 20.0,
                position: Vec3::new(2.5, 1.5, 3.0),
            },
            controls: ControlsConfig {
                min_distance: 2.0,
                max_distance: 10.0,
                target: Vec3::new(0.0, 0.5, -0.2),
            },
            lights: Lights {
                ambient: AmbientLight::new(Color::from_hex(0x404040), 1.0),
                point: PointLight::new(Color::from_hex(0xffffff), 0.1, Vec3::new(2.0, 3.0, 4.0)),
            },
            max_pixel_ratio: 2.0,
            show_gui: false,
            watch_shaders: true,
        }
    }
}

impl ViewerConfig {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(model) = cli.model {
            config.model_path = model;
        }

        if let Some(scale) = cli.scale {
            if !scale.is_finite() || scale <= 0.0 {
                anyhow::bail!("Model scale must be a positive number, got {}", scale);
            }
            config.model_scale = scale;
        }

        config.show_gui = cli.gui;
        config.watch_shaders = !cli.no_watch;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ViewerConfig> {
        let cli = Cli::try_parse_from(std::iter::once("shaderview").chain(args.iter().copied()))?;
        ViewerConfig::from_cli(cli)
    }

    #[test]
    fn defaults_match_the_scene_setup() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.model_path, PathBuf::from("assets/model/scene.gltf"));
        assert_eq!(config.model_scale, 10.0);
        assert_eq!(config.camera.fov_y_degrees, 45.0);
        assert_eq!(config.camera.near, 0.25);
        assert_eq!(config.camera.far, 20.0);
        assert_eq!(config.controls.min_distance, 2.0);
        assert_eq!(config.controls.max_distance, 10.0);
        assert_eq!(config.max_pixel_ratio, 2.0);
        assert!(config.watch_shaders);
        assert!(!config.show_gui);
    }

    #[test]
    fn overrides_from_command_line() {
        let config = parse(&["models/duck.gltf", "--scale", "2.5", "--gui", "--no-watch"]).unwrap();

        assert_eq!(config.model_path, PathBuf::from("models/duck.gltf"));
        assert_eq!(config.model_scale, 2.5);
        assert!(config.show_gui);
        assert!(!config.watch_shaders);
    }

    #[test]
    fn rejects_non_positive_scale() {
        assert!(parse(&["--scale", "0"]).is_err());
        assert!(parse(&["--scale=-3"]).is_err());
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse(&["--wireframe"]).is_err());
    }
}
