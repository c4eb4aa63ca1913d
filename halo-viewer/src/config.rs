//! `halo.toml`：viewer 的可选配置
//!
//! 文件不存在时使用默认值，字段缺失时使用字段的默认值

use std::path::Path;

use anyhow::Context;
use halo_renderer::frame_task::OutlineStyle;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// 逻辑像素
    pub width: f64,
    pub height: f64,
}
impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Halo".to_string(),
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    pub enabled: bool,
    pub color: [f32; 3],
    /// 像素
    pub thickness: f32,
}
impl OutlineConfig {
    pub fn style(&self) -> Option<OutlineStyle> {
        self.enabled.then(|| OutlineStyle {
            color: glam::Vec3::from(self.color),
            thickness: self.thickness,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    /// 为 None 时绘制 skybox
    pub background_color: Option<[f32; 3]>,
    pub selected_outline: OutlineConfig,
    pub hovering_outline: OutlineConfig,
    pub frustum_culling: bool,
}
impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            background_color: None,
            selected_outline: OutlineConfig {
                enabled: true,
                color: [1.0, 0.6, 0.1],
                thickness: 3.0,
            },
            hovering_outline: OutlineConfig {
                enabled: true,
                color: [0.3, 0.7, 1.0],
                thickness: 2.0,
            },
            frustum_culling: true,
        }
    }
}
impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            color: [1.0, 1.0, 1.0],
            thickness: 2.0,
        }
    }
}

impl ViewerConfig {
    pub const FILE_NAME: &'static str = "halo.toml";

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("{} not found, use default viewer config", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("parse {}", path.display()))?;
        log::info!("viewer config loaded from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        if config.window.width <= 0.0 || config.window.height <= 0.0 {
            anyhow::bail!("window size must be positive: {}x{}", config.window.width, config.window.height);
        }
        Ok(config)
    }

    #[inline]
    pub fn solid_background(&self) -> Option<glam::Vec3> {
        self.background_color.map(glam::Vec3::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(ViewerConfig::parse("").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = ViewerConfig::parse(
            r#"
            background_color = [0.1, 0.2, 0.3]
            frustum_culling = false

            [window]
            width = 640.0

            [hovering_outline]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640.0);
        assert_eq!(config.window.height, 800.0);
        assert_eq!(config.solid_background(), Some(glam::Vec3::new(0.1, 0.2, 0.3)));
        assert!(!config.frustum_culling);
        assert_eq!(config.hovering_outline.style(), None);
        assert_eq!(config.selected_outline, ViewerConfig::default().selected_outline);
    }

    #[test]
    fn missing_background_means_skybox() {
        assert_eq!(ViewerConfig::default().solid_background(), None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ViewerConfig::parse("[window]\nwidth = 0.0").is_err());
        assert!(ViewerConfig::parse("frustum_culling = \"yes\"").is_err());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let config = ViewerConfig::load(Path::new("/nonexistent/halo.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }
}
