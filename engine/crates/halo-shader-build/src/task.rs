use std::path::{Path, PathBuf};

use anyhow::Context;
use halo_crate_tools::resource::HaloPath;

/// 支持的 shader stage，由文件扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}
impl ShaderStage {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let stage = match Path::new(file_name).extension()?.to_str()? {
            "vert" => Self::Vertex,
            "frag" => Self::Fragment,
            "comp" => Self::Compute,
            _ => return None,
        };
        Some(stage)
    }
}

/// 一个具体的编译任务
#[derive(Debug)]
pub struct ShaderCompileTask {
    pub shader_path: PathBuf,
    pub output_path: PathBuf,
    pub stage: ShaderStage,
}
impl ShaderCompileTask {
    /// 不支持的扩展名（例如被 include 的 .glsl）返回 None
    pub fn new(shader_path: &Path) -> Option<Self> {
        let relative_path = shader_path.strip_prefix(HaloPath::shader_src_path()).ok()?;
        let stage = ShaderStage::from_file_name(shader_path.file_name()?.to_str()?)?;
        Some(Self {
            shader_path: shader_path.to_path_buf(),
            output_path: Self::output_path(relative_path),
            stage,
        })
    }

    /// `foo/bar.frag` -> `.build/foo/bar.frag.spv`
    fn output_path(relative_path: &Path) -> PathBuf {
        let mut output = HaloPath::shader_build_path().join(relative_path).into_os_string();
        output.push(".spv");
        PathBuf::from(output)
    }

    /// 使用 Vulkan SDK 中的 glslc
    pub fn compile(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {parent:?}"))?;
        }

        let output = std::process::Command::new("glslc")
            .arg(format!("-I{}", HaloPath::shader_src_path().display()))
            .args(["-g", "--target-env=vulkan1.3", "-o"])
            .arg(&self.output_path)
            .arg(&self.shader_path)
            .output()
            .context("execute glslc")?;

        if !output.stdout.is_empty() {
            log::info!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        }
        if !output.status.success() {
            anyhow::bail!("glslc: {}", String::from_utf8_lossy(&output.stderr));
        }
        if !output.stderr.is_empty() {
            log::warn!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_from_extension() {
        assert_eq!(ShaderStage::from_file_name("outline.frag"), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_file_name("jump_flood.comp"), Some(ShaderStage::Compute));
        assert_eq!(ShaderStage::from_file_name("depth.vert"), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_file_name("scene.glsl"), None);
    }

    #[test]
    fn output_mirrors_source_tree() {
        let source = HaloPath::shader_src_path().join("outline").join("outline.frag");
        let task = ShaderCompileTask::new(&source).unwrap();
        assert_eq!(task.output_path, HaloPath::shader_build_path().join("outline").join("outline.frag.spv"));
        assert!(ShaderCompileTask::new(Path::new("/elsewhere/outline.frag")).is_none());
    }
}
