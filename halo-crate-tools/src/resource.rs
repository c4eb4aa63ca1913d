use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// ```ignore
/// let spv = HaloPath::shader_build_path_str("outline.frag"); // engine/shader/.build/outline.frag.spv
/// ```
pub struct HaloPath;

impl HaloPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn engine_path() -> PathBuf {
        Self::workspace_path().join("engine")
    }

    pub fn shader_root_path() -> PathBuf {
        Self::engine_path().join("shader")
    }

    /// shader 源码目录
    pub fn shader_src_path() -> PathBuf {
        Self::shader_root_path().join("src")
    }

    /// 编译后的 SPIR-V 输出目录
    pub fn shader_build_path() -> PathBuf {
        Self::shader_root_path().join(".build")
    }

    /// `engine/shader/.build/<filename>.spv`
    pub fn shader_build_path_str(filename: &str) -> String {
        let mut path = Self::shader_build_path().join(filename).into_os_string();
        path.push(".spv");
        path.to_string_lossy().into_owned()
    }

    /// 工作区根目录下的配置文件
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_build_path_appends_spv() {
        let path = HaloPath::shader_build_path_str("jump_flood.comp");
        assert!(path.ends_with("jump_flood.comp.spv"));
        assert!(Path::new(&path).starts_with(HaloPath::shader_build_path()));
    }

    #[test]
    fn engine_path_is_under_workspace() {
        assert!(HaloPath::engine_path().starts_with(HaloPath::workspace_path()));
        assert!(HaloPath::shader_src_path().ends_with("engine/shader/src"));
    }
}
