//! Shader 编译工具
//!
//! 将 `engine/shader/src` 下的所有 GLSL 文件编译为 SPIR-V，输出到 `engine/shader/.build`

mod task;

use halo_crate_tools::{init_log::init_log, resource::HaloPath};
use rayon::prelude::*;
use task::ShaderCompileTask;

fn main() -> anyhow::Result<()> {
    init_log();

    log::info!("Shader source path: {:?}", HaloPath::shader_src_path());
    log::info!("Shader output path: {:?}", HaloPath::shader_build_path());

    let tasks = walkdir::WalkDir::new(HaloPath::shader_src_path())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| ShaderCompileTask::new(entry.path()))
        .collect::<Vec<_>>();

    let failed = tasks
        .par_iter()
        .filter_map(|task| {
            log::info!("Compiling {:?} shader: {:?}", task.stage, task.shader_path);
            task.compile().err().map(|e| {
                log::error!("{:?}: {e:#}", task.shader_path);
                task.shader_path.clone()
            })
        })
        .collect::<Vec<_>>();

    anyhow::ensure!(failed.is_empty(), "{} of {} shaders failed to compile", failed.len(), tasks.len());
    log::info!("Shader compilation completed: {} shaders.", tasks.len());
    Ok(())
}
