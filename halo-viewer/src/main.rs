//! 在程序生成的演示场景上运行逐帧渲染核心
//!
//! - 左键：选中鼠标下的物体，点击空白处取消选择
//! - Esc：取消选择
//! - 右键拖动：旋转相机，滚轮：缩放

mod app;
mod camera;
mod config;
mod demo_scene;
mod input;
mod skybox;

use halo_crate_tools::{init_log::init_log, resource::HaloPath};

use crate::{app::ViewerApp, config::ViewerConfig};

fn main() -> anyhow::Result<()> {
    init_log();
    tracy_client::Client::start();

    let config = ViewerConfig::load(&HaloPath::config_path(ViewerConfig::FILE_NAME))?;
    ViewerApp::run(config)
}
