//! Halo 工具集
//!
//! 日志初始化，以及基于工作区根目录的路径管理。

pub mod init_log;
pub mod resource;
