//! Vulkan 抽象层
//!
//! 提供对 Vulkan API 的高层封装：设备与三条队列、命令缓冲、同步、资源、描述符、管线以及交换链。
//! 所有 Vulkan 资源通过 [`gfx::Gfx`] 单例统一访问，简化生命周期和借用关系。

pub mod basic;
pub mod commands;
pub mod descriptors;
pub mod foundation;
pub mod gfx;
pub mod gfx_core;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
