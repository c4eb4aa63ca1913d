//! 逐帧渲染核心
//!
//! 每帧的数据流：UI / 外部状态 -> [`frame_task::FrameTask`] -> [`frame::Frame::update`]
//! -> [`frame::Frame::execute`] -> present。
//! 多个 frame in flight slot 轮流使用，由 [`frame_counter::FrameCounter`] 决定当前 slot。

pub mod command_separation;
pub mod frame;
pub mod frame_counter;
pub mod frame_task;
pub mod frustum;
pub mod jump_flood;
pub mod mouse_pick;
pub mod outline;
pub mod overlay;
pub mod resize;
pub mod scene;
pub mod settings;
pub mod shared_data;
pub mod weighted_blended;
