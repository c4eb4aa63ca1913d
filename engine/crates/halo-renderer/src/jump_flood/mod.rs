//! jump flood 描边
//!
//! seed pass 在 ping layer 中写入被覆盖像素自身的坐标，未覆盖的像素保持 [`plan::JUMP_FLOOD_SENTINEL`]；
//! compute shader 在 ping/pong 两个 layer 之间交替，得到每个像素最近的 seed 坐标。

pub mod computer;
pub mod plan;
pub mod resources;
