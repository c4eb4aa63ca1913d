//! 按照 [`criteria::SeparationKey`] 对 primitive 分组，每组一个 indirect draw buffer
//!
//! 分组表有序：opaque、blend、mask；scene pass 按 alpha mode 取出各自的分组

pub mod binding_state;
pub mod criteria;
pub mod indirect_commands;
pub mod memo;
pub mod table;
