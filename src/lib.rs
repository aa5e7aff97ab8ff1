//! 源质存储单元：定容、限类型、可分区的要素存储引擎，以及驱动它的 Bevy 插件

pub mod aspect;
pub mod cell;
pub mod data;
pub mod interface;
pub mod runtime;
pub mod storage;
