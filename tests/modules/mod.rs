//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 测试模块根目录，每个功能一个目录
