//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 端到端场景

mod scan_pipeline;
