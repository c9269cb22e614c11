//! tracecap - Capture Android system traces into self-contained HTML.

pub mod assets;
pub mod atrace;
pub mod capture;
pub mod config;
pub mod display;
pub mod tags;
