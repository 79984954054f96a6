//! HTTP API: job dashboard (HTML + JSON) over the job store.

pub mod app;
pub mod csrf;
pub mod html;
