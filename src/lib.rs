//! Accessibility assistant backend
//!
//! Helps editors find and fix accessibility issues (image alt text, heading
//! hierarchy, ARIA landmarks). Privileged actions travel through the browser
//! as HMAC-signed demands; page scans are delegated to a remote scanner and
//! alt text to an OpenAI-compatible AI API.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
