//! Signup Flow — guided multi-step registration with live field validation.

pub mod config;
pub mod console;
pub mod error;
pub mod flows;
pub mod store;
pub mod validation;
pub mod workflow;
