//! Commerce Service - Document lifecycle and line item calculations for multi-tenant sales operations.

pub mod domain;
pub mod models;
pub mod services;
pub mod startup;
