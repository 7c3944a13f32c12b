//! Utility functions shared by the provider and the overlay.

pub mod safe_cast;
