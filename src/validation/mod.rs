//! Validation schema layer.
//!
//! Composes the sanitizers and the threat detector into named validators
//! that never panic and never return raw attacker input.
//!
//! - `fields.rs`: single-field validators (email, name, text, URL, slug)
//! - `contact.rs`: ordered checks for message submissions
//! - `params.rs`: query parameters and redirect targets

pub mod contact;
pub mod fields;
pub mod params;

pub use contact::{validate_contact, ContactMessage, ContactRejection, ContactSubmission};
pub use fields::{ValidationErrors, ValidationResult};
