//! Registration email delivery.

pub mod emailjs;

pub use emailjs::{DisabledNotifier, EMAILJS_ENDPOINT, EmailJsConfig, EmailJsNotifier};
