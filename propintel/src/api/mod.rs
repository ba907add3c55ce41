//! HTTP collaborators: the property analysis API and the email transport.

mod cache;
mod client;
mod email;

pub use cache::SharedStorage;
pub use client::{AnalysisClient, DEFAULT_QUESTIONS};
pub use email::{EmailClient, EmailRequest};
