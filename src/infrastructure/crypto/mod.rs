//! Cryptographic helpers

mod webhook;

pub use webhook::HmacWebhookVerifier;
