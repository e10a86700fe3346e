//! API request handlers.

/// Question answering.
pub mod answer;
/// User feedback on earlier answers.
pub mod feedback;
/// Health check.
pub mod health;
