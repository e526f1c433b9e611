//! Data returned to callers

/// Ranked similarity results and their tabular/JSON forms.
pub mod result;
