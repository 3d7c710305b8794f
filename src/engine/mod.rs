//! Core engine: cursor → reconcile → persist.

pub mod cursor;
pub mod reconciler;
pub mod sync;
