// ── Mochiko Atoms ──────────────────────────────────────────────────────────
// Foundation layer: error enum, named constants. No I/O, no domain logic.

pub mod constants;
pub mod error;
