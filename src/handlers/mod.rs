// Two security tiers, following the route layout in main.rs:
// Public (no auth, /auth/*) -> Protected (JWT auth, /api/*)
pub mod protected;
pub mod public;
