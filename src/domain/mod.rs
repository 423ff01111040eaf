/// Gig records and store instance.
pub mod gig;
/// Practice task and category records and store instance.
pub mod practice;
/// Rehearsal event records and store instance.
pub mod rehearsal;
