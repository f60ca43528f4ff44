pub mod bookings;
pub mod change_requests;
pub mod changes;
pub mod date_window;
pub mod leave;
pub mod leave_conflicts;
pub mod replication;
pub mod verification;
