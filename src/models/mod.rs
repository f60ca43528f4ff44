pub mod booking;
pub mod change_request;
pub mod leave;
pub mod replication;
pub mod staff;

pub use booking::{Booking, BookingStatus, NewBooking};
pub use change_request::{ChangeKind, ChangeRequest, ChangeRequestStatus};
pub use leave::{ApprovedLeave, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest};
pub use replication::{ReplicationJob, ReplicationMode, ReplicationResult};
pub use staff::Staff;
