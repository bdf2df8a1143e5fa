pub mod attendance;
pub mod employee;
pub mod muster_request;
pub mod role;
