pub mod access_gate;
pub mod headers;
pub mod staff_auth;
