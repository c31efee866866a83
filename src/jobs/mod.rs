pub mod session_sweep;
