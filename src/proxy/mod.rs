pub mod dates;
pub mod handler;
pub mod upstream;
