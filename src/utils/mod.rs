pub mod dates;
pub mod paths;
