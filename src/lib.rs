// Core infrastructure modules
pub mod config;
pub mod core;
pub mod layers;

// Feature-specific modules
pub mod concurrent;
pub mod csv_input;
pub mod nested;
pub mod paginate;
pub mod seed;
pub mod stream;
pub mod users;

#[cfg(test)]
mod test_utils;
