pub mod file_replace;
pub mod health;
