pub mod exhibitions;
pub mod gallery;
