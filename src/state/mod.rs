/// State module
///
/// This module holds the read-only data the rest of the program works with:
/// - The camera catalogue (catalogue.rs)
/// - Shared data structures (data.rs)

pub mod catalogue;
pub mod data;
