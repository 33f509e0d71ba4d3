/*
 * Application logic layer. `LibraryController` is the single-threaded owner of the library
 * services and the browse session; front ends drive it and show the `AppNotice`s it returns.
 * Unit tests for the controller are in `handler_tests.rs`.
 */
pub mod handler;

#[cfg(test)]
mod handler_tests;

pub use handler::{AppNotice, LibraryController, LibraryServices};
