//! Integration tests for the Bookshelf server

mod api_tests;
mod invariants;
mod router_tests;
