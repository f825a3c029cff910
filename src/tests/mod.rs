// src/tests/mod.rs
//! End-to-end tests through the service with scripted channels

mod service_tests;
