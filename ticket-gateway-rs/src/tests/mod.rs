//! Router-level tests for the ticket gateway
//!
//! Each test drives the axum router with `oneshot` requests while WireMock
//! stands in for the ticketing backend and an in-process provider stands in
//! for the LLM.

pub mod support;

pub mod audit_route_tests;
