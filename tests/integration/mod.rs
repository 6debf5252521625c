//! End-to-end tests of the answering service.

mod error_recovery;
mod fakes;
mod feedback_workflow;
mod routing_scenarios;
