//! Integration tests for the script inventory

mod support;

mod bootstrap;
mod cli_flow;
mod registry_flow;
