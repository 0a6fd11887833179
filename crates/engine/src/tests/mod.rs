//! Shared fixtures and cross-module scenario tests.


mod retrieval_scenarios;
