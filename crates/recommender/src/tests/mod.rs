//! Scenario tests for the recommendation engine
