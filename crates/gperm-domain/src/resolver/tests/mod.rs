//! Tests for the resolver module.
//!
//! Organized by functionality:
//! - Override gate (no override means false everywhere)
//! - Scope dispatch (anonymous, member, outsider, bypass)
//! - Outsider role derivation and memoization
//! - Per-role checks and role ordering


mod resolver_tests;
