//! Queue test suite

mod ring_tests;
