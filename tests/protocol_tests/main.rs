//! Protocol test suite

mod codec_tests;
