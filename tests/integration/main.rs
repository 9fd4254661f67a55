//! Integration tests: full collection runs against a mock upstream.

mod collection;
mod mock_api;
