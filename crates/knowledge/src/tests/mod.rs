//! Cross-module tests for the knowledge pipeline.

mod fakes;
mod table_queries;
