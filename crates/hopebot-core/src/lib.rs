//! Shared types for HopeBot: errors, text helpers, resource tags and LLM wire types.

pub mod error;
pub mod llm_types;
pub mod resource;
pub mod text;
