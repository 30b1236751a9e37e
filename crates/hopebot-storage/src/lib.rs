//! Storage and persistence domain for HopeBot.

pub mod db;
