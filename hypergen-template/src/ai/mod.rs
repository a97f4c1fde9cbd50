//! ABOUTME: The two-pass AI protocol: Collector (Pass-1 accumulation), Assembler
//! ABOUTME: (prompt serialization), and Transport (answer resolution).

pub mod assembler;
pub mod collector;
pub mod transport;
