//! Core types and utilities for the eISCP protocol
//!
//! This crate provides the command and property types, error handling and
//! small helpers shared by every layer of the gateway.

pub mod error;
pub mod command;
pub mod property;

pub use error::{EiscpError, EiscpResult};
pub use command::{Command, Parameter, PropertyCode, POWER_CODE, QUERY_SENTINEL, RECEIVER_UNIT, START_CHAR};
pub use property::Property;
