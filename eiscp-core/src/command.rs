//! eISCP command messages
//!
//! A command is the text carried inside a frame payload:
//!
//! ```text
//! ! 1 PWR 01
//! | | |   +-- parameter (a value to assign, or QSTN to query)
//! | | +------ 3-character property code
//! | +-------- unit type ('1' = receiver)
//! +---------- start character
//! ```
//!
//! Codes are opaque to this layer. Only their shape is validated.

use crate::error::{EiscpError, EiscpResult};
use std::fmt;
use std::str::FromStr;

/// Start character of every command
pub const START_CHAR: char = '!';

/// Unit type marker for receivers
pub const RECEIVER_UNIT: char = '1';

/// Parameter that asks the device to report the current value
pub const QUERY_SENTINEL: &str = "QSTN";

/// Length of a property code
pub const CODE_LENGTH: usize = 3;

/// Power status code, answered by every receiver
pub const POWER_CODE: &str = "PWR";

/// 3-character property code (e.g. `PWR`, `MVL`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyCode(String);

impl PropertyCode {
    /// Validate and wrap a property code
    ///
    /// Codes are exactly three ASCII alphanumeric characters. Case is kept as
    /// given since the device echoes codes verbatim.
    pub fn new(code: &str) -> EiscpResult<Self> {
        if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(EiscpError::InvalidData(format!(
                "Property code must be {} ASCII alphanumeric characters, got {:?}",
                CODE_LENGTH, code
            )));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PropertyCode {
    type Err = EiscpError;

    fn from_str(s: &str) -> EiscpResult<Self> {
        Self::new(s)
    }
}

/// Command parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// Ask the device for the current value
    Query,
    /// Assign a literal value
    Value(String),
}

impl Parameter {
    /// Validate a literal value
    ///
    /// Values travel as raw text inside the payload, so control characters
    /// would corrupt the terminator and are rejected.
    pub fn value(value: &str) -> EiscpResult<Self> {
        if value.chars().any(|c| c.is_control()) {
            return Err(EiscpError::InvalidData(format!(
                "Parameter contains control characters: {:?}",
                value
            )));
        }
        Ok(Parameter::Value(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Parameter::Query => QUERY_SENTINEL,
            Parameter::Value(value) => value,
        }
    }
}

/// A single eISCP command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    unit: char,
    code: PropertyCode,
    parameter: Parameter,
}

impl Command {
    /// Create a command for the receiver unit
    pub fn new(code: PropertyCode, parameter: Parameter) -> Self {
        Self {
            unit: RECEIVER_UNIT,
            code,
            parameter,
        }
    }

    /// Build a status query for `code`
    pub fn query(code: PropertyCode) -> Self {
        Self::new(code, Parameter::Query)
    }

    /// Build the power status query used as a keep-alive
    pub fn power_query() -> Self {
        Self::query(PropertyCode(POWER_CODE.to_string()))
    }

    /// Build an assignment of `value` to `code`
    pub fn assign(code: PropertyCode, value: &str) -> EiscpResult<Self> {
        Ok(Self::new(code, Parameter::value(value)?))
    }

    /// Parse a command from payload text (terminators already removed)
    pub fn parse(text: &str) -> EiscpResult<Self> {
        let mut chars = text.chars();
        if chars.next() != Some(START_CHAR) {
            return Err(EiscpError::Protocol(format!(
                "Command must start with '{}': {:?}",
                START_CHAR, text
            )));
        }
        let unit = chars.next().ok_or_else(|| {
            EiscpError::Protocol(format!("Command is missing its unit type: {:?}", text))
        })?;

        let rest = chars.as_str();
        let code = rest.get(..CODE_LENGTH).ok_or_else(|| {
            EiscpError::Protocol(format!("Command is missing its property code: {:?}", text))
        })?;
        let code = PropertyCode::new(code)?;

        let parameter = match &rest[CODE_LENGTH..] {
            QUERY_SENTINEL => Parameter::Query,
            value => Parameter::Value(value.to_string()),
        };

        Ok(Self {
            unit,
            code,
            parameter,
        })
    }

    pub fn unit(&self) -> char {
        self.unit
    }

    pub fn code(&self) -> &PropertyCode {
        &self.code
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    /// Payload text without terminator, e.g. `!1PWRQSTN`
    pub fn to_payload(&self) -> String {
        format!(
            "{}{}{}{}",
            START_CHAR,
            self.unit,
            self.code,
            self.parameter.as_str()
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_payload())
    }
}
