//! Shared program model: nodes, instructions, parameters and modifiers.
//!
//! The assembler's parser, the disassembler's decoder and the VM all trade in
//! these types. A program is an ordered sequence of [`Node`]s.

use std::fmt;

use crate::error::{Result, SpecError};
use crate::opcode::OpCode;
use crate::param::ParamType;
use crate::{DIRECT_CHAR, LABEL_CHAR, REGISTER_CHAR};

/// Parse a numeric literal: optional sign, optional `0x`/`0o`/`0b` prefix
/// (case-insensitive), `_` allowed as a digit separator.
///
/// Some champions like 42.sh carry numbers overflowing 32 bits, hence i64.
pub fn parse_number(input: &str) -> Result<i64> {
    let cleaned: String = input.chars().filter(|&c| c != '_').collect();
    let err = || SpecError::InvalidNumber {
        literal: input.to_string(),
    };

    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, lower.as_str())
    };

    let n = i64::from_str_radix(digits, radix).map_err(|_| err())?;
    Ok(if negative { -n } else { n })
}

/// Sign of an additive modifier term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn apply(self, n: i64) -> i64 {
        match self {
            Sign::Plus => n,
            Sign::Minus => -n,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Plus => write!(f, "+"),
            Sign::Minus => write!(f, "-"),
        }
    }
}

/// One additive term attached to a parameter, e.g. the `-:b` of `:a-:b`.
///
/// `raw` is either a numeric literal or a label reference (leading `:`);
/// `resolved` is filled once the label offsets are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    pub sign: Sign,
    pub raw: String,
    pub resolved: Option<i64>,
}

impl Modifier {
    pub fn new(sign: Sign, raw: impl Into<String>) -> Self {
        Modifier {
            sign,
            raw: raw.into(),
            resolved: None,
        }
    }

    /// Whether this term references a label.
    pub fn is_label_ref(&self) -> bool {
        self.raw.starts_with(LABEL_CHAR)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sign, self.raw)
    }
}

/// An instruction parameter.
///
/// `raw` is the literal lexed text; for label references it starts with the
/// label prefix character. `resolved` is empty until label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub typ: ParamType,
    pub raw: String,
    pub resolved: Option<i64>,
    pub modifiers: Vec<Modifier>,
}

impl Parameter {
    pub fn new(typ: ParamType, raw: impl Into<String>) -> Self {
        Parameter {
            typ,
            raw: raw.into(),
            resolved: None,
            modifiers: Vec::new(),
        }
    }

    /// A parameter with a known numeric value, as produced by the decoder.
    pub fn with_value(typ: ParamType, value: i64) -> Self {
        Parameter {
            typ,
            raw: value.to_string(),
            resolved: Some(value),
            modifiers: Vec::new(),
        }
    }

    /// Whether the base value references a label.
    pub fn is_label_ref(&self) -> bool {
        self.raw.starts_with(LABEL_CHAR)
    }

    /// The resolved integer value, base plus modifiers.
    ///
    /// Fails if the base or any modifier is still an unresolved label.
    pub fn value(&self) -> Result<i64> {
        let mut n = match self.resolved {
            Some(n) => n,
            None => parse_number(&self.raw)?,
        };
        for modifier in &self.modifiers {
            let term = match modifier.resolved {
                Some(term) => term,
                None => parse_number(&modifier.raw)?,
            };
            n += modifier.sign.apply(term);
        }
        Ok(n)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            ParamType::Register => write!(f, "{}{}", REGISTER_CHAR, self.raw)?,
            ParamType::Direct => write!(f, "{}{}", DIRECT_CHAR, self.raw)?,
            ParamType::Indirect => write!(f, "{}", self.raw)?,
            ParamType::Label => write!(f, "{}{}", LABEL_CHAR, self.raw)?,
        }
        for modifier in &self.modifiers {
            write!(f, "{modifier}")?;
        }
        Ok(())
    }
}

/// A parsed or decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: &'static OpCode,
    pub params: Vec<Parameter>,
    /// Encoded size in bytes. Set by the encoder and the decoder.
    pub size: usize,
}

impl Instruction {
    pub fn new(op: &'static OpCode) -> Self {
        Instruction {
            op,
            params: Vec::new(),
            size: 0,
        }
    }

    /// Generate the encoding byte from the parameter types.
    ///
    /// Each parameter is represented by 2 bits, first parameter in the
    /// leftmost pair; unused trailing pairs stay zero.
    pub fn params_encoding(&self) -> u8 {
        let mut out = 0u8;
        for (i, p) in self.params.iter().enumerate() {
            out |= p.typ.encoding() << ((3 - i) * 2);
        }
        out
    }

    /// Check arity and per-position type masks against the opcode table.
    pub fn validate_params(&self) -> Result<()> {
        if self.params.len() != self.op.param_types.len() {
            return Err(SpecError::ParamCountMismatch {
                expected: self.op.param_types.len(),
                found: self.params.len(),
            });
        }
        for (i, param) in self.params.iter().enumerate() {
            if !self.op.param_types[i].contains(param.typ) {
                return Err(SpecError::ParamTypeMismatch {
                    index: i + 1,
                    found: param.typ.to_string(),
                    expected: self.op.param_types[i].to_string(),
                    opcode: self.op.name.to_string(),
                });
            }
        }
        for param in &self.params {
            if param.raw.is_empty() {
                return Err(SpecError::EmptyParameter);
            }
        }
        Ok(())
    }

    /// Wire size: opcode byte, optional encoding byte, parameter bytes.
    pub fn wire_size(&self) -> usize {
        let mut size = 1;
        if self.op.encoding_byte {
            size += 1;
        }
        for param in &self.params {
            size += param.typ.size(self.op.param_mode);
        }
        size
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.op.name)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, " ({})", params.join(", "))?;
        }
        write!(f, ">")
    }
}

/// One element of a parsed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directive { name: String, value: String },
    Label { name: String },
    Instruction(Instruction),
}
