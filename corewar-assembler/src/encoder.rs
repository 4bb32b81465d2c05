//! Two-pass program encoder.
//!
//! The first pass assigns byte offsets, records label positions and writes
//! zero placeholders for label references it cannot resolve yet. When any
//! reference was missing, a second pass reruns the walk with the full label
//! index; a reference still unresolved there is an error. Label offsets are
//! relative to the start of the instruction that contains the reference.

use std::collections::HashMap;

use log::warn;

use corewar_spec::program::parse_number;
use corewar_spec::{
    Instruction, Node, Parameter, ParamMode, ParamType, SpecError, LABEL_CHAR, REGISTER_COUNT,
};

use crate::error::{AssemblerError, Result};
use crate::parser::Program;

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
    labels: HashMap<String, usize>,
    /// Set on the second pass, when the label index is complete.
    has_label_index: bool,
    has_missing_labels: bool,
    extend_mode: bool,
    strict: bool,
}

/// Encode the program body (no header). Instruction sizes are filled in on
/// the nodes as a side effect.
pub fn encode(program: &mut Program, strict: bool) -> Result<Vec<u8>> {
    let mut encoder = Encoder {
        strict,
        ..Encoder::default()
    };

    encoder.encode_pass(&mut program.nodes)?;
    if !encoder.has_missing_labels {
        return Ok(encoder.buf);
    }

    // Forward references left placeholders behind; re-encode with the now
    // complete label index.
    encoder.has_label_index = true;
    encoder.encode_pass(&mut program.nodes)?;
    Ok(encoder.buf)
}

impl Encoder {
    fn encode_pass(&mut self, nodes: &mut [Node]) -> Result<()> {
        self.buf.clear();
        self.has_missing_labels = false;
        self.extend_mode = false;

        for node in nodes.iter_mut() {
            match node {
                Node::Label { name } => {
                    self.labels.insert(name.clone(), self.buf.len());
                }
                Node::Directive { name, value } => self.encode_directive(name, value)?,
                Node::Instruction(ins) => self.encode_instruction(ins)?,
            }
        }
        Ok(())
    }

    fn encode_directive(&mut self, name: &str, value: &str) -> Result<()> {
        if name == "extend" {
            self.extend_mode = true;
            return Ok(());
        }
        // Only the code directive contributes bytes.
        if name != "code" {
            return Ok(());
        }
        if !self.extend_mode {
            if self.strict {
                return Err(AssemblerError::CodeWithoutExtend);
            }
            warn!(".extend must be set to use .code directive");
        }

        for token in value.split(' ').filter(|t| !t.is_empty()) {
            if token.len() > 2 {
                return Err(AssemblerError::CodeHexTooLong {
                    token: token.to_string(),
                });
            }
            let byte = u8::from_str_radix(token, 16).map_err(|_| {
                AssemblerError::CodeHexInvalid {
                    token: token.to_string(),
                }
            })?;
            self.buf.push(byte);
        }
        Ok(())
    }

    fn encode_instruction(&mut self, ins: &mut Instruction) -> Result<()> {
        // Label offsets are indexed from the instruction start.
        let start = self.buf.len();

        self.buf.push(ins.op.code);
        if ins.op.encoding_byte {
            self.buf.push(ins.params_encoding());
        }

        let mode = ins.op.param_mode;
        for param in &mut ins.params {
            self.resolve_labels(param, start)?;
            self.encode_param(param, mode)?;
        }

        ins.size = self.buf.len() - start;
        Ok(())
    }

    /// Fill in the label-relative values the index already knows about.
    fn resolve_labels(&mut self, param: &mut Parameter, instruction_start: usize) -> Result<()> {
        if param.is_label_ref() {
            param.resolved = self.lookup(&param.raw, instruction_start)?;
        }
        for modifier in &mut param.modifiers {
            if modifier.is_label_ref() {
                modifier.resolved = self.lookup(&modifier.raw, instruction_start)?;
            }
        }
        Ok(())
    }

    fn lookup(&mut self, raw: &str, instruction_start: usize) -> Result<Option<i64>> {
        let name = raw.trim_start_matches(LABEL_CHAR);
        match self.labels.get(name) {
            Some(&offset) => Ok(Some(offset as i64 - instruction_start as i64)),
            None if self.has_label_index => Err(AssemblerError::UnknownLabel {
                label: name.to_string(),
            }),
            None => {
                // Known on the next pass.
                self.has_missing_labels = true;
                Ok(None)
            }
        }
    }

    /// Resolved value of a parameter, substituting zero placeholders for
    /// labels the first pass has not seen yet.
    fn param_value(&self, param: &Parameter) -> Result<i64> {
        let mut n = match param.resolved {
            Some(n) => n,
            None if param.is_label_ref() => 0,
            None => parse_number(&param.raw)?,
        };
        for modifier in &param.modifiers {
            let term = match modifier.resolved {
                Some(term) => term,
                None if modifier.is_label_ref() => 0,
                None => parse_number(&modifier.raw)?,
            };
            n += modifier.sign.apply(term);
        }
        Ok(n)
    }

    fn encode_param(&mut self, param: &Parameter, mode: ParamMode) -> Result<()> {
        let n = self.param_value(param)?;

        if param.typ == ParamType::Register {
            // Registers only go from 1 to REGISTER_COUNT; strict mode
            // enforces it, otherwise the raw byte goes through.
            if n < 1 || n > REGISTER_COUNT as i64 {
                if self.strict {
                    return Err(SpecError::InvalidRegister(n).into());
                }
                warn!("invalid register number {n} for parameter {param}");
            }
            self.buf.push(n as u8);
            return Ok(());
        }

        match mode {
            ParamMode::Dynamic => match param.typ {
                ParamType::Direct => self.buf.extend_from_slice(&(n as u32).to_be_bytes()),
                _ => self.buf.extend_from_slice(&(n as u16).to_be_bytes()),
            },
            ParamMode::Index => self.buf.extend_from_slice(&(n as u16).to_be_bytes()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn encode_source(source: &str) -> Vec<u8> {
        let mut program = parse(source).unwrap();
        encode(&mut program, true).unwrap()
    }

    #[test]
    fn test_encode_live_and_backward_jump() {
        // live is dynamic (4-byte direct), zjmp is indexed (2-byte direct).
        let body = encode_source("live: live %1\nzjmp %:live\n");
        assert_eq!(
            body,
            vec![0x01, 0x00, 0x00, 0x00, 0x01, 0x09, 0xFF, 0xFB]
        );
    }

    #[test]
    fn test_encode_sti_with_label() {
        let body = encode_source("l: sti r1,%:l,%1\nand r1,%0,r1\n");
        // sti: opcode, encoding byte R,D,D, r1, %:l -> 0, %1.
        assert_eq!(&body[..7], &[0x0B, 0x68, 0x01, 0x00, 0x00, 0x00, 0x01]);
        // and: opcode, encoding byte R,D,R, r1, %0 on 4 bytes, r1.
        assert_eq!(
            &body[7..],
            &[0x06, 0x64, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_encode_forward_reference() {
        let body = encode_source("zjmp %:end\nend: live %1\n");
        // zjmp at 0, end at 3: offset 3.
        assert_eq!(&body[..3], &[0x09, 0x00, 0x03]);
    }

    #[test]
    fn test_encode_label_offsets_relative_to_instruction() {
        // Second instruction starts at 5, label at 0: -5.
        let body = encode_source("a: live %1\nld %:a, r2\n");
        assert_eq!(body[5], 0x02);
        // Encoding byte D,R then 4-byte direct -5.
        assert_eq!(&body[6..11], &[0x90, 0xFF, 0xFF, 0xFF, 0xFB]);
    }

    #[test]
    fn test_encode_modifier_arithmetic() {
        let body = encode_source("a: live %1\nb: zjmp %:b-:a\n");
        // b - a = 5, relative terms: (5 - 5) - (0 - 5) = 5.
        assert_eq!(&body[5..], &[0x09, 0x00, 0x05]);
    }

    #[test]
    fn test_encode_unknown_label() {
        let mut program = parse("zjmp %:nowhere\n").unwrap();
        let err = encode(&mut program, true).unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownLabel { label } if label == "nowhere"));
    }

    #[test]
    fn test_encode_register_out_of_range_strict() {
        let mut program = parse("aff r17\n").unwrap();
        assert!(encode(&mut program, true).is_err());
        // Non-strict warns and writes the raw byte.
        let mut program = parse("aff r17\n").unwrap();
        let body = encode(&mut program, false).unwrap();
        assert_eq!(body, vec![0x10, 0x40, 0x11]);
    }

    #[test]
    fn test_encode_code_directive() {
        let body = encode_source(".extend\n.code de ad be ef\n");
        assert_eq!(body, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_encode_code_requires_extend_in_strict() {
        let mut program = parse(".code 00\n").unwrap();
        assert!(matches!(
            encode(&mut program, true),
            Err(AssemblerError::CodeWithoutExtend)
        ));
        let mut program = parse(".code 00\n").unwrap();
        assert_eq!(encode(&mut program, false).unwrap(), vec![0x00]);
    }

    #[test]
    fn test_encode_code_rejects_bad_hex() {
        let mut program = parse(".extend\n.code 123\n").unwrap();
        assert!(matches!(
            encode(&mut program, true),
            Err(AssemblerError::CodeHexTooLong { .. })
        ));
        let mut program = parse(".extend\n.code zz\n").unwrap();
        assert!(matches!(
            encode(&mut program, true),
            Err(AssemblerError::CodeHexInvalid { .. })
        ));
    }

    #[test]
    fn test_encode_sets_instruction_sizes() {
        let mut program = parse("live %1\nzjmp %-5\nsti r1,%0,%1\n").unwrap();
        encode(&mut program, true).unwrap();
        let sizes: Vec<usize> = program
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Instruction(ins) => Some(ins.size),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![5, 3, 7]);
    }

    #[test]
    fn test_encode_size_equals_sum_of_sizes() {
        let mut program = parse("live %1\nld %0, r2\nadd r1, r2, r3\n").unwrap();
        let body = encode(&mut program, true).unwrap();
        let total: usize = program
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Instruction(ins) => Some(ins.size),
                _ => None,
            })
            .sum();
        assert_eq!(body.len(), total);
    }

    #[test]
    fn test_encode_number_bases() {
        let body = encode_source("ld %0x10, r1\n");
        assert_eq!(&body[2..6], &[0x00, 0x00, 0x00, 0x10]);
    }
}
