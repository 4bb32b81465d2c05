//! Instruction decoder.
//!
//! The exact inverse of the assembler's per-instruction encoding. The VM
//! calls this at execution time on a lookahead window at each process pc;
//! the program decoder calls it in a loop over a whole code section.

use corewar_spec::{opcode, Instruction, ParamMode, Parameter, ParamType, ParamTypeMask};

use crate::error::{DisassemblerError, Result};

/// Decode exactly one instruction from the front of `buf`.
///
/// Returns the instruction and how many bytes were consumed.
pub fn decode_instruction(buf: &[u8]) -> Result<(Instruction, usize)> {
    if buf.is_empty() {
        return Err(DisassemblerError::EmptyBuffer);
    }

    let op = opcode::by_code(buf[0]).ok_or(DisassemblerError::InvalidOpcode(buf[0]))?;
    let mut idx = 1;
    let mut ins = Instruction::new(op);

    let types = if op.encoding_byte {
        if idx >= buf.len() {
            return Err(DisassemblerError::Truncated {
                opcode: op.name,
                what: "encoding byte",
            });
        }
        let encoding = buf[idx];
        idx += 1;
        decode_params_encoding(op.name, op.param_types, encoding)?
    } else {
        // No encoding byte: the types come from the opcode descriptor.
        op.param_types.iter().map(|mask| mask_type(*mask)).collect()
    };

    for typ in types {
        let size = typ.size(op.param_mode);
        if idx + size > buf.len() {
            return Err(DisassemblerError::Truncated {
                opcode: op.name,
                what: "parameter data",
            });
        }
        let value = match typ {
            ParamType::Register => buf[idx] as i64,
            _ => match op.param_mode {
                ParamMode::Dynamic => match typ {
                    // Direct values keep their full unsigned width.
                    ParamType::Direct => {
                        u32::from_be_bytes(buf[idx..idx + 4].try_into().unwrap()) as i64
                    }
                    // Indirect references are signed 16-bit offsets.
                    _ => i16::from_be_bytes(buf[idx..idx + 2].try_into().unwrap()) as i64,
                },
                ParamMode::Index => {
                    i16::from_be_bytes(buf[idx..idx + 2].try_into().unwrap()) as i64
                }
            },
        };
        idx += size;
        ins.params.push(Parameter::with_value(typ, value));
    }

    ins.size = idx;
    Ok((ins, idx))
}

/// Reverse of the encoding byte: leftmost pair describes parameter 0, and
/// each decoded type must lie within the opcode's mask for that position.
fn decode_params_encoding(
    opcode: &'static str,
    masks: &[ParamTypeMask],
    encoding: u8,
) -> Result<Vec<ParamType>> {
    let mut types = Vec::with_capacity(masks.len());
    for (i, mask) in masks.iter().enumerate() {
        let bits = (encoding >> ((3 - i) * 2)) & 0b11;
        let typ = ParamType::from_encoding(bits).ok_or(DisassemblerError::InvalidEncodingByte {
            byte: encoding,
            opcode,
        })?;
        if !mask.contains(typ) {
            return Err(DisassemblerError::DisallowedType {
                index: i + 1,
                found: typ.to_string(),
                expected: mask.to_string(),
                opcode,
            });
        }
        types.push(typ);
    }
    Ok(types)
}

fn mask_type(mask: ParamTypeMask) -> ParamType {
    if mask.contains(ParamType::Register) {
        ParamType::Register
    } else if mask.contains(ParamType::Direct) {
        ParamType::Direct
    } else {
        ParamType::Indirect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_live() {
        let (ins, size) = decode_instruction(&[0x01, 0x00, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(ins.op.name, "live");
        assert_eq!(size, 5);
        assert_eq!(ins.size, 5);
        assert_eq!(ins.params[0].typ, ParamType::Direct);
        assert_eq!(ins.params[0].resolved, Some(1));
    }

    #[test]
    fn test_decode_zjmp_negative_offset() {
        let (ins, size) = decode_instruction(&[0x09, 0xFF, 0xFB]).unwrap();
        assert_eq!(ins.op.name, "zjmp");
        assert_eq!(size, 3);
        assert_eq!(ins.params[0].resolved, Some(-5));
    }

    #[test]
    fn test_decode_sti() {
        let (ins, size) =
            decode_instruction(&[0x0B, 0x68, 0x01, 0x00, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(ins.op.name, "sti");
        assert_eq!(size, 7);
        assert_eq!(ins.params[0].typ, ParamType::Register);
        assert_eq!(ins.params[0].resolved, Some(1));
        assert_eq!(ins.params[1].typ, ParamType::Direct);
        assert_eq!(ins.params[1].resolved, Some(0));
        assert_eq!(ins.params[2].typ, ParamType::Direct);
        assert_eq!(ins.params[2].resolved, Some(1));
    }

    #[test]
    fn test_decode_dynamic_indirect_is_signed() {
        // ld -2, r1: encoding byte I,R then 0xFFFE.
        let (ins, _) = decode_instruction(&[0x02, 0xD0, 0xFF, 0xFE, 0x01]).unwrap();
        assert_eq!(ins.params[0].typ, ParamType::Indirect);
        assert_eq!(ins.params[0].resolved, Some(-2));
    }

    #[test]
    fn test_decode_dynamic_direct_is_unsigned() {
        let (ins, _) = decode_instruction(&[0x02, 0x90, 0xFF, 0xFF, 0xFF, 0xFB, 0x01]).unwrap();
        assert_eq!(ins.params[0].typ, ParamType::Direct);
        assert_eq!(ins.params[0].resolved, Some(0xFFFF_FFFB));
    }

    #[test]
    fn test_decode_noop() {
        let (ins, size) = decode_instruction(&[0x00]).unwrap();
        assert_eq!(ins.op.name, "noop");
        assert_eq!(size, 1);
        assert!(ins.params.is_empty());
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert!(matches!(
            decode_instruction(&[]),
            Err(DisassemblerError::EmptyBuffer)
        ));
    }

    #[test]
    fn test_decode_invalid_opcode() {
        assert!(matches!(
            decode_instruction(&[0x42]),
            Err(DisassemblerError::InvalidOpcode(0x42))
        ));
    }

    #[test]
    fn test_decode_truncated_encoding_byte() {
        assert!(matches!(
            decode_instruction(&[0x02]),
            Err(DisassemblerError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_truncated_parameters() {
        // live wants 4 bytes of direct value.
        assert!(matches!(
            decode_instruction(&[0x01, 0x00]),
            Err(DisassemblerError::Truncated { .. })
        ));
        // sti declares three parameters, only one present.
        assert!(matches!(
            decode_instruction(&[0x0B, 0x68, 0x01]),
            Err(DisassemblerError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_empty_encoding_pair() {
        // add wants three parameters, encoding byte only describes one.
        assert!(matches!(
            decode_instruction(&[0x04, 0x40, 0x01, 0x02, 0x03]),
            Err(DisassemblerError::InvalidEncodingByte { .. })
        ));
    }

    #[test]
    fn test_decode_disallowed_type() {
        // add is register-only; encoding byte claims a direct first parameter.
        assert!(matches!(
            decode_instruction(&[0x04, 0x94, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03]),
            Err(DisassemblerError::DisallowedType { index: 1, .. })
        ));
    }

    #[test]
    fn test_decode_register_values() {
        let (ins, _) = decode_instruction(&[0x04, 0x54, 0x01, 0x02, 0x03]).unwrap();
        assert_eq!(ins.op.name, "add");
        let values: Vec<i64> = ins.params.iter().map(|p| p.resolved.unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
