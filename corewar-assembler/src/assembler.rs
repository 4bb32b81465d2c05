//! Compile entry point: source text to a full binary image.

use corewar_spec::ProgramHeader;

use crate::encoder::encode;
use crate::error::{AssemblerError, Result};
use crate::parser::{parse, Program};

/// Compile champion source into a binary image (header plus encoded body).
///
/// Also returns the parsed program for callers that need the node list.
/// Strict mode promotes warnings (register range, `.code` without
/// `.extend`) to errors.
pub fn compile(source: &str, strict: bool) -> Result<(Vec<u8>, Program)> {
    let mut program = parse(source)?;
    let body = encode(&mut program, strict)?;

    let name = program
        .get_directive("name")
        .filter(|name| !name.is_empty())
        .ok_or(AssemblerError::MissingName)?
        .to_string();
    let comment = program.get_directive("comment").unwrap_or("").to_string();

    let header = ProgramHeader::new(&name, &comment, body.len() as u32)?;
    let mut image = header.to_bytes();
    image.extend_from_slice(&body);

    Ok((image, program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use corewar_spec::header::header_struct_size;
    use corewar_spec::COREWAR_EXEC_MAGIC;

    #[test]
    fn test_compile_simple_champion() {
        let source = ".name \"zork\"\n.comment \"x\"\nlive: live %1\nzjmp %:live\n";
        let (image, _) = compile(source, true).unwrap();

        let (header_size, ..) = header_struct_size();
        assert_eq!(image.len(), header_size + 8);

        let magic = u32::from_be_bytes(image[..4].try_into().unwrap());
        assert_eq!(magic, COREWAR_EXEC_MAGIC);
        assert_eq!(
            &image[header_size..],
            &[0x01, 0x00, 0x00, 0x00, 0x01, 0x09, 0xFF, 0xFB]
        );
    }

    #[test]
    fn test_compile_records_prog_size() {
        let (image, _) = compile(".name \"a\"\nlive %1\n", true).unwrap();
        let size = u32::from_be_bytes(image[136..140].try_into().unwrap());
        assert_eq!(size, 5);
    }

    #[test]
    fn test_compile_name_in_header() {
        let (image, _) = compile(".name \"zork\"\nlive %1\n", true).unwrap();
        assert_eq!(&image[4..8], b"zork");
        assert_eq!(image[8], 0);
    }

    #[test]
    fn test_compile_requires_name() {
        let err = compile("live %1\n", true).unwrap_err();
        assert!(matches!(err, AssemblerError::MissingName));
        let err = compile(".name \"\"\nlive %1\n", true).unwrap_err();
        assert!(matches!(err, AssemblerError::MissingName));
    }

    #[test]
    fn test_compile_comment_too_long() {
        let source = format!(".name \"a\"\n.comment \"{}\"\nlive %1\n", "c".repeat(2049));
        assert!(compile(&source, true).is_err());
    }

    #[test]
    fn test_compile_empty_body_is_legal() {
        let (image, _) = compile(".name \"empty\"\n", true).unwrap();
        let (header_size, ..) = header_struct_size();
        assert_eq!(image.len(), header_size);
    }
}
