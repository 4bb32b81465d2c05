//! Binary image to node list, with best-effort source reconciliation.

use std::io::Read;

use flate2::read::GzDecoder;
use log::warn;
use md5::{Digest, Md5};
use tar::Archive;

use corewar_assembler::{encode, Program};
use corewar_spec::header::header_struct_size;
use corewar_spec::{Node, ProgramHeader, MEM_SIZE};

use crate::decoder::decode_instruction;
use crate::error::{DisassemblerError, Result};

/// Decode a binary image into a program: the header becomes leading `.name`
/// and `.comment` directives, the code section becomes instruction nodes.
///
/// Bytes that do not start a valid instruction are skipped one at a time;
/// they usually belong to a raw `.code` region.
pub fn decode_program(data: &[u8], strict: bool) -> Result<Program> {
    if data.len() > MEM_SIZE {
        return Err(DisassemblerError::ProgramTooLarge {
            size: data.len(),
            mem_size: MEM_SIZE,
        });
    }

    let header = ProgramHeader::from_bytes(data, strict)?;
    let mut program = Program::default();

    program.nodes.push(Node::Directive {
        name: "name".to_string(),
        value: header.prog_name.clone(),
    });
    program
        .directives
        .insert("name".to_string(), header.prog_name);
    if !header.comment.is_empty() {
        program.nodes.push(Node::Directive {
            name: "comment".to_string(),
            value: header.comment.clone(),
        });
        program
            .directives
            .insert("comment".to_string(), header.comment);
    }

    let (header_size, ..) = header_struct_size();
    let mut idx = header_size;
    while idx < data.len() {
        match decode_instruction(&data[idx..]) {
            Ok((ins, size)) => {
                idx += size;
                program.nodes.push(Node::Instruction(ins));
            }
            // Likely raw .code content; resume at the next byte.
            Err(DisassemblerError::InvalidOpcode(_)) => idx += 1,
            Err(err) => return Err(err),
        }
    }

    Ok(program)
}

/// Disassemble a binary image.
///
/// When a known-sources gzip tarball is given, the MD5 of the re-encoded
/// code section is looked up in it; a hit substitutes the richer re-parsed
/// source (with the binary's actual name and comment). A miss, or any
/// archive problem, falls back to the plain decoded program.
pub fn disassemble(data: &[u8], known_sources: Option<&[u8]>, strict: bool) -> Result<Program> {
    let mut program = decode_program(data, strict)?;

    let Some(archive) = known_sources else {
        return Ok(program);
    };

    let body = encode(&mut program, false)?;
    let digest = hex_digest(&body);

    let source = match search_known_sources(archive, &digest) {
        Ok(Some(source)) => source,
        Ok(None) => return Ok(program),
        Err(err) => {
            warn!("failed to search known sources: {err}");
            return Ok(program);
        }
    };

    let mut recovered = match corewar_assembler::parse(&source) {
        Ok(recovered) => recovered,
        Err(err) => {
            warn!("failed to re-parse known source for {digest}: {err}");
            return Ok(program);
        }
    };

    // The archive copy may carry a different name or comment than the
    // binary actually shipped with; the binary wins.
    let actual_name = program.get_directive("name").unwrap_or("").to_string();
    let actual_comment = program.get_directive("comment").unwrap_or("").to_string();
    for node in &mut recovered.nodes {
        if let Node::Directive { name, value } = node {
            if name == "name" {
                *value = actual_name.clone();
            } else if name == "comment" {
                *value = actual_comment.clone();
            }
        }
    }
    recovered
        .directives
        .insert("name".to_string(), actual_name);
    recovered
        .directives
        .insert("comment".to_string(), actual_comment);

    Ok(recovered)
}

/// Lowercase hex MD5 of the code section, the key into the known-sources
/// archive.
pub fn hex_digest(body: &[u8]) -> String {
    Md5::digest(body)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Search a gzip tarball for an entry whose base filename, minus its `.s`
/// extension, equals `digest`.
fn search_known_sources(targz: &[u8], digest: &str) -> std::io::Result<Option<String>> {
    let mut archive = Archive::new(GzDecoder::new(targz));
    let wanted = format!("{digest}.s");

    for entry in archive.entries()? {
        let mut entry = entry?;
        let matches = entry
            .path()?
            .file_name()
            .map_or(false, |name| name.to_string_lossy() == wanted);
        if !matches {
            continue;
        }
        let mut source = String::new();
        entry.read_to_string(&mut source)?;
        return Ok(Some(source));
    }
    Ok(None)
}
