//! Canonical source rendering of a parsed or decoded node list.
//!
//! A single forward walk with an accumulator: the previous node kind decides
//! label spacing, and directives after a label indent with the code unless
//! they trail the last instruction. The output re-assembles byte-identically.

use corewar_spec::{Instruction, Node};

/// Render one instruction as a source line (no indentation).
pub fn format_instruction(ins: &Instruction) -> String {
    let params: Vec<String> = ins.params.iter().map(|p| p.to_string()).collect();
    format!("{:<8}{}", ins.op.name, params.join(", "))
        .trim_end()
        .to_string()
}

/// Render a whole node list as champion source.
pub fn format_program(nodes: &[Node]) -> String {
    let last_instruction = nodes
        .iter()
        .rposition(|node| matches!(node, Node::Instruction(_)));

    let mut lines: Vec<String> = Vec::new();
    let mut label_seen = false;
    let mut prev_was_label = false;

    for (i, node) in nodes.iter().enumerate() {
        match node {
            Node::Label { name } => {
                // Labels open a block: blank line before, unless stacked
                // directly on another label.
                if !prev_was_label && !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.push(format!("{name}:"));
                label_seen = true;
                prev_was_label = true;
            }
            Node::Directive { name, value } => {
                let mut text = format!(".{name}");
                if !value.is_empty() {
                    if name == "code" {
                        text.push_str(&format!(" {value}"));
                    } else {
                        text.push_str(&format!(" \"{value}\""));
                    }
                }
                let trailing = last_instruction.map_or(false, |last| i > last);
                if label_seen && !trailing {
                    lines.push(format!("\t{text}"));
                } else if label_seen && trailing {
                    lines.push(String::new());
                    lines.push(text);
                } else {
                    lines.push(text);
                }
                prev_was_label = false;
            }
            Node::Instruction(ins) => {
                lines.push(format!("\t{}", format_instruction(ins)));
                prev_was_label = false;
            }
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use corewar_spec::{opcode, Parameter, ParamType};

    fn live(value: i64) -> Instruction {
        let mut ins = Instruction::new(opcode::by_name("live").unwrap());
        ins.params.push(Parameter::with_value(ParamType::Direct, value));
        ins
    }

    #[test]
    fn test_format_instruction() {
        assert_eq!(format_instruction(&live(1)), "live    %1");

        let mut st = Instruction::new(opcode::by_name("st").unwrap());
        st.params.push(Parameter::with_value(ParamType::Register, 2));
        st.params.push(Parameter::with_value(ParamType::Indirect, 34));
        assert_eq!(format_instruction(&st), "st      r2, 34");
    }

    #[test]
    fn test_format_label_reference_parameter() {
        let mut zjmp = Instruction::new(opcode::by_name("zjmp").unwrap());
        zjmp.params.push(Parameter::new(ParamType::Direct, ":loop"));
        assert_eq!(format_instruction(&zjmp), "zjmp    %:loop");
    }

    #[test]
    fn test_format_program_layout() {
        let nodes = vec![
            Node::Directive {
                name: "name".to_string(),
                value: "zork".to_string(),
            },
            Node::Label {
                name: "loop".to_string(),
            },
            Node::Instruction(live(1)),
        ];
        assert_eq!(
            format_program(&nodes),
            ".name \"zork\"\n\nloop:\n\tlive    %1\n"
        );
    }

    #[test]
    fn test_format_stacked_labels() {
        let nodes = vec![
            Node::Label {
                name: "a".to_string(),
            },
            Node::Label {
                name: "b".to_string(),
            },
            Node::Instruction(live(1)),
        ];
        assert_eq!(format_program(&nodes), "a:\nb:\n\tlive    %1\n");
    }

    #[test]
    fn test_format_trailing_directive_unindented() {
        let nodes = vec![
            Node::Label {
                name: "l".to_string(),
            },
            Node::Instruction(live(1)),
            Node::Directive {
                name: "comment".to_string(),
                value: "post".to_string(),
            },
        ];
        assert_eq!(
            format_program(&nodes),
            "l:\n\tlive    %1\n\n.comment \"post\"\n"
        );
    }

    #[test]
    fn test_format_code_directive_unquoted() {
        let nodes = vec![
            Node::Directive {
                name: "extend".to_string(),
                value: String::new(),
            },
            Node::Directive {
                name: "code".to_string(),
                value: "01 0a".to_string(),
            },
        ];
        assert_eq!(format_program(&nodes), ".extend\n.code 01 0a\n");
    }
}
