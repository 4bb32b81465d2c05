//! Parser for Corewar assembly source.
//!
//! Drives the lexer with one-token lookahead and produces an ordered node
//! list plus a last-wins directive map. Labels are unique per program;
//! duplicate directives are accepted.

use std::collections::HashMap;

use corewar_spec::{opcode, Instruction, Modifier, Node, Parameter, ParamType, Sign, REGISTER_CHAR};

use crate::error::{AssemblerError, Result};
use crate::lexer::{Item, ItemKind, Lexer};

/// Parsed champion source: ordered nodes and the directive map.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub nodes: Vec<Node>,
    pub directives: HashMap<String, String>,
}

impl Program {
    /// Value of a directive by bare name (no leading dot). Last one wins.
    pub fn get_directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }
}

/// Parse champion source into a [`Program`].
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source).run()
}

struct Parser {
    lexer: Lexer,
    cur: Item,
    peek: Item,
    program: Program,
}

impl Parser {
    fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let peek = lexer.next_item();
        Parser {
            lexer,
            cur: Item {
                kind: ItemKind::Eof,
                val: String::new(),
                pos: 0,
                line: 0,
            },
            peek,
            program: Program::default(),
        }
    }

    fn next_token(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_item());
    }

    fn lex_error(&self) -> AssemblerError {
        AssemblerError::LexError {
            line: self.cur.line,
            pos: self.cur.pos,
            message: self.cur.val.clone(),
        }
    }

    fn run(mut self) -> Result<Program> {
        loop {
            self.next_token();
            match self.cur.kind {
                ItemKind::Eof => break,
                ItemKind::Error => return Err(self.lex_error()),
                ItemKind::Newline | ItemKind::Comment => continue,
                ItemKind::Directive => self.parse_directive()?,
                ItemKind::LabelDef => self.parse_label()?,
                ItemKind::Identifier => self.parse_instruction()?,
                _ => {
                    return Err(AssemblerError::SyntaxError {
                        line: self.cur.line,
                        message: format!("unexpected item {}", self.cur),
                    });
                }
            }
        }
        Ok(self.program)
    }

    fn parse_label(&mut self) -> Result<()> {
        let name = self.cur.val.clone();
        let duplicate = self.program.nodes.iter().any(
            |node| matches!(node, Node::Label { name: existing } if *existing == name),
        );
        if duplicate {
            return Err(AssemblerError::DuplicateLabel {
                line: self.cur.line,
                label: name,
            });
        }
        self.program.nodes.push(Node::Label { name });
        Ok(())
    }

    fn parse_directive(&mut self) -> Result<()> {
        let name = self.cur.val.trim_start_matches('.').to_string();
        let line = self.cur.line;
        self.next_token();

        let value = match self.cur.kind {
            // No value, e.g. `.extend`.
            kind if kind.is_eol() => String::new(),
            // Quoted value, e.g. `.name "zork"`.
            ItemKind::RawString => {
                let val = &self.cur.val;
                val.strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(val)
                    .to_string()
            }
            // Raw tokens until end of line, e.g. `.code 01 0A FF`.
            ItemKind::Identifier | ItemKind::Number => {
                let mut value = self.cur.val.clone();
                while matches!(self.peek.kind, ItemKind::Identifier | ItemKind::Number) {
                    self.next_token();
                    value.push(' ');
                    value.push_str(&self.cur.val);
                }
                value
            }
            ItemKind::Error => return Err(self.lex_error()),
            _ => {
                return Err(AssemblerError::SyntaxError {
                    line,
                    message: format!("expected value, got {} for directive {name:?}", self.cur),
                });
            }
        };

        self.program.nodes.push(Node::Directive {
            name: name.clone(),
            value: value.clone(),
        });
        self.program.directives.insert(name, value);
        Ok(())
    }

    fn parse_instruction(&mut self) -> Result<()> {
        let line = self.cur.line;
        let op = opcode::by_name(&self.cur.val).ok_or_else(|| {
            AssemblerError::UnknownInstruction {
                line,
                name: self.cur.val.clone(),
            }
        })?;
        let mut ins = Instruction::new(op);

        let mut param: Option<Parameter> = None;
        // Sign carried by a bare `+`/`-` item, waiting for its operand.
        let mut pending_sign: Option<Sign> = None;

        loop {
            self.next_token();
            match self.cur.kind {
                ItemKind::Identifier => {
                    if param.is_some() {
                        return Err(self.unexpected(line));
                    }
                    let val = &self.cur.val;
                    match val.strip_prefix(REGISTER_CHAR) {
                        Some(suffix) => {
                            param = Some(Parameter::new(ParamType::Register, suffix));
                        }
                        None => return Err(self.unexpected(line)),
                    }
                }
                ItemKind::Number => {
                    if let Some(current) = param.as_mut() {
                        if self.cur.val == "+" || self.cur.val == "-" {
                            let sign = if self.cur.val == "-" {
                                Sign::Minus
                            } else {
                                Sign::Plus
                            };
                            pending_sign = Some(compose(pending_sign.take(), sign));
                        } else {
                            let (sign, body) = split_sign(&self.cur.val);
                            let sign = compose(pending_sign.take(), sign);
                            current.modifiers.push(Modifier::new(sign, body));
                        }
                    } else {
                        param = Some(Parameter::new(ParamType::Indirect, self.cur.val.clone()));
                    }
                }
                ItemKind::LabelRef => {
                    if let Some(current) = param.as_mut() {
                        let sign = compose(pending_sign.take(), Sign::Plus);
                        current
                            .modifiers
                            .push(Modifier::new(sign, self.cur.val.clone()));
                    } else {
                        param = Some(Parameter::new(ParamType::Indirect, self.cur.val.clone()));
                    }
                }
                ItemKind::Percent => {
                    if param.is_some() {
                        return Err(AssemblerError::SyntaxError {
                            line,
                            message: "unexpected percent inside parameter".to_string(),
                        });
                    }
                    self.next_token();
                    match self.cur.kind {
                        ItemKind::LabelRef | ItemKind::Number => {
                            param = Some(Parameter::new(ParamType::Direct, self.cur.val.clone()));
                        }
                        ItemKind::Error => return Err(self.lex_error()),
                        _ => {
                            return Err(AssemblerError::SyntaxError {
                                line,
                                message: format!(
                                    "expected label or number for direct value, got {}",
                                    self.cur
                                ),
                            });
                        }
                    }
                }
                ItemKind::Comma => {
                    let done = param.take().ok_or_else(|| AssemblerError::SyntaxError {
                        line,
                        message: "empty parameter before comma".to_string(),
                    })?;
                    ins.params.push(done);
                    pending_sign = None;
                    if self.peek.kind.is_eol() {
                        return Err(AssemblerError::TrailingComma { line });
                    }
                }
                kind if kind.is_eol() => {
                    if let Some(done) = param.take() {
                        ins.params.push(done);
                    }
                    ins.validate_params()
                        .map_err(|source| AssemblerError::InvalidInstruction { line, source })?;
                    self.program.nodes.push(Node::Instruction(ins));
                    return Ok(());
                }
                ItemKind::Error => return Err(self.lex_error()),
                _ => return Err(self.unexpected(line)),
            }
        }
    }

    fn unexpected(&self, line: usize) -> AssemblerError {
        AssemblerError::SyntaxError {
            line,
            message: format!("unexpected token {}", self.cur),
        }
    }
}

/// Split an explicit sign off a numeric literal.
fn split_sign(raw: &str) -> (Sign, &str) {
    if let Some(rest) = raw.strip_prefix('-') {
        (Sign::Minus, rest)
    } else if let Some(rest) = raw.strip_prefix('+') {
        (Sign::Plus, rest)
    } else {
        (Sign::Plus, raw)
    }
}

/// Combine a pending operator sign with the operand's own sign.
fn compose(pending: Option<Sign>, sign: Sign) -> Sign {
    match pending {
        None | Some(Sign::Plus) => sign,
        Some(Sign::Minus) => match sign {
            Sign::Plus => Sign::Minus,
            Sign::Minus => Sign::Plus,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_instruction() {
        let program = parse("live %1\n").unwrap();
        assert_eq!(program.nodes.len(), 1);
        let Node::Instruction(ins) = &program.nodes[0] else {
            panic!("expected instruction");
        };
        assert_eq!(ins.op.name, "live");
        assert_eq!(ins.params.len(), 1);
        assert_eq!(ins.params[0].typ, ParamType::Direct);
        assert_eq!(ins.params[0].raw, "1");
    }

    #[test]
    fn test_parse_register_and_indirect() {
        let program = parse("ld 34, r3").unwrap();
        let Node::Instruction(ins) = &program.nodes[0] else {
            panic!("expected instruction");
        };
        assert_eq!(ins.params[0].typ, ParamType::Indirect);
        assert_eq!(ins.params[0].raw, "34");
        assert_eq!(ins.params[1].typ, ParamType::Register);
        assert_eq!(ins.params[1].raw, "3");
    }

    #[test]
    fn test_parse_label_then_instruction() {
        let program = parse("live: live %1\nzjmp %:live\n").unwrap();
        assert_eq!(program.nodes.len(), 3);
        assert!(matches!(&program.nodes[0], Node::Label { name } if name == "live"));
        let Node::Instruction(zjmp) = &program.nodes[2] else {
            panic!("expected instruction");
        };
        assert_eq!(zjmp.params[0].typ, ParamType::Direct);
        assert_eq!(zjmp.params[0].raw, ":live");
    }

    #[test]
    fn test_parse_indirect_label() {
        let program = parse("ld :data, r5").unwrap();
        let Node::Instruction(ins) = &program.nodes[0] else {
            panic!("expected instruction");
        };
        assert_eq!(ins.params[0].typ, ParamType::Indirect);
        assert_eq!(ins.params[0].raw, ":data");
    }

    #[test]
    fn test_parse_additive_modifiers() {
        let program = parse("lab: ld %:lab-:lab+3, r1").unwrap();
        let Node::Instruction(ins) = &program.nodes[1] else {
            panic!("expected instruction");
        };
        let param = &ins.params[0];
        assert_eq!(param.typ, ParamType::Direct);
        assert_eq!(param.raw, ":lab");
        assert_eq!(param.modifiers.len(), 2);
        assert_eq!(param.modifiers[0].sign, Sign::Minus);
        assert_eq!(param.modifiers[0].raw, ":lab");
        assert_eq!(param.modifiers[1].sign, Sign::Plus);
        assert_eq!(param.modifiers[1].raw, "3");
    }

    #[test]
    fn test_parse_signed_number_modifier() {
        let program = parse("ld %:x-5, r1\nx: live %1").unwrap();
        let Node::Instruction(ins) = &program.nodes[0] else {
            panic!("expected instruction");
        };
        assert_eq!(ins.params[0].modifiers.len(), 1);
        assert_eq!(ins.params[0].modifiers[0].sign, Sign::Minus);
        assert_eq!(ins.params[0].modifiers[0].raw, "5");
    }

    #[test]
    fn test_parse_duplicate_label_rejected() {
        let err = parse("a: live %1\na: live %1\n").unwrap_err();
        assert!(matches!(err, AssemblerError::DuplicateLabel { label, .. } if label == "a"));
    }

    #[test]
    fn test_parse_trailing_comma_rejected() {
        let err = parse("ld %4, r3,\n").unwrap_err();
        assert!(matches!(err, AssemblerError::TrailingComma { .. }));
    }

    #[test]
    fn test_parse_unknown_instruction() {
        let err = parse("frobnicate %1\n").unwrap_err();
        assert!(
            matches!(err, AssemblerError::UnknownInstruction { name, .. } if name == "frobnicate")
        );
    }

    #[test]
    fn test_parse_arity_mismatch() {
        let err = parse("add r1, r2\n").unwrap_err();
        assert!(matches!(err, AssemblerError::InvalidInstruction { .. }));
    }

    #[test]
    fn test_parse_type_mask_violation() {
        // st takes a register first.
        let err = parse("st %1, r2\n").unwrap_err();
        assert!(matches!(err, AssemblerError::InvalidInstruction { .. }));
    }

    #[test]
    fn test_parse_directives() {
        let program = parse(".name \"zork\"\n.comment \"I am zork\"\n").unwrap();
        assert_eq!(program.get_directive("name"), Some("zork"));
        assert_eq!(program.get_directive("comment"), Some("I am zork"));
    }

    #[test]
    fn test_parse_directive_without_value() {
        let program = parse(".extend\n").unwrap();
        assert_eq!(program.get_directive("extend"), Some(""));
    }

    #[test]
    fn test_parse_code_directive_tokens() {
        let program = parse(".extend\n.code 01 0A ff\n").unwrap();
        assert_eq!(program.get_directive("code"), Some("01 0A ff"));
    }

    #[test]
    fn test_parse_duplicate_directive_last_wins() {
        let program = parse(".name \"a\"\n.name \"b\"\n").unwrap();
        assert_eq!(program.get_directive("name"), Some("b"));
        // Both nodes are kept in order.
        let names: Vec<_> = program
            .nodes
            .iter()
            .filter(|n| matches!(n, Node::Directive { .. }))
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_parse_comments_ignored() {
        let program = parse("# header comment\nlive %1 ; inline\n").unwrap();
        assert_eq!(program.nodes.len(), 1);
    }

    #[test]
    fn test_parse_lex_error_propagates() {
        let err = parse(".name \"unterminated\n").unwrap_err();
        assert!(matches!(err, AssemblerError::LexError { .. }));
    }

    #[test]
    fn test_parse_percent_inside_parameter() {
        let err = parse("ld %4%5, r1\n").unwrap_err();
        assert!(matches!(err, AssemblerError::SyntaxError { .. }));
    }

    #[test]
    fn test_compose_signs() {
        assert_eq!(compose(None, Sign::Minus), Sign::Minus);
        assert_eq!(compose(Some(Sign::Plus), Sign::Minus), Sign::Minus);
        assert_eq!(compose(Some(Sign::Minus), Sign::Plus), Sign::Minus);
        assert_eq!(compose(Some(Sign::Minus), Sign::Minus), Sign::Plus);
    }
}
