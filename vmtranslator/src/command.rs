use std::fmt;
use std::str::FromStr;

use crate::error::TranslateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Arithmetic,
    Push,
    Pop,
    Label,
    Goto,
    IfGoto,
    Function,
    Call,
    Return,
    /// The command could not be parsed. Never used for end of input.
    Error,
}

impl CommandKind {
    /// Looks up a command keyword, returning its kind and how many arguments follow it.
    pub fn from_keyword(word: &str) -> Option<(CommandKind, usize)> {
        Some(match word {
            "add" | "sub" | "neg" | "eq" | "gt" | "lt" | "and" | "or" | "not" => {
                (CommandKind::Arithmetic, 0)
            }
            "return" => (CommandKind::Return, 0),
            "label" => (CommandKind::Label, 1),
            "goto" => (CommandKind::Goto, 1),
            "if-goto" => (CommandKind::IfGoto, 1),
            "push" => (CommandKind::Push, 2),
            "pop" => (CommandKind::Pop, 2),
            "function" => (CommandKind::Function, 2),
            "call" => (CommandKind::Call, 2),
            _ => return None,
        })
    }
}

/// A parsed command with its raw arguments.
///
/// `arg1` is the operator for arithmetic commands, the segment for push/pop and
/// the symbol otherwise. `arg2` is the index or count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub arg1: Option<String>,
    pub arg2: Option<u16>,
}

impl Command {
    pub fn error() -> Self {
        Self {
            kind: CommandKind::Error,
            arg1: None,
            arg2: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Argument,
    Local,
    Static,
    Constant,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::Constant => "constant",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }
}

impl FromStr for Segment {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "argument" => Segment::Argument,
            "local" => Segment::Local,
            "static" => Segment::Static,
            "constant" => Segment::Constant,
            "this" => Segment::This,
            "that" => Segment::That,
            "pointer" => Segment::Pointer,
            "temp" => Segment::Temp,
            _ => return Err(TranslateError::UnknownSegment(s.to_string())),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl ArithmeticOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Gt => "gt",
            ArithmeticOp::Lt => "lt",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
        }
    }
}

impl FromStr for ArithmeticOp {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "add" => ArithmeticOp::Add,
            "sub" => ArithmeticOp::Sub,
            "neg" => ArithmeticOp::Neg,
            "eq" => ArithmeticOp::Eq,
            "gt" => ArithmeticOp::Gt,
            "lt" => ArithmeticOp::Lt,
            "and" => ArithmeticOp::And,
            "or" => ArithmeticOp::Or,
            "not" => ArithmeticOp::Not,
            _ => return Err(TranslateError::UnknownOperator(s.to_string())),
        })
    }
}

/// A fully typed VM instruction, ready for code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Arithmetic(ArithmeticOp),
    Push(Segment, u16),
    Pop(Segment, u16),
    Label(String),
    Goto(String),
    IfGoto(String),
    Function(String, u16),
    Call(String, u16),
    Return,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Arithmetic(op) => f.write_str(op.as_str()),
            Instruction::Push(seg, i) => write!(f, "push {} {}", seg, i),
            Instruction::Pop(seg, i) => write!(f, "pop {} {}", seg, i),
            Instruction::Label(label) => write!(f, "label {}", label),
            Instruction::Goto(label) => write!(f, "goto {}", label),
            Instruction::IfGoto(label) => write!(f, "if-goto {}", label),
            Instruction::Function(name, n) => write!(f, "function {} {}", name, n),
            Instruction::Call(name, n) => write!(f, "call {} {}", name, n),
            Instruction::Return => f.write_str("return"),
        }
    }
}

impl TryFrom<&Command> for Instruction {
    type Error = TranslateError;

    fn try_from(cmd: &Command) -> Result<Self, Self::Error> {
        let name = |what| {
            cmd.arg1
                .clone()
                .ok_or(TranslateError::Malformed(what))
        };
        let count = |what| cmd.arg2.ok_or(TranslateError::Malformed(what));
        Ok(match cmd.kind {
            CommandKind::Arithmetic => Instruction::Arithmetic(name("arithmetic")?.parse()?),
            CommandKind::Push => Instruction::Push(name("push")?.parse()?, count("push")?),
            CommandKind::Pop => Instruction::Pop(name("pop")?.parse()?, count("pop")?),
            CommandKind::Label => Instruction::Label(name("label")?),
            CommandKind::Goto => Instruction::Goto(name("goto")?),
            CommandKind::IfGoto => Instruction::IfGoto(name("if-goto")?),
            CommandKind::Function => Instruction::Function(name("function")?, count("function")?),
            CommandKind::Call => Instruction::Call(name("call")?, count("call")?),
            CommandKind::Return => Instruction::Return,
            CommandKind::Error => return Err(TranslateError::Malformed("erroneous")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(kind: CommandKind, arg1: Option<&str>, arg2: Option<u16>) -> Command {
        Command {
            kind,
            arg1: arg1.map(str::to_string),
            arg2,
        }
    }

    #[test]
    fn test_keyword_arity() {
        for word in ["add", "sub", "neg", "eq", "gt", "lt", "and", "or", "not", "return"] {
            assert_eq!(CommandKind::from_keyword(word).map(|(_, n)| n), Some(0));
        }
        for word in ["label", "goto", "if-goto"] {
            assert_eq!(CommandKind::from_keyword(word).map(|(_, n)| n), Some(1));
        }
        for word in ["push", "pop", "function", "call"] {
            assert_eq!(CommandKind::from_keyword(word).map(|(_, n)| n), Some(2));
        }
        assert_eq!(CommandKind::from_keyword("mul"), None);
    }

    #[test]
    fn test_instruction_from_command() {
        assert_eq!(
            Instruction::try_from(&cmd(CommandKind::Push, Some("local"), Some(3))).unwrap(),
            Instruction::Push(Segment::Local, 3)
        );
        assert_eq!(
            Instruction::try_from(&cmd(CommandKind::Arithmetic, Some("lt"), None)).unwrap(),
            Instruction::Arithmetic(ArithmeticOp::Lt)
        );
        assert_eq!(
            Instruction::try_from(&cmd(CommandKind::Call, Some("Math.max"), Some(2)))
                .unwrap()
                .to_string(),
            "call Math.max 2"
        );
    }

    #[test]
    fn test_instruction_from_bad_command() {
        assert!(matches!(
            Instruction::try_from(&cmd(CommandKind::Arithmetic, Some("mul"), None)),
            Err(TranslateError::UnknownOperator(op)) if op == "mul"
        ));
        assert!(matches!(
            Instruction::try_from(&cmd(CommandKind::Pop, Some("heap"), Some(0))),
            Err(TranslateError::UnknownSegment(seg)) if seg == "heap"
        ));
        assert!(matches!(
            Instruction::try_from(&cmd(CommandKind::Push, Some("local"), None)),
            Err(TranslateError::Malformed("push"))
        ));
        assert!(matches!(
            Instruction::try_from(&Command::error()),
            Err(TranslateError::Malformed(_))
        ));
    }
}
