use std::collections::HashMap;
use std::fmt;

pub mod cpu;

/// Largest value an A-instruction can load.
pub const MAX_ADDRESS: u16 = 0x7fff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dest {
    pub a: bool,
    pub d: bool,
    pub m: bool,
}

impl Dest {
    pub fn new(a: bool, d: bool, m: bool) -> Self {
        Self { a, d, m }
    }

    pub fn none() -> Self {
        Self::new(false, false, false)
    }

    pub fn a() -> Self {
        Self::new(true, false, false)
    }

    pub fn d() -> Self {
        Self::new(false, true, false)
    }

    pub fn m() -> Self {
        Self::new(false, false, true)
    }

    fn is_none(&self) -> bool {
        !(self.a || self.d || self.m)
    }

    fn bits(&self) -> u16 {
        (self.a as u16) << 2 | (self.d as u16) << 1 | self.m as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Zero,
    One,
    A,
    D,
    M,
}

impl Operand {
    fn to_char(self) -> char {
        match self {
            Operand::Zero => '0',
            Operand::One => '1',
            Operand::A => 'A',
            Operand::D => 'D',
            Operand::M => 'M',
        }
    }

    fn from_byte(c: u8) -> Option<Self> {
        Some(match c {
            b'0' => Operand::Zero,
            b'1' => Operand::One,
            b'A' => Operand::A,
            b'D' => Operand::D,
            b'M' => Operand::M,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    And,
    Or,
    Not,
}

impl Operator {
    fn to_char(self) -> char {
        match self {
            Operator::Plus => '+',
            Operator::Minus => '-',
            Operator::And => '&',
            Operator::Or => '|',
            Operator::Not => '!',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comp {
    Unary(Option<Operator>, Operand),
    Binary(Operand, Operator, Operand),
}

impl fmt::Display for Comp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comp::Unary(op, operand) => {
                if let Some(op) = op {
                    write!(f, "{}", op.to_char())?;
                }
                write!(f, "{}", operand.to_char())
            }
            Comp::Binary(lhs, op, rhs) => {
                write!(f, "{}{}{}", lhs.to_char(), op.to_char(), rhs.to_char())
            }
        }
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    JGT = 0b001,
    JEQ = 0b010,
    JGE = 0b011,
    JLT = 0b100,
    JNE = 0b101,
    JLE = 0b110,
    JMP = 0b111,
}

impl Jump {
    fn as_str(self) -> &'static str {
        match self {
            Jump::JGT => "JGT",
            Jump::JEQ => "JEQ",
            Jump::JGE => "JGE",
            Jump::JLT => "JLT",
            Jump::JNE => "JNE",
            Jump::JLE => "JLE",
            Jump::JMP => "JMP",
        }
    }
}

/// One line of Hack assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Address(String),
    Compute(Dest, Comp, Option<Jump>),
    Label(String),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Address(symbol) => write!(f, "@{}", symbol),
            Instruction::Compute(dest, comp, jump) => {
                if !dest.is_none() {
                    if dest.a {
                        f.write_str("A")?;
                    }
                    if dest.d {
                        f.write_str("D")?;
                    }
                    if dest.m {
                        f.write_str("M")?;
                    }
                    f.write_str("=")?;
                }
                write!(f, "{}", comp)?;
                if let Some(jump) = jump {
                    write!(f, ";{}", jump.as_str())?;
                }
                Ok(())
            }
            Instruction::Label(symbol) => write!(f, "({})", symbol),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error("line {line}: missing symbol")]
    MissingSymbol { line: usize },
    #[error("line {line}: unclosed label ({symbol}")]
    UnclosedLabel { line: usize, symbol: String },
    #[error("line {line}: illegal dest {text:?}")]
    IllegalDest { line: usize, text: String },
    #[error("line {line}: illegal comp {text:?}")]
    IllegalComp { line: usize, text: String },
    #[error("line {line}: illegal jump {text:?}")]
    IllegalJump { line: usize, text: String },
    #[error("line {line}: unexpected character {ch:?}")]
    UnexpectedChar { line: usize, ch: char },
    #[error("address {value} out of range")]
    AddressOutOfRange { value: String },
    #[error("label {0} defined twice")]
    DuplicateLabel(String),
    #[error("program does not fit in ROM")]
    ProgramTooLarge,
}

fn lossy(s: &[u8]) -> String {
    String::from_utf8_lossy(s).into_owned()
}

struct Parser<'a> {
    s: &'a [u8],
    p: usize,
    ln: usize,
}

impl<'a> Parser<'a> {
    fn new(s: &'a [u8]) -> Self {
        Self { s, p: 0, ln: 1 }
    }

    fn eof(&self) -> bool {
        self.p >= self.s.len()
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.p).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_ascii_whitespace() {
                break;
            }
            if c == b'\n' {
                self.ln += 1;
            }
            self.p += 1;
        }
    }

    fn scan(&mut self, accept: impl Fn(u8) -> bool) -> &'a [u8] {
        let b = self.p;
        let mut i = self.p;
        while i < self.s.len() {
            if !accept(self.s[i]) {
                break;
            }
            i += 1;
        }
        self.p = i;
        &self.s[b..i]
    }

    fn read_symbol(&mut self) -> Result<String, AsmError> {
        let symbol =
            self.scan(|c| c.is_ascii_alphanumeric() || matches!(c, b'_' | b'.' | b'$' | b':'));
        if symbol.is_empty() {
            return Err(AsmError::MissingSymbol { line: self.ln });
        }
        Ok(lossy(symbol))
    }

    fn read_a_instr(&mut self) -> Result<Instruction, AsmError> {
        self.p += 1;
        Ok(Instruction::Address(self.read_symbol()?))
    }

    fn read_expr(&mut self) -> &'a [u8] {
        self.scan(|c| {
            matches!(
                c,
                b'0' | b'1' | b'D' | b'A' | b'M' | b'-' | b'!' | b'+' | b'&' | b'|'
            )
        })
    }

    fn parse_comp_expr(&self, expr: &[u8]) -> Result<Comp, AsmError> {
        let illegal = || AsmError::IllegalComp {
            line: self.ln,
            text: lossy(expr),
        };
        let operand = |i: usize| {
            expr.get(i)
                .copied()
                .and_then(Operand::from_byte)
                .ok_or_else(illegal)
        };
        let comp = match expr {
            [b'!' | b'-', _] => Comp::Unary(
                Some(if expr[0] == b'!' {
                    Operator::Not
                } else {
                    Operator::Minus
                }),
                operand(1)?,
            ),
            [_] => Comp::Unary(None, operand(0)?),
            [_, op, _] => {
                let op = match op {
                    b'+' => Operator::Plus,
                    b'-' => Operator::Minus,
                    b'&' => Operator::And,
                    b'|' => Operator::Or,
                    _ => return Err(illegal()),
                };
                Comp::Binary(operand(0)?, op, operand(2)?)
            }
            _ => return Err(illegal()),
        };
        Ok(comp)
    }

    fn read_c_instr(&mut self) -> Result<Instruction, AsmError> {
        let mut dest = Dest::none();
        let dest_or_comp = self.read_expr();
        let comp_expr = if self.peek() == Some(b'=') {
            for c in dest_or_comp {
                match *c {
                    b'A' => dest.a = true,
                    b'D' => dest.d = true,
                    b'M' => dest.m = true,
                    _ => {
                        return Err(AsmError::IllegalDest {
                            line: self.ln,
                            text: lossy(dest_or_comp),
                        })
                    }
                }
            }
            self.p += 1;
            self.read_expr()
        } else {
            dest_or_comp
        };

        let comp = self.parse_comp_expr(comp_expr)?;

        let jump = if self.peek() == Some(b';') {
            self.p += 1;
            let jump = self.scan(|c| c.is_ascii_uppercase());
            Some(match jump {
                b"JGT" => Jump::JGT,
                b"JEQ" => Jump::JEQ,
                b"JGE" => Jump::JGE,
                b"JLT" => Jump::JLT,
                b"JNE" => Jump::JNE,
                b"JLE" => Jump::JLE,
                b"JMP" => Jump::JMP,
                _ => {
                    return Err(AsmError::IllegalJump {
                        line: self.ln,
                        text: lossy(jump),
                    })
                }
            })
        } else {
            None
        };

        Ok(Instruction::Compute(dest, comp, jump))
    }

    fn read_l_instr(&mut self) -> Result<Instruction, AsmError> {
        self.p += 1;
        let symbol = self.read_symbol()?;
        if self.peek() != Some(b')') {
            return Err(AsmError::UnclosedLabel {
                line: self.ln,
                symbol,
            });
        }
        self.p += 1;
        Ok(Instruction::Label(symbol))
    }

    // Anything after an instruction must be whitespace or a comment.
    fn expect_end(&self) -> Result<(), AsmError> {
        match self.peek() {
            None | Some(b'/') => Ok(()),
            Some(c) if c.is_ascii_whitespace() => Ok(()),
            Some(c) => Err(AsmError::UnexpectedChar {
                line: self.ln,
                ch: c as char,
            }),
        }
    }

    fn next(&mut self) -> Option<Result<Instruction, AsmError>> {
        // COMMENT = "//" text "\n"
        // SYMBOL = (letter | digit | "_" | "." | "$" | ":")+
        // A-INSTR = "@" (SYMBOL | digit+)
        // L-INSTR = "(" SYMBOL ")"
        // EXPR = "0" | "1" | "D" | "A" | "M" | (("-" | "!") EXPR) | (EXPR ("+" | "-" | "&" | "|") EXPR)
        // C-INSTR = (DEST "=")? EXPR (";" JUMP)?
        loop {
            self.skip_whitespace();
            if self.eof() {
                break;
            }
            if self.s[self.p] == b'/' {
                self.scan(|c| c != b'\n');
                continue;
            }
            let instr = match self.s[self.p] {
                b'@' => self.read_a_instr(),
                b'(' => self.read_l_instr(),
                _ => self.read_c_instr(),
            };
            return Some(instr.and_then(|instr| self.expect_end().map(|_| instr)));
        }
        None
    }
}

/// Parses assembly text into instructions, labels included.
pub fn parse(source: &[u8]) -> Result<Vec<Instruction>, AsmError> {
    let mut parser = Parser::new(source);
    let mut instrs = Vec::new();
    while let Some(instr) = parser.next() {
        instrs.push(instr?);
    }
    Ok(instrs)
}

fn assemble_comp(comp: Comp) -> u16 {
    // a zx nx zy ny f no
    // if (zx == 1) set x = 0
    // if (nx == 1) set x = !x
    // if (zy == 1) set y = 0
    // if (ny == 1) set y = !y
    // if (f == 1)  set out = x + y
    // if (f == 0)  set out = x & y
    // if (no == 1) set out = !out
    let mut a = false;
    let mut zx = false;
    let mut nx = false;
    let mut zy = false;
    let mut ny = false;
    let mut f = false;
    let mut no = false;

    match comp {
        Comp::Unary(op, operand) => match operand {
            Operand::Zero => {
                zx = true;
                zy = true;
                f = true;
            }
            Operand::One => {
                let neg = matches!(op, Some(Operator::Minus));
                zx = true;
                nx = true;
                zy = true;
                ny = !neg;
                f = true;
                no = !neg;
            }
            Operand::D => {
                let neg = matches!(op, Some(Operator::Minus));
                let not = matches!(op, Some(Operator::Not));
                zy = true;
                ny = true;
                f = neg;
                no = not || neg;
            }
            Operand::A | Operand::M => {
                let neg = matches!(op, Some(Operator::Minus));
                let not = matches!(op, Some(Operator::Not));
                a = matches!(operand, Operand::M);
                zx = true;
                nx = true;
                f = neg;
                no = not || neg;
            }
        },
        Comp::Binary(lhs, op, rhs) => {
            if matches!(op, Operator::Plus | Operator::Minus) {
                f = true;
                let is_lhs_d = matches!(lhs, Operand::D);
                let is_rhs_one = matches!(rhs, Operand::One);
                if matches!(op, Operator::Minus) {
                    zx = !is_lhs_d && is_rhs_one;
                    nx = is_lhs_d ^ is_rhs_one;
                    zy = is_lhs_d && is_rhs_one;
                    ny = !nx;
                    no = !is_rhs_one;
                } else if is_rhs_one {
                    zx = !is_lhs_d;
                    nx = true;
                    zy = is_lhs_d;
                    ny = true;
                    no = true;
                }
            } else {
                let is_or = matches!(op, Operator::Or);
                nx = is_or;
                ny = is_or;
                no = is_or;
            }
            a = matches!(lhs, Operand::M) || matches!(rhs, Operand::M);
        }
    }

    (a as u16) << 6
        | (zx as u16) << 5
        | (nx as u16) << 4
        | (zy as u16) << 3
        | (ny as u16) << 2
        | (f as u16) << 1
        | (no as u16)
}

fn predefined_symbols() -> HashMap<String, u16> {
    let mut sym_table = HashMap::new();
    for i in 0..=15u16 {
        sym_table.insert(format!("R{}", i), i);
    }
    sym_table.insert("SP".to_string(), 0);
    sym_table.insert("LCL".to_string(), 1);
    sym_table.insert("ARG".to_string(), 2);
    sym_table.insert("THIS".to_string(), 3);
    sym_table.insert("THAT".to_string(), 4);
    sym_table.insert("SCREEN".to_string(), 16384);
    sym_table.insert("KBD".to_string(), 24576);
    sym_table
}

/// Assembles Hack assembly into machine words, handing each to `emit` in ROM order.
pub fn assemble(source: &[u8], mut emit: impl FnMut(u16)) -> Result<(), AsmError> {
    const RAM_BASE: u16 = 16;

    let mut sym_table = predefined_symbols();
    let mut offset = 0u16;
    let mut instrs = Vec::new();
    for instr in parse(source)? {
        // offsets past MAX_ADDRESS can be neither stored nor loaded into A
        if offset > MAX_ADDRESS {
            return Err(AsmError::ProgramTooLarge);
        }
        if let Instruction::Label(label) = instr {
            if sym_table.insert(label.clone(), offset).is_some() {
                return Err(AsmError::DuplicateLabel(label));
            }
        } else {
            instrs.push(instr);
            offset += 1;
        }
    }

    let mut ram_alloc = RAM_BASE;
    for instr in instrs {
        match instr {
            Instruction::Address(symbol) => {
                let addr = if symbol.as_bytes()[0].is_ascii_digit() {
                    symbol
                        .parse::<u16>()
                        .ok()
                        .filter(|v| *v <= MAX_ADDRESS)
                        .ok_or(AsmError::AddressOutOfRange { value: symbol })?
                } else {
                    *sym_table.entry(symbol).or_insert_with(|| {
                        let addr = ram_alloc;
                        ram_alloc += 1;
                        addr
                    })
                };
                emit(addr);
            }
            Instruction::Compute(dest, comp, jump) => {
                let ac = assemble_comp(comp);
                let j = jump.map(|j| j as u16).unwrap_or(0);
                emit(0b1110000000000000 | ac << 6 | dest.bits() << 3 | j);
            }
            Instruction::Label(_) => {}
        }
    }
    Ok(())
}
