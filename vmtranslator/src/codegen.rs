//! Hack assembly generation for VM instructions.
//!
//! The stack lives at `RAM[SP]` and grows upward. Frame registers `LCL` and
//! `ARG` point into the stack, `THIS`/`THAT` are the pointer segment, R5-R12
//! the temp segment and R13/R14 scratch.

use std::collections::HashSet;
use std::io::Write;

use assembler::{Comp, Dest, Jump, Operand, Operator, MAX_ADDRESS};
use tracing::trace;

use crate::command::{ArithmeticOp, Instruction, Segment};
use crate::error::TranslateError;

type Result<T = ()> = std::result::Result<T, TranslateError>;

/// Initial value of the stack pointer set by the bootstrap.
pub const STACK_BASE: u16 = 256;

/// Entry function called by the bootstrap.
pub const ENTRY_POINT: &str = "Sys.init";

const R_SP: &str = "SP";
const R_LCL: &str = "LCL";
const R_ARG: &str = "ARG";
const R_THIS: &str = "THIS";
const R_THAT: &str = "THAT";
const R_R13: &str = "R13";
const R_R14: &str = "R14";
const R_TEMPS: [&str; 8] = ["R5", "R6", "R7", "R8", "R9", "R10", "R11", "R12"];
const R_PTRS: [&str; 2] = [R_THIS, R_THAT];

// Saved caller frame, in push order. Return restores them from the frame end backwards.
const FRAME: [&str; 4] = [R_LCL, R_ARG, R_THIS, R_THAT];

pub struct CodeWriter<W: Write> {
    out: W,
    label_cnt: usize,
    function: Option<String>,
    file_name: String,
    labels: HashSet<String>,
    annotate: bool,
}

impl<W: Write> CodeWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            label_cnt: 0,
            function: None,
            file_name: String::new(),
            labels: HashSet::new(),
            annotate: false,
        }
    }

    /// Precede each command's code with a `// <command>` line.
    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Names the unit being translated; static variables are keyed by it.
    pub fn set_file_name(&mut self, name: &str) {
        self.file_name = name.to_string();
    }

    /// Flushes and hands back the output stream.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn emit(&mut self, instr: assembler::Instruction) -> Result {
        writeln!(self.out, "{}", instr)?;
        Ok(())
    }

    fn emit_ref(&mut self, a: &str) -> Result {
        self.emit(assembler::Instruction::Address(a.to_string()))
    }

    fn emit_const(&mut self, value: u16) -> Result {
        self.emit_ref(&value.to_string())
    }

    fn emit_label(&mut self, l: &str) -> Result {
        self.emit(assembler::Instruction::Label(l.to_string()))
    }

    // Labels written on behalf of the source, each allowed once per run.
    fn emit_user_label(&mut self, l: &str) -> Result {
        if !self.labels.insert(l.to_string()) {
            return Err(TranslateError::DuplicateLabel(l.to_string()));
        }
        self.emit_label(l)
    }

    fn emit_set(&mut self, dest: Dest, operand: Operand) -> Result {
        self.emit(assembler::Instruction::Compute(
            dest,
            Comp::Unary(None, operand),
            None,
        ))
    }

    fn emit_unary(&mut self, dest: Dest, op: Operator, operand: Operand) -> Result {
        self.emit(assembler::Instruction::Compute(
            dest,
            Comp::Unary(Some(op), operand),
            None,
        ))
    }

    fn emit_binary(&mut self, dest: Dest, l: Operand, op: Operator, r: Operand) -> Result {
        self.emit(assembler::Instruction::Compute(
            dest,
            Comp::Binary(l, op, r),
            None,
        ))
    }

    fn emit_jump(&mut self, label: &str, cond: Operand, jump: Jump) -> Result {
        self.emit_ref(label)?;
        self.emit(assembler::Instruction::Compute(
            Dest::none(),
            Comp::Unary(None, cond),
            Some(jump),
        ))
    }

    fn emit_add(&mut self, dest: Dest, l: Operand, r: Operand) -> Result {
        self.emit_binary(dest, l, Operator::Plus, r)
    }

    fn emit_sub(&mut self, dest: Dest, l: Operand, r: Operand) -> Result {
        self.emit_binary(dest, l, Operator::Minus, r)
    }

    fn emit_load_mem_d(&mut self, symbol: &str) -> Result {
        self.emit_ref(symbol)?;
        self.emit_set(Dest::d(), Operand::M)
    }

    fn emit_store_mem(&mut self, dst: &str, operand: Operand) -> Result {
        self.emit_ref(dst)?;
        self.emit_set(Dest::m(), operand)
    }

    fn emit_push(&mut self, operand: Operand) -> Result {
        // RAM[SP]=operand
        self.emit_ref(R_SP)?;
        self.emit_set(Dest::a(), Operand::M)?;
        self.emit_set(Dest::m(), operand)?;
        // SP+=1
        self.emit_ref(R_SP)?;
        self.emit_add(Dest::m(), Operand::M, Operand::One)
    }

    fn emit_push_d(&mut self) -> Result {
        self.emit_push(Operand::D)
    }

    fn emit_pop_m(&mut self) -> Result {
        // SP-=1
        self.emit_ref(R_SP)?;
        self.emit_sub(Dest::m(), Operand::M, Operand::One)?;
        // A=SP
        self.emit_set(Dest::a(), Operand::M)
    }

    fn emit_pop_d(&mut self) -> Result {
        self.emit_pop_m()?;
        // D=RAM[SP]
        self.emit_set(Dest::d(), Operand::M)
    }

    fn unique_label(&mut self, tag: &str) -> String {
        let n = self.label_cnt;
        self.label_cnt += 1;
        format!("${}.{}", tag, n)
    }

    fn emit_push_cmp_d(&mut self, jump: Jump) -> Result {
        let true_label = self.unique_label("TRUE");
        let end_label = self.unique_label("END");
        // D;<cond> -> true_label
        self.emit_jump(&true_label, Operand::D, jump)?;
        self.emit_set(Dest::d(), Operand::Zero)?;
        self.emit_jump(&end_label, Operand::Zero, Jump::JMP)?;
        self.emit_label(&true_label)?;
        self.emit_unary(Dest::d(), Operator::Minus, Operand::One)?;
        self.emit_label(&end_label)?;
        self.emit_push_d()
    }

    pub fn write_arithmetic(&mut self, op: ArithmeticOp) -> Result {
        match op {
            ArithmeticOp::Add | ArithmeticOp::And | ArithmeticOp::Or => {
                self.emit_pop_d()?;
                self.emit_pop_m()?;
                self.emit_binary(
                    Dest::d(),
                    Operand::D,
                    match op {
                        ArithmeticOp::Add => Operator::Plus,
                        ArithmeticOp::And => Operator::And,
                        _ => Operator::Or,
                    },
                    Operand::M,
                )?;
                self.emit_push_d()
            }
            ArithmeticOp::Sub => {
                self.emit_pop_d()?;
                self.emit_pop_m()?;
                self.emit_sub(Dest::d(), Operand::M, Operand::D)?;
                self.emit_push_d()
            }
            ArithmeticOp::Neg | ArithmeticOp::Not => {
                self.emit_pop_m()?;
                self.emit_unary(
                    Dest::d(),
                    if op == ArithmeticOp::Not {
                        Operator::Not
                    } else {
                        Operator::Minus
                    },
                    Operand::M,
                )?;
                self.emit_push_d()
            }
            ArithmeticOp::Eq | ArithmeticOp::Gt | ArithmeticOp::Lt => {
                self.emit_pop_d()?;
                self.emit_pop_m()?;
                self.emit_sub(Dest::d(), Operand::M, Operand::D)?;
                self.emit_push_cmp_d(match op {
                    ArithmeticOp::Eq => Jump::JEQ,
                    ArithmeticOp::Gt => Jump::JGT,
                    _ => Jump::JLT,
                })
            }
        }
    }

    fn frame_register(seg: Segment) -> &'static str {
        match seg {
            Segment::Local => R_LCL,
            Segment::Argument => R_ARG,
            Segment::This => R_THIS,
            Segment::That => R_THAT,
            _ => unreachable!("{} has no base register", seg),
        }
    }

    // Offsets from a base register are loaded by an A-instruction.
    fn check_offset(seg: Segment, i: u16) -> Result {
        if i > MAX_ADDRESS {
            return Err(TranslateError::IndexOutOfRange { segment: seg, index: i });
        }
        Ok(())
    }

    // Register holding a static, temp or pointer slot.
    fn direct_register(&self, seg: Segment, i: u16) -> Result<String> {
        let fixed = |regs: &[&str]| {
            regs.get(i as usize)
                .map(|r| r.to_string())
                .ok_or(TranslateError::IndexOutOfRange { segment: seg, index: i })
        };
        match seg {
            Segment::Static => Ok(format!("{}.{}", self.file_name, i)),
            Segment::Temp => fixed(&R_TEMPS[..]),
            Segment::Pointer => fixed(&R_PTRS[..]),
            _ => unreachable!("{} is not a direct segment", seg),
        }
    }

    pub fn write_push(&mut self, seg: Segment, i: u16) -> Result {
        match seg {
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                Self::check_offset(seg, i)?;
                let base = Self::frame_register(seg);
                // A=RAM[seg]+i
                self.emit_const(i)?;
                self.emit_set(Dest::d(), Operand::A)?;
                self.emit_ref(base)?;
                self.emit_set(Dest::a(), Operand::M)?;
                self.emit_add(Dest::a(), Operand::D, Operand::A)?;
                // D=RAM[A]
                self.emit_set(Dest::d(), Operand::M)?;
            }
            Segment::Constant => {
                Self::check_offset(seg, i)?;
                self.emit_const(i)?;
                self.emit_set(Dest::d(), Operand::A)?;
            }
            Segment::Static | Segment::Temp | Segment::Pointer => {
                let reg = self.direct_register(seg, i)?;
                self.emit_load_mem_d(&reg)?;
            }
        }
        self.emit_push_d()
    }

    pub fn write_pop(&mut self, seg: Segment, i: u16) -> Result {
        match seg {
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                Self::check_offset(seg, i)?;
                let base = Self::frame_register(seg);
                // R13=RAM[seg]+i, before the pop touches SP
                self.emit_ref(base)?;
                self.emit_set(Dest::d(), Operand::M)?;
                self.emit_const(i)?;
                self.emit_add(Dest::d(), Operand::D, Operand::A)?;
                self.emit_store_mem(R_R13, Operand::D)?;
                self.emit_pop_d()?;
                // RAM[R13]=D
                self.emit_ref(R_R13)?;
                self.emit_set(Dest::a(), Operand::M)?;
                self.emit_set(Dest::m(), Operand::D)
            }
            Segment::Static | Segment::Temp | Segment::Pointer => {
                let reg = self.direct_register(seg, i)?;
                self.emit_pop_d()?;
                self.emit_store_mem(&reg, Operand::D)
            }
            Segment::Constant => Err(TranslateError::PopConstant),
        }
    }

    fn scope(&self) -> &str {
        self.function.as_deref().unwrap_or(&self.file_name)
    }

    fn label_symbol(&self, label: &str) -> String {
        format!("{}${}", self.scope(), label)
    }

    pub fn write_label(&mut self, label: &str) -> Result {
        let label = self.label_symbol(label);
        self.emit_user_label(&label)
    }

    pub fn write_goto(&mut self, label: &str) -> Result {
        let label = self.label_symbol(label);
        self.emit_jump(&label, Operand::Zero, Jump::JMP)
    }

    pub fn write_if(&mut self, label: &str) -> Result {
        self.emit_pop_d()?;
        let label = self.label_symbol(label);
        self.emit_jump(&label, Operand::D, Jump::JNE)
    }

    pub fn write_call(&mut self, name: &str, n: u16) -> Result {
        let offset = n
            .checked_add(FRAME.len() as u16 + 1)
            .filter(|v| *v <= MAX_ADDRESS)
            .ok_or_else(|| TranslateError::TooManyArguments(name.to_string()))?;
        let ret_label = self.unique_label("RET");
        // push <ret_label>
        self.emit_ref(&ret_label)?;
        self.emit_set(Dest::d(), Operand::A)?;
        self.emit_push_d()?;
        // push LCL, ARG, THIS, THAT
        for reg in FRAME {
            self.emit_load_mem_d(reg)?;
            self.emit_push_d()?;
        }
        // ARG=SP-(n+5)
        self.emit_load_mem_d(R_SP)?;
        self.emit_const(offset)?;
        self.emit_sub(Dest::d(), Operand::D, Operand::A)?;
        self.emit_store_mem(R_ARG, Operand::D)?;
        // LCL=SP
        self.emit_load_mem_d(R_SP)?;
        self.emit_store_mem(R_LCL, Operand::D)?;
        // JMP name
        self.emit_jump(name, Operand::Zero, Jump::JMP)?;
        self.emit_label(&ret_label)
    }

    pub fn write_function(&mut self, name: &str, n: u16) -> Result {
        self.function = Some(name.to_string());
        self.emit_user_label(name)?;
        for _ in 0..n {
            self.emit_push(Operand::Zero)?;
        }
        Ok(())
    }

    pub fn write_return(&mut self) -> Result {
        // R13=LCL (frame)
        self.emit_load_mem_d(R_LCL)?;
        self.emit_store_mem(R_R13, Operand::D)?;
        // R14=RAM[R13-5] (return address)
        self.emit_const(FRAME.len() as u16 + 1)?;
        self.emit_sub(Dest::a(), Operand::D, Operand::A)?;
        self.emit_set(Dest::d(), Operand::M)?;
        self.emit_store_mem(R_R14, Operand::D)?;
        // RAM[ARG]=pop()
        self.emit_pop_d()?;
        self.emit_ref(R_ARG)?;
        self.emit_set(Dest::a(), Operand::M)?;
        self.emit_set(Dest::m(), Operand::D)?;
        // SP=ARG+1
        self.emit_ref(R_ARG)?;
        self.emit_add(Dest::d(), Operand::M, Operand::One)?;
        self.emit_store_mem(R_SP, Operand::D)?;
        // THAT=RAM[R13-1], THIS=RAM[R13-2], ARG=RAM[R13-3], LCL=RAM[R13-4]
        for (back, reg) in FRAME.iter().rev().enumerate() {
            self.emit_load_mem_d(R_R13)?;
            self.emit_const(back as u16 + 1)?;
            self.emit_sub(Dest::a(), Operand::D, Operand::A)?;
            self.emit_set(Dest::d(), Operand::M)?;
            self.emit_store_mem(reg, Operand::D)?;
        }
        // JMP R14
        self.emit_ref(R_R14)?;
        self.emit_set(Dest::a(), Operand::M)?;
        self.emit(assembler::Instruction::Compute(
            Dest::none(),
            Comp::Unary(None, Operand::Zero),
            Some(Jump::JMP),
        ))
    }

    /// Bootstrap: SP=256, then `call Sys.init 0`.
    pub fn write_init(&mut self) -> Result {
        self.emit_const(STACK_BASE)?;
        self.emit_set(Dest::d(), Operand::A)?;
        self.emit_store_mem(R_SP, Operand::D)?;
        self.write_call(ENTRY_POINT, 0)
    }

    pub fn translate(&mut self, vm_instr: &Instruction) -> Result {
        trace!(%vm_instr, "translate");
        if self.annotate {
            writeln!(self.out, "// {}", vm_instr)?;
        }
        match vm_instr {
            Instruction::Arithmetic(op) => self.write_arithmetic(*op),
            Instruction::Push(seg, i) => self.write_push(*seg, *i),
            Instruction::Pop(seg, i) => self.write_pop(*seg, *i),
            Instruction::Label(label) => self.write_label(label),
            Instruction::Goto(label) => self.write_goto(label),
            Instruction::IfGoto(label) => self.write_if(label),
            Instruction::Function(name, n) => self.write_function(name, *n),
            Instruction::Call(name, n) => self.write_call(name, *n),
            Instruction::Return => self.write_return(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assembler::cpu::Cpu;

    use super::*;
    use crate::driver::translate_unit;

    const SP: usize = 0;
    const LCL: usize = 1;
    const ARG: usize = 2;
    const THIS: usize = 3;
    const THAT: usize = 4;

    // Frame used by tests that run without the bootstrap.
    const SETUP: [(usize, i16); 5] = [(SP, 256), (LCL, 300), (ARG, 400), (THIS, 3000), (THAT, 3010)];

    fn translate_units(units: &[(&str, &str)], bootstrap: bool) -> String {
        let mut writer = CodeWriter::new(Vec::new());
        if bootstrap {
            writer.write_init().unwrap();
        }
        for (name, source) in units {
            writer.set_file_name(name);
            translate_unit(&mut writer, source).unwrap();
        }
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    fn execute(asm: &str, setup: &[(usize, i16)], steps: usize) -> Cpu {
        let mut cpu = Cpu::load(asm.as_bytes()).unwrap();
        for (addr, value) in setup {
            cpu.set_ram(*addr, *value);
        }
        cpu.run(steps);
        cpu
    }

    fn run_vm(source: &str) -> Cpu {
        execute(&translate_units(&[("Test", source)], false), &SETUP, 10_000)
    }

    fn translate_err(source: &str) -> TranslateError {
        let mut writer = CodeWriter::new(Vec::new());
        writer.set_file_name("Test");
        translate_unit(&mut writer, source).unwrap_err()
    }

    #[test]
    fn test_push_constant_text() {
        let asm = translate_units(&[("Test", "push constant 7")], false);
        assert_eq!(asm, "@7\nD=A\n@SP\nA=M\nM=D\n@SP\nM=M+1\n");
    }

    #[test]
    fn test_simple_add() {
        let cpu = run_vm("push constant 7\npush constant 8\nadd");
        assert_eq!(cpu.ram(SP), 257);
        assert_eq!(cpu.ram(256), 15);
    }

    #[test]
    fn test_arithmetic_stack_depth() {
        for op in ["add", "sub", "and", "or", "eq", "gt", "lt"] {
            let cpu = run_vm(&format!("push constant 9\npush constant 4\n{}", op));
            assert_eq!(cpu.ram(SP), 257, "{}", op);
        }
        for op in ["neg", "not"] {
            let cpu = run_vm(&format!("push constant 9\n{}", op));
            assert_eq!(cpu.ram(SP), 257, "{}", op);
        }
    }

    #[test]
    fn test_arithmetic_values() {
        let cases = [
            ("push constant 3\npush constant 5\nsub", -2),
            ("push constant 5\npush constant 3\nsub", 2),
            ("push constant 12\npush constant 10\nand", 8),
            ("push constant 12\npush constant 10\nor", 14),
            ("push constant 5\nneg", -5),
            ("push constant 0\nnot", -1),
            ("push constant 1\nneg\npush constant 1\nadd", 0),
        ];
        for (source, expect) in cases {
            let cpu = run_vm(source);
            assert_eq!(cpu.ram(256), expect, "{}", source);
        }
    }

    #[test]
    fn test_comparisons() {
        let cases = [
            ("push constant 3\npush constant 5\nlt", -1),
            ("push constant 5\npush constant 3\nlt", 0),
            ("push constant 5\npush constant 5\nlt", 0),
            ("push constant 5\npush constant 5\neq", -1),
            ("push constant 5\npush constant 6\neq", 0),
            ("push constant 0\npush constant 0\neq", -1),
            ("push constant 0\npush constant 0\ngt", 0),
            ("push constant 3\nneg\npush constant 5\nneg\ngt", -1),
            ("push constant 3\nneg\npush constant 2\nlt", -1),
            ("push constant 2\npush constant 3\nneg\ngt", -1),
            ("push constant 0\npush constant 1\nneg\nlt", 0),
        ];
        for (source, expect) in cases {
            let cpu = run_vm(source);
            assert_eq!(cpu.ram(SP), 257, "{}", source);
            assert_eq!(cpu.ram(256), expect, "{}", source);
        }
    }

    #[test]
    fn test_comparison_labels_are_unique() {
        let source = "push constant 1\npush constant 2\neq\npush constant 1\npush constant 2\neq\neq";
        let asm = translate_units(&[("Test", source)], false);
        let mut labels: Vec<_> = asm.lines().filter(|l| l.starts_with('(')).collect();
        assert_eq!(labels.len(), 6);
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 6);
        // (1 == 2) == (1 == 2)
        let cpu = execute(&asm, &SETUP, 10_000);
        assert_eq!(cpu.ram(256), -1);
    }

    #[test]
    fn test_push_pop_round_trip() {
        let cases = [
            ("local 2", 302),
            ("argument 1", 401),
            ("this 4", 3004),
            ("that 0", 3010),
            ("temp 0", 5),
            ("temp 7", 12),
            ("pointer 0", THIS),
            ("pointer 1", THAT),
            ("static 3", 16),
        ];
        for (slot, addr) in cases {
            let source = format!("push constant 1234\npop {slot}\npush {slot}", slot = slot);
            let cpu = run_vm(&source);
            assert_eq!(cpu.ram(SP), 257, "{}", slot);
            assert_eq!(cpu.ram(256), 1234, "{}", slot);
            // Test.3 is the first assembler variable, allocated at 16
            assert_eq!(cpu.ram(addr), 1234, "{}", slot);
        }
    }

    #[test]
    fn test_pop_keeps_other_slots() {
        let cpu = run_vm(
            "push constant 10\npush constant 20\npop local 1\npop local 0\npush local 0\npush local 1\nsub",
        );
        assert_eq!(cpu.ram(300), 10);
        assert_eq!(cpu.ram(301), 20);
        assert_eq!(cpu.ram(256), -10);
        assert_eq!(cpu.ram(SP), 257);
    }

    #[test]
    fn test_statics_are_per_file() {
        let asm = translate_units(
            &[
                ("Foo", "push constant 1\npop static 0"),
                ("Bar", "push constant 2\npop static 0\npush static 0"),
                ("Foo", "push static 0"),
            ],
            false,
        );
        assert!(asm.contains("@Foo.0\n"));
        assert!(asm.contains("@Bar.0\n"));
        let cpu = execute(&asm, &SETUP, 10_000);
        assert_eq!(cpu.ram(256), 2);
        assert_eq!(cpu.ram(257), 1);
    }

    #[test]
    fn test_segment_errors() {
        assert!(matches!(
            translate_err("push temp 8"),
            TranslateError::IndexOutOfRange { segment: Segment::Temp, index: 8 }
        ));
        assert!(matches!(
            translate_err("pop pointer 2"),
            TranslateError::IndexOutOfRange { segment: Segment::Pointer, index: 2 }
        ));
        assert!(matches!(
            translate_err("push constant 32768"),
            TranslateError::IndexOutOfRange { segment: Segment::Constant, .. }
        ));
        assert!(matches!(translate_err("pop constant 0"), TranslateError::PopConstant));
        assert!(matches!(translate_err("push heap 0"), TranslateError::UnknownSegment(_)));
        assert!(matches!(translate_err("call f 65535"), TranslateError::TooManyArguments(_)));
        assert!(matches!(
            translate_err("push local 40000"),
            TranslateError::IndexOutOfRange { segment: Segment::Local, index: 40000 }
        ));
        assert!(matches!(
            translate_err("pop that 32768"),
            TranslateError::IndexOutOfRange { segment: Segment::That, index: 32768 }
        ));
    }

    #[test]
    fn test_largest_segment_offset_assembles() {
        let asm = translate_units(&[("Test", "push argument 32767\npop this 32767")], false);
        assert!(asm.contains("@32767\n"));
        let mut words = 0;
        assembler::assemble(asm.as_bytes(), |_| words += 1).unwrap();
        assert!(words > 0);
    }

    #[test]
    fn test_duplicate_labels() {
        assert!(matches!(
            translate_err("function F.f 0\nlabel X\nlabel X"),
            TranslateError::DuplicateLabel(l) if l == "F.f$X"
        ));
        assert!(matches!(
            translate_err("function F.f 0\nreturn\nfunction F.f 0"),
            TranslateError::DuplicateLabel(l) if l == "F.f"
        ));
        // same label in two functions, and in the file scope
        translate_units(
            &[("Test", "label X\nfunction F.f 0\nlabel X\nfunction F.g 0\nlabel X")],
            false,
        );
    }

    #[test]
    fn test_loop_with_if_goto() {
        static SUM_CODE: &str = r###"// Sum code
push constant 0
pop local 0         // initializes sum = 0
label LOOP_START
push argument 0
push local 0
add
pop local 0	        // sum = sum + counter
push argument 0
push constant 1
sub
pop argument 0      // counter--
push argument 0
if-goto LOOP_START  // If counter != 0, goto LOOP_START
push local 0
"###;
        let asm = translate_units(&[("Sum", SUM_CODE)], false);
        assert!(asm.contains("(Sum$LOOP_START)\n"));
        let mut setup = SETUP.to_vec();
        setup.push((400, 5));
        let cpu = execute(&asm, &setup, 10_000);
        assert_eq!(cpu.ram(300), 15);
        assert_eq!(cpu.ram(256), 15);
        assert_eq!(cpu.ram(SP), 257);
    }

    #[test]
    fn test_bootstrap_text() {
        let asm = translate_units(&[], true);
        let lines: Vec<_> = asm.lines().collect();
        assert_eq!(&lines[..4], &["@256", "D=A", "@SP", "M=D"]);
        assert!(asm.contains("@Sys.init\n0;JMP\n"));
        assert_eq!(lines.last(), Some(&"($RET.0)"));
    }

    static SYS_HALT: &str = "label HALT\ngoto HALT\n";

    #[test]
    fn test_call_and_return_restore_frame() {
        let sys = format!(
            "function Sys.init 0
push constant 3000
pop pointer 0
push constant 4000
pop pointer 1
push constant 11
push constant 22
call Main.add 2
{}",
            SYS_HALT
        );
        let main = "function Main.add 1
push argument 0
push argument 1
add
pop local 0
push constant 5000
pop pointer 0
push constant 6000
pop pointer 1
push local 0
return
";
        let asm = translate_units(&[("Sys", sys.as_str()), ("Main", main)], true);
        let cpu = execute(&asm, &[], 10_000);
        // Sys.init frame: ARG=256, LCL=261; the two arguments became one result
        assert_eq!(cpu.ram(SP), 262);
        assert_eq!(cpu.ram(261), 33);
        assert_eq!(cpu.ram(LCL), 261);
        assert_eq!(cpu.ram(ARG), 256);
        assert_eq!(cpu.ram(THIS), 3000);
        assert_eq!(cpu.ram(THAT), 4000);
    }

    #[test]
    fn test_zero_arg_call_round_trip() {
        let sys = format!(
            "function Sys.init 0\npush constant 1\ncall Main.answer 0\n{}",
            SYS_HALT
        );
        let main = "function Main.answer 0\npush constant 42\nreturn\n";
        let asm = translate_units(&[("Sys", sys.as_str()), ("Main", main)], true);
        let cpu = execute(&asm, &[], 10_000);
        // SP was 262 before the call
        assert_eq!(cpu.ram(SP), 263);
        assert_eq!(cpu.ram(261), 1);
        assert_eq!(cpu.ram(262), 42);
        assert_eq!(cpu.ram(LCL), 261);
        assert_eq!(cpu.ram(ARG), 256);
    }

    #[test]
    fn test_function_locals_start_at_zero() {
        let sys = format!(
            "function Sys.init 3\npush local 0\npush local 1\npush local 2\nor\nor\npop temp 0\n{}",
            SYS_HALT
        );
        let mut setup = vec![];
        for addr in 261..264 {
            setup.push((addr, 7));
        }
        let cpu = execute(&translate_units(&[("Sys", sys.as_str())], true), &setup, 10_000);
        assert_eq!(cpu.ram(5), 0);
        assert_eq!(cpu.ram(SP), 264);
    }

    #[test]
    fn test_labels_are_scoped_by_function() {
        let sys = format!(
            "function Sys.init 0
call A.f 0
pop temp 0
call B.f 0
pop temp 1
{}",
            SYS_HALT
        );
        let a = "function A.f 0
goto END
push constant 1
return
label END
push constant 10
return
";
        let b = "function B.f 0
goto END
push constant 2
return
label END
push constant 20
return
";
        let asm = translate_units(&[("Sys", sys.as_str()), ("A", a), ("B", b)], true);
        assert!(asm.contains("(A.f$END)\n"));
        assert!(asm.contains("(B.f$END)\n"));
        let cpu = execute(&asm, &[], 10_000);
        assert_eq!(cpu.ram(5), 10);
        assert_eq!(cpu.ram(6), 20);
    }

    #[test]
    fn test_recursive_fibonacci() {
        let sys = format!(
            "function Sys.init 0\npush constant 7\ncall Main.fib 1\npop temp 0\n{}",
            SYS_HALT
        );
        let main = "function Main.fib 0
push argument 0
push constant 2
lt
if-goto BASE
push argument 0
push constant 1
sub
call Main.fib 1
push argument 0
push constant 2
sub
call Main.fib 1
add
return
label BASE
push argument 0
return
";
        let asm = translate_units(&[("Sys", sys.as_str()), ("Main", main)], true);
        let cpu = execute(&asm, &[], 200_000);
        assert_eq!(cpu.ram(5), 13);
        assert_eq!(cpu.ram(SP), 261);
    }

    #[test]
    fn test_annotations() {
        let mut writer = CodeWriter::new(Vec::new()).with_annotations(true);
        writer.set_file_name("Test");
        translate_unit(&mut writer, "push constant 7\nadd").unwrap();
        let asm = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(asm.starts_with("// push constant 7\n@7\n"));
        assert!(asm.contains("// add\n"));
        // the assembler skips them
        assert!(Cpu::load(asm.as_bytes()).is_ok());
    }
}
