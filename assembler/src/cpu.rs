//! Reference Hack CPU for running assembled programs.

use crate::{assemble, AsmError};

pub const MEMORY_SIZE: usize = 1 << 15;

pub struct Cpu {
    rom: Vec<u16>,
    ram: Vec<i16>,
    a: i16,
    d: i16,
    pc: usize,
}

impl Cpu {
    pub fn new(rom: Vec<u16>) -> Self {
        Self {
            rom,
            ram: vec![0; MEMORY_SIZE],
            a: 0,
            d: 0,
            pc: 0,
        }
    }

    /// Assembles `source` and loads it into ROM.
    pub fn load(source: &[u8]) -> Result<Self, AsmError> {
        let mut rom = Vec::new();
        assemble(source, |w| rom.push(w))?;
        Ok(Self::new(rom))
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn ram(&self, addr: usize) -> i16 {
        self.ram[addr % MEMORY_SIZE]
    }

    pub fn set_ram(&mut self, addr: usize, value: i16) {
        self.ram[addr % MEMORY_SIZE] = value;
    }

    fn address(&self) -> usize {
        self.a as u16 as usize % MEMORY_SIZE
    }

    /// Executes one instruction. Returns false once the PC has run off the end of ROM.
    pub fn step(&mut self) -> bool {
        let Some(&word) = self.rom.get(self.pc) else {
            return false;
        };
        if word & 0x8000 == 0 {
            self.a = word as i16;
            self.pc += 1;
            return true;
        }

        let comp = word >> 6 & 0x7f;
        let y = if comp & 0x40 != 0 {
            self.ram[self.address()]
        } else {
            self.a
        };
        let out = alu(self.d, y, comp);

        let addr = self.address();
        let target = self.a as u16 as usize;
        if word & 0b001000 != 0 {
            self.ram[addr] = out;
        }
        if word & 0b100000 != 0 {
            self.a = out;
        }
        if word & 0b010000 != 0 {
            self.d = out;
        }

        let jump = word & 0b111;
        let taken = (jump & 0b100 != 0 && out < 0)
            || (jump & 0b010 != 0 && out == 0)
            || (jump & 0b001 != 0 && out > 0);
        self.pc = if taken { target } else { self.pc + 1 };
        true
    }

    /// Runs until the PC leaves ROM or `max_steps` instructions have executed.
    pub fn run(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && self.step() {
            steps += 1;
        }
        steps
    }
}

// comp bits: a zx nx zy ny f no
fn alu(x: i16, y: i16, comp: u16) -> i16 {
    let bit = |n: u16| comp >> n & 1 != 0;
    let mut x = if bit(5) { 0 } else { x };
    if bit(4) {
        x = !x;
    }
    let mut y = if bit(3) { 0 } else { y };
    if bit(2) {
        y = !y;
    }
    let out = if bit(1) { x.wrapping_add(y) } else { x & y };
    if bit(0) {
        !out
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_to_ten() {
        let mut cpu = Cpu::load(
            br"
    @i
    M=1
    @sum
    M=0
(LOOP)
    @i
    D=M
    @10
    D=D-A
    @STOP
    D;JGT
    @i
    D=M
    @sum
    M=D+M
    @i
    M=M+1
    @LOOP
    0;JMP
(STOP)
",
        )
        .unwrap();
        cpu.run(1000);
        assert_eq!(cpu.ram(17), 55);
        assert_eq!(cpu.pc(), 18);
    }

    #[test]
    fn test_alu_ops() {
        let cases: [(&[u8], i16); 8] = [
            (b"@7\nD=A\n@3\nD=D-A", 4),
            (b"@3\nD=A\n@7\nD=D-A", -4),
            (b"@7\nD=A\n@3\nD=A-D", -4),
            (b"@12\nD=A\n@10\nD=D&A", 8),
            (b"@12\nD=A\n@10\nD=D|A", 14),
            (b"@5\nD=A\nD=-D", -5),
            (b"D=-1\nD=!D", 0),
            (b"@32767\nD=A\nD=D+1", i16::MIN),
        ];
        for (source, expect) in cases {
            let mut cpu = Cpu::load(source).unwrap();
            cpu.run(100);
            assert_eq!(cpu.d, expect, "{}", String::from_utf8_lossy(source));
        }
    }

    #[test]
    fn test_am_writes_memory_at_old_address() {
        let mut cpu = Cpu::load(b"@SP\nAM=M-1\nM=1").unwrap();
        cpu.set_ram(0, 300);
        cpu.run(10);
        assert_eq!(cpu.ram(0), 299);
        assert_eq!(cpu.ram(299), 1);
    }
}
