// Mylox bytecode chunk
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-20: Initial implementation: append-only code buffer with a parallel
//            per-byte line table and an 8-bit-indexed constant pool.
// 2026-06-27: Added the disassembler (chunk dump + single-instruction decode)
//            for the Trace log level and the compiler tests.

use crate::common::object::LoxValue;
use crate::common::opcode::OpCode;

/// One chunk holds at most 256 distinct constants (8-bit operand).
pub const MAX_CONSTANTS: usize = 256;

pub struct Chunk {
    pub code: Vec<u8>,
    // one line entry per code byte
    // TODO: 行号表可以换 run-length 编码，先保持每字节一项
    pub lines: Vec<usize>,
    pub constants: Vec<LoxValue>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn write(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Appends a constant and returns its pool index, or `None` when the
    /// pool is already full (the compiler reports that as an error).
    pub fn add_constant(&mut self, value: LoxValue) -> Option<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return None;
        }
        self.constants.push(value);
        Some((self.constants.len() - 1) as u8)
    }

    pub fn read_byte(&self, offset: usize) -> u8 {
        self.code[offset]
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.lines[offset]
    }

    pub fn disassemble(&self, name: &str) {
        println!("== {} ==", name);
        let mut offset = 0;
        while offset < self.code.len() {
            offset = self.disassemble_instruction(offset);
        }
    }

    /// Decodes and prints one instruction, returning the offset of the next.
    pub fn disassemble_instruction(&self, offset: usize) -> usize {
        print!("{:04} ", offset);
        if offset > 0 && self.lines[offset] == self.lines[offset - 1] {
            print!("   | ");
        } else {
            print!("{:4} ", self.lines[offset]);
        }

        let byte = self.code[offset];
        let Some(op) = OpCode::from_byte(byte) else {
            println!("Unknown opcode {}", byte);
            return offset + 1;
        };

        use OpCode::*;
        match op {
            Constant | GetGlobal | DefineGlobal | SetGlobal | GetProperty | SetProperty
            | GetSuper | Class | Method => self.constant_instruction(op, offset),
            GetLocal | SetLocal | GetUpvalue | SetUpvalue | Call => {
                self.byte_instruction(op, offset)
            }
            Invoke | SuperInvoke => self.invoke_instruction(op, offset),
            Jump | JumpIfFalse => self.jump_instruction(op, 1, offset),
            Loop => self.jump_instruction(op, -1, offset),
            Closure => self.closure_instruction(offset),
            _ => {
                println!("{}", op.name());
                offset + 1
            }
        }
    }

    fn constant_instruction(&self, op: OpCode, offset: usize) -> usize {
        let idx = self.code[offset + 1];
        println!("{:<16} {:4} '{}'", op.name(), idx, self.constants[idx as usize]);
        offset + 2
    }

    fn byte_instruction(&self, op: OpCode, offset: usize) -> usize {
        let slot = self.code[offset + 1];
        println!("{:<16} {:4}", op.name(), slot);
        offset + 2
    }

    fn invoke_instruction(&self, op: OpCode, offset: usize) -> usize {
        let idx = self.code[offset + 1];
        let argc = self.code[offset + 2];
        println!(
            "{:<16} ({} args) {:4} '{}'",
            op.name(),
            argc,
            idx,
            self.constants[idx as usize]
        );
        offset + 3
    }

    fn jump_instruction(&self, op: OpCode, sign: i64, offset: usize) -> usize {
        let jump = ((self.code[offset + 1] as u16) << 8) | self.code[offset + 2] as u16;
        let target = offset as i64 + 3 + sign * jump as i64;
        println!("{:<16} {:4} -> {}", op.name(), offset, target);
        offset + 3
    }

    fn closure_instruction(&self, mut offset: usize) -> usize {
        offset += 1;
        let idx = self.code[offset];
        offset += 1;
        println!("{:<16} {:4} '{}'", "OP_CLOSURE", idx, self.constants[idx as usize]);

        let upvalue_count = match self.constants[idx as usize] {
            LoxValue::Function(func) => unsafe { (*func).data.upvalue_count },
            _ => 0,
        };
        for _ in 0..upvalue_count {
            let is_local = self.code[offset];
            let index = self.code[offset + 1];
            println!(
                "{:04}      |                     {} {}",
                offset,
                if is_local == 1 { "local" } else { "upvalue" },
                index
            );
            offset += 2;
        }
        offset
    }
}
