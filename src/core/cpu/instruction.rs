// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Decoded instructions
//!
//! The pipeline models a MIPS32 integer subset plus MTC1/MFC1, which move
//! values to and from the floating-point register file without modeling
//! the FPU itself. Anything else decodes to [`Op::Reserved`] and raises a
//! reserved-instruction exception when it retires.

use super::decode::{decode_i_type, decode_j_type, decode_r_type, sign_extend_16};

/// Operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // Shifts
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    // Register ALU
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    // Immediate ALU
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    // Multiply/divide unit
    Mult,
    Multu,
    Div,
    Divu,
    Mfhi,
    Mflo,
    Mthi,
    Mtlo,
    // Control flow
    Beq,
    Bne,
    Blez,
    Bgtz,
    Bltz,
    Bgez,
    J,
    Jal,
    Jr,
    Jalr,
    // Memory
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    Sb,
    Sh,
    Sw,
    // Coprocessor 1 moves
    Mfc1,
    Mtc1,
    // System
    Syscall,
    Break,
    Reserved,
}

/// Functional unit an operation executes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Alu,
    Mdu,
    /// Address generation for loads and stores
    Agu,
    Branch,
    /// Pass-through (coprocessor moves, system instructions)
    None,
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub encoding: u32,
    pub op: Op,
    pub rs: u8,
    pub rt: u8,
    pub rd: u8,
    pub shamt: u8,
    pub imm: u16,
    pub target: u32,
}

impl Instruction {
    /// NOP (`sll r0, r0, 0`)
    pub const NOP: u32 = 0x0000_0000;

    /// Decode a 32-bit encoding
    pub fn decode(encoding: u32) -> Self {
        let (rs, rt, rd, shamt, funct) = decode_r_type(encoding);
        let (opcode, _, _, imm) = decode_i_type(encoding);
        let (_, target) = decode_j_type(encoding);

        let op = match opcode {
            0x00 => Self::decode_special(funct),
            0x01 => match rt {
                0x00 => Op::Bltz,
                0x01 => Op::Bgez,
                _ => Op::Reserved,
            },
            0x02 => Op::J,
            0x03 => Op::Jal,
            0x04 => Op::Beq,
            0x05 => Op::Bne,
            0x06 => Op::Blez,
            0x07 => Op::Bgtz,
            0x08 => Op::Addi,
            0x09 => Op::Addiu,
            0x0A => Op::Slti,
            0x0B => Op::Sltiu,
            0x0C => Op::Andi,
            0x0D => Op::Ori,
            0x0E => Op::Xori,
            0x0F => Op::Lui,
            // COP1 sub-opcode is in the rs field
            0x11 => match rs {
                0x00 => Op::Mfc1,
                0x04 => Op::Mtc1,
                _ => Op::Reserved,
            },
            0x20 => Op::Lb,
            0x21 => Op::Lh,
            0x23 => Op::Lw,
            0x24 => Op::Lbu,
            0x25 => Op::Lhu,
            0x28 => Op::Sb,
            0x29 => Op::Sh,
            0x2B => Op::Sw,
            _ => Op::Reserved,
        };

        Self {
            encoding,
            op,
            rs,
            rt,
            rd,
            shamt,
            imm,
            target,
        }
    }

    fn decode_special(funct: u8) -> Op {
        match funct {
            0x00 => Op::Sll,
            0x02 => Op::Srl,
            0x03 => Op::Sra,
            0x04 => Op::Sllv,
            0x06 => Op::Srlv,
            0x07 => Op::Srav,
            0x08 => Op::Jr,
            0x09 => Op::Jalr,
            0x0C => Op::Syscall,
            0x0D => Op::Break,
            0x10 => Op::Mfhi,
            0x11 => Op::Mthi,
            0x12 => Op::Mflo,
            0x13 => Op::Mtlo,
            0x18 => Op::Mult,
            0x19 => Op::Multu,
            0x1A => Op::Div,
            0x1B => Op::Divu,
            0x20 => Op::Add,
            0x21 => Op::Addu,
            0x22 => Op::Sub,
            0x23 => Op::Subu,
            0x24 => Op::And,
            0x25 => Op::Or,
            0x26 => Op::Xor,
            0x27 => Op::Nor,
            0x2A => Op::Slt,
            0x2B => Op::Sltu,
            _ => Op::Reserved,
        }
    }

    /// Sign-extended immediate
    #[inline(always)]
    pub fn simm(&self) -> u32 {
        sign_extend_16(self.imm)
    }

    /// Unit the operation executes on
    pub fn unit(&self) -> Unit {
        use Op::*;
        match self.op {
            Mult | Multu | Div | Divu | Mfhi | Mflo | Mthi | Mtlo => Unit::Mdu,
            Beq | Bne | Blez | Bgtz | Bltz | Bgez | J | Jal | Jr | Jalr => Unit::Branch,
            Lb | Lbu | Lh | Lhu | Lw | Sb | Sh | Sw => Unit::Agu,
            Mfc1 | Mtc1 | Syscall | Break | Reserved => Unit::None,
            _ => Unit::Alu,
        }
    }

    /// General-purpose register written at writeback
    pub fn dest(&self) -> Option<u8> {
        use Op::*;
        match self.op {
            Sll | Srl | Sra | Sllv | Srlv | Srav | Add | Addu | Sub | Subu | And | Or | Xor
            | Nor | Slt | Sltu | Mfhi | Mflo | Jalr => Some(self.rd),
            Addi | Addiu | Slti | Sltiu | Andi | Ori | Xori | Lui | Lb | Lbu | Lh | Lhu | Lw
            | Mfc1 => Some(self.rt),
            Jal => Some(31),
            _ => None,
        }
    }

    /// General-purpose registers read in decode (rs, rt)
    pub fn sources(&self) -> (Option<u8>, Option<u8>) {
        use Op::*;
        match self.op {
            Sll | Srl | Sra | Mtc1 => (None, Some(self.rt)),
            Sllv | Srlv | Srav | Add | Addu | Sub | Subu | And | Or | Xor | Nor | Slt | Sltu
            | Mult | Multu | Div | Divu | Beq | Bne | Sb | Sh | Sw => {
                (Some(self.rs), Some(self.rt))
            }
            Addi | Addiu | Slti | Sltiu | Andi | Ori | Xori | Blez | Bgtz | Bltz | Bgez | Jr
            | Jalr | Mthi | Mtlo | Lb | Lbu | Lh | Lhu | Lw => (Some(self.rs), None),
            _ => (None, None),
        }
    }

    /// Floating-point register read in decode
    pub fn fp_source(&self) -> Option<u8> {
        (self.op == Op::Mfc1).then_some(self.rd)
    }

    /// Floating-point register written at writeback
    pub fn fp_dest(&self) -> Option<u8> {
        (self.op == Op::Mtc1).then_some(self.rd)
    }

    pub fn is_load(&self) -> bool {
        matches!(self.op, Op::Lb | Op::Lbu | Op::Lh | Op::Lhu | Op::Lw)
    }

    pub fn is_store(&self) -> bool {
        matches!(self.op, Op::Sb | Op::Sh | Op::Sw)
    }

    /// Memory access size in bytes
    pub fn access_size(&self) -> Option<u32> {
        match self.op {
            Op::Lb | Op::Lbu | Op::Sb => Some(1),
            Op::Lh | Op::Lhu | Op::Sh => Some(2),
            Op::Lw | Op::Sw => Some(4),
            _ => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.unit() == Unit::Branch
    }
}
