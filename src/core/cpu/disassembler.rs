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

//! Disassembler for trace output
//!
//! Used by the instruction-encoding fault point to show an instruction
//! before and after its bits were flipped.

use super::instruction::{Instruction, Op};

/// Instruction disassembler
///
/// # Example
/// ```
/// use mips4kc::core::cpu::Disassembler;
///
/// assert_eq!(Disassembler::disassemble(0x0000_0000, 0x0040_0000), "nop");
/// assert_eq!(Disassembler::disassemble(0x2402_000A, 0x0040_0000), "addiu r2, r0, 10");
/// ```
pub struct Disassembler;

impl Disassembler {
    /// Disassemble one encoding fetched from `pc`
    ///
    /// Branch and jump targets are shown as absolute addresses.
    pub fn disassemble(encoding: u32, pc: u32) -> String {
        Self::format(&Instruction::decode(encoding), pc)
    }

    /// Disassemble an already decoded instruction
    pub fn format(inst: &Instruction, pc: u32) -> String {
        let (rs, rt, rd) = (inst.rs, inst.rt, inst.rd);
        let simm = inst.imm as i16;
        let branch_target = pc.wrapping_add(4).wrapping_add(inst.simm() << 2);
        let jump_target = (pc.wrapping_add(4) & 0xF000_0000) | (inst.target << 2);

        let name = Self::mnemonic(inst.op);
        match inst.op {
            Op::Sll if inst.encoding == Instruction::NOP => "nop".to_string(),
            Op::Sll | Op::Srl | Op::Sra => format!("{} r{}, r{}, {}", name, rd, rt, inst.shamt),
            Op::Sllv | Op::Srlv | Op::Srav => format!("{} r{}, r{}, r{}", name, rd, rt, rs),
            Op::Add | Op::Addu | Op::Sub | Op::Subu | Op::And | Op::Or | Op::Xor | Op::Nor
            | Op::Slt | Op::Sltu => format!("{} r{}, r{}, r{}", name, rd, rs, rt),
            Op::Addi | Op::Addiu | Op::Slti | Op::Sltiu => {
                format!("{} r{}, r{}, {}", name, rt, rs, simm)
            }
            Op::Andi | Op::Ori | Op::Xori => {
                format!("{} r{}, r{}, 0x{:04X}", name, rt, rs, inst.imm)
            }
            Op::Lui => format!("lui r{}, 0x{:04X}", rt, inst.imm),
            Op::Mult | Op::Multu | Op::Div | Op::Divu => format!("{} r{}, r{}", name, rs, rt),
            Op::Mfhi | Op::Mflo => format!("{} r{}", name, rd),
            Op::Mthi | Op::Mtlo | Op::Jr => format!("{} r{}", name, rs),
            Op::Jalr => format!("jalr r{}, r{}", rd, rs),
            Op::Beq | Op::Bne => format!("{} r{}, r{}, 0x{:08X}", name, rs, rt, branch_target),
            Op::Blez | Op::Bgtz | Op::Bltz | Op::Bgez => {
                format!("{} r{}, 0x{:08X}", name, rs, branch_target)
            }
            Op::J | Op::Jal => format!("{} 0x{:08X}", name, jump_target),
            Op::Lb | Op::Lbu | Op::Lh | Op::Lhu | Op::Lw | Op::Sb | Op::Sh | Op::Sw => {
                format!("{} r{}, {}(r{})", name, rt, simm, rs)
            }
            Op::Mfc1 | Op::Mtc1 => format!("{} r{}, f{}", name, rt, rd),
            Op::Syscall | Op::Break => name.to_string(),
            Op::Reserved => format!("??? 0x{:08X}", inst.encoding),
        }
    }

    fn mnemonic(op: Op) -> &'static str {
        match op {
            Op::Sll => "sll",
            Op::Srl => "srl",
            Op::Sra => "sra",
            Op::Sllv => "sllv",
            Op::Srlv => "srlv",
            Op::Srav => "srav",
            Op::Add => "add",
            Op::Addu => "addu",
            Op::Sub => "sub",
            Op::Subu => "subu",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Nor => "nor",
            Op::Slt => "slt",
            Op::Sltu => "sltu",
            Op::Addi => "addi",
            Op::Addiu => "addiu",
            Op::Slti => "slti",
            Op::Sltiu => "sltiu",
            Op::Andi => "andi",
            Op::Ori => "ori",
            Op::Xori => "xori",
            Op::Lui => "lui",
            Op::Mult => "mult",
            Op::Multu => "multu",
            Op::Div => "div",
            Op::Divu => "divu",
            Op::Mfhi => "mfhi",
            Op::Mflo => "mflo",
            Op::Mthi => "mthi",
            Op::Mtlo => "mtlo",
            Op::Beq => "beq",
            Op::Bne => "bne",
            Op::Blez => "blez",
            Op::Bgtz => "bgtz",
            Op::Bltz => "bltz",
            Op::Bgez => "bgez",
            Op::J => "j",
            Op::Jal => "jal",
            Op::Jr => "jr",
            Op::Jalr => "jalr",
            Op::Lb => "lb",
            Op::Lbu => "lbu",
            Op::Lh => "lh",
            Op::Lhu => "lhu",
            Op::Lw => "lw",
            Op::Sb => "sb",
            Op::Sh => "sh",
            Op::Sw => "sw",
            Op::Mfc1 => "mfc1",
            Op::Mtc1 => "mtc1",
            Op::Syscall => "syscall",
            Op::Break => "break",
            Op::Reserved => "???",
        }
    }
}
