//! The literal end-to-end scenarios driving the public `assemble`/`exec`
//! entry points, rather than any internal helper.

use armul::assemble::assemble;
use armul::exec::Machine;
use armul::instr::{Cond, DataOp, DpOperand, Instr, Register, RotatedImmediate};
use armul::memory::{Memory, NullSink};

fn word_at(image: &[u8], address: usize) -> u32 {
    u32::from_le_bytes(image[address..address + 4].try_into().unwrap())
}

#[test]
fn mov_r1_56_encodes_to_the_literal_word() {
    let program = assemble("MOV R1,#56\nANDEQ R0,R0,R0\n").unwrap();
    assert_eq!(word_at(&program.image, 0), 0xE3A0_1038);
}

#[test]
fn large_literal_load_goes_through_the_constant_pool() {
    // A single instruction: the pool sits right after it, at byte 4. At
    // execution PC reads as address+8 == 8, so reaching the pool at 4 means
    // a *down* offset of 4, not an up one.
    let program = assemble("LDR R0,=0x555\n").unwrap();
    let ldr_word = word_at(&program.image, 0);
    let (cond, instr) = Instr::decode(ldr_word).unwrap();
    assert_eq!(cond, Cond::Al);
    match instr {
        Instr::Sdt { load: true, pre_index: true, up: false, rn, offset: armul::instr::SdtOffset::Immediate(imm), .. } => {
            assert_eq!(rn, Register::PC);
            assert_eq!(imm, 4);
        }
        other => panic!("expected a PC-relative load, got {other:?}"),
    }
    assert_eq!(word_at(&program.image, 4), 0x555);
}

#[test]
fn forward_branch_offset_is_zero_at_address_zero() {
    let program = assemble("B foo\nMOV R0,#1\nfoo:\nANDEQ R0,R0,R0\n").unwrap();
    assert_eq!(word_at(&program.image, 0), 0xEA00_0000);
}

#[test]
fn andeq_self_encodes_as_the_all_zero_halt() {
    let instr = Instr::Hal;
    assert_eq!(instr.encode(Cond::Eq).unwrap(), 0);
}

#[test]
fn running_a_two_word_image_leaves_only_r1_and_pc_nonzero() {
    let words = [0xE3A0_100Au32, 0];
    let mut image = Vec::new();
    for w in words {
        image.extend_from_slice(&w.to_le_bytes());
    }
    let mut machine = Machine::new(Memory::from_image(&image));
    machine.run(&mut NullSink).unwrap();

    assert_eq!(machine.registers.get(Register::new(1)).unwrap(), 10);
    for i in 0..13 {
        if i != 1 {
            assert_eq!(machine.registers.get(Register::new(i)).unwrap(), 0, "R{i} should stay zero");
        }
    }
    assert_eq!(machine.registers.pc(), 0x10);
    assert_eq!(machine.registers.cpsr(), 0);
}

#[test]
fn tst_zero_sets_z_clears_n_and_leaves_memory_untouched() {
    let instr = Instr::Dp {
        opcode: DataOp::Tst,
        set_flags: true,
        rn: Register::new(0),
        rd: Register::new(0),
        operand2: DpOperand::Immediate(RotatedImmediate { value: 8, rotate: 0 }),
    };
    let word = instr.encode(Cond::Al).unwrap();
    let mut image = Vec::new();
    image.extend_from_slice(&word.to_le_bytes());
    image.extend_from_slice(&0u32.to_le_bytes());

    let mut machine = Machine::new(Memory::from_image(&image));
    machine.run(&mut NullSink).unwrap();

    assert!(machine.registers.zero());
    assert!(!machine.registers.negative());
    assert_eq!(machine.memory.read_word(0, &mut NullSink).unwrap(), word);
}
