//! Linear-sweep disassembly strategy.
//!
//! Decodes every two-byte-aligned offset in order, ignoring control flow.
//! This is the contrast baseline: it happily decodes embedded data as
//! (likely nonsensical) instructions, performs no register tracking, and
//! attaches no unresolved-branch annotations. Its output must never be
//! treated as authoritative.

use crate::{decoder, DecodedProgram, RawImage};

/// Sweep the whole image sequentially.
pub fn run(image: &RawImage) -> DecodedProgram {
    log::debug!("starting linear sweep of {} bytes", image.len());

    let mut program = DecodedProgram::new(image);
    let mut at = image.base_address();

    while let Some(word) = image.word_at(at) {
        let insn = decoder::decode(at, word);
        // Static jump/call targets still get labels; purely cosmetic here.
        if let Some(target) = insn.static_target() {
            program.labels.insert(target);
        }
        program.instructions.insert(at, insn);
        at += 2;
    }

    // A trailing odd byte cannot form a word; leave it to the emitter as data.
    if image.len() % 2 != 0 {
        let last = image.end_address() - 1;
        if let Some(byte) = image.byte_at(last) {
            program.data.insert(last, byte);
        }
    }

    log::debug!(
        "linear sweep complete: {} instructions",
        program.instruction_count()
    );

    program
}
