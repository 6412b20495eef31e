//! Recursive traversal disassembly strategy.
//!
//! Follows control flow from the entry address with an explicit worklist
//! instead of native recursion: jump/call cycles are routine in CHIP-8
//! programs, and the visited set plus a finite address space guarantee the
//! queue empties in a bounded number of steps. Unreached bytes are
//! classified as data in a post-pass, and `jp V0, addr` targets are
//! expanded through the value sets carried by [`crate::tracker`].

use std::collections::{HashMap, HashSet, VecDeque};

use crate::tracker::{self, RegisterValueSet};
use crate::{decoder, Address, DecodedProgram, Diagnostic, Insn, Kind, RawImage};

/// Traverse `image` starting from its base address.
pub fn run(image: &RawImage) -> DecodedProgram {
    run_from(image, image.base_address())
}

/// Traverse `image` from a specific entry point.
pub fn run_from(image: &RawImage, entry: Address) -> DecodedProgram {
    log::debug!(
        "starting recursive traversal of {} bytes at 0x{:04x}",
        image.len(),
        entry
    );

    let mut explorer = Explorer::new(image);
    // Nothing is assumed about V0 at entry; programs load it before the
    // first indirect jump or the branch stays unresolved.
    explorer.push(entry, RegisterValueSet::assign_unknown());
    explorer.exhaust();

    let mut program = explorer.program;
    classify_data(image, &mut program);

    log::debug!(
        "recursive traversal complete: {} instructions, {} data bytes, {} diagnostics",
        program.instruction_count(),
        program.data.len(),
        program.diagnostics.len()
    );

    program
}

struct Explorer<'a> {
    image: &'a RawImage,
    program: DecodedProgram,
    visited: HashSet<Address>,
    queue: VecDeque<Address>,
    /// Register sets for queued-but-unvisited addresses. Entries targeting
    /// the same address merge here, so each address is decoded once with
    /// the join of every path that reached it while it was pending.
    pending: HashMap<Address, RegisterValueSet>,
}

impl<'a> Explorer<'a> {
    fn new(image: &'a RawImage) -> Self {
        Explorer {
            image,
            program: DecodedProgram::new(image),
            visited: HashSet::new(),
            queue: VecDeque::new(),
            pending: HashMap::new(),
        }
    }

    /// Queue a traversal task, merging with any task already pending for
    /// the same address. Insertion order is kept for determinism.
    fn push(&mut self, addr: Address, regs: RegisterValueSet) {
        if self.visited.contains(&addr) {
            return;
        }
        match self.pending.get_mut(&addr) {
            Some(existing) => *existing = tracker::join(existing, &regs),
            None => {
                self.pending.insert(addr, regs);
                self.queue.push_back(addr);
            }
        }
    }

    /// Queue a branch/call target after validating it is dereferenceable.
    /// Returns false when the target had to be reported instead.
    fn push_target(&mut self, site: Address, target: Address, regs: RegisterValueSet) -> bool {
        if !self.image.contains_word(target) {
            self.program
                .warn(Diagnostic::OutOfRangeTarget { addr: site, target });
            return false;
        }
        self.program.labels.insert(target);
        self.push(target, regs);
        true
    }

    fn exhaust(&mut self) {
        while let Some(addr) = self.queue.pop_front() {
            let Some(regs) = self.pending.remove(&addr) else {
                continue;
            };
            if !self.visited.insert(addr) {
                continue;
            }

            // Fallthrough past the image end simply terminates the path;
            // explicit targets were validated at push time.
            let Some(word) = self.image.word_at(addr) else {
                continue;
            };

            let insn = decoder::decode(addr, word);
            self.expand(&insn, regs);
            self.program.instructions.insert(addr, insn);
        }
    }

    /// Push the successor tasks implied by one decoded instruction.
    fn expand(&mut self, insn: &Insn, regs: RegisterValueSet) {
        let addr = insn.addr;
        match insn.kind {
            Kind::Sequential => {
                let out = tracker::apply(insn, &regs);
                self.push(insn.next_addr(), out);
            }
            Kind::SkipConditional => {
                // Both outcomes of the runtime comparison are live.
                self.push(insn.next_addr(), regs.clone());
                self.push(addr.wrapping_add(4), regs);
            }
            Kind::JumpAbsolute { target } | Kind::SysCall { target } => {
                self.push_target(addr, target, regs);
            }
            Kind::Call { target } => {
                // The dynamic return address is unknowable statically, so
                // the fallthrough continues as its own path. V0 is carried
                // unchanged across the call.
                self.push_target(addr, target, regs.clone());
                self.push(insn.next_addr(), regs);
            }
            Kind::JumpIndirect { base } => match regs.values() {
                Some(values) => {
                    let mut all_in_range = true;
                    for &v in values {
                        let target = base.wrapping_add(v as Address);
                        // On the edge for value v, V0 is exactly v.
                        let edge = RegisterValueSet::assign_literal(v);
                        all_in_range &= self.push_target(addr, target, edge);
                    }
                    if !all_in_range {
                        self.program.unresolved.insert(addr);
                    }
                }
                None => {
                    self.program.unresolved.insert(addr);
                    self.program
                        .warn(Diagnostic::UnresolvedIndirectBranch { addr });
                }
            },
            Kind::Unknown => {
                self.program.warn(Diagnostic::UnrecognizedOpcode {
                    addr,
                    word: insn.word,
                });
            }
            Kind::Return | Kind::ClearScreen => {}
        }
    }
}

/// Mark every image byte not covered by a decoded instruction as data.
fn classify_data(image: &RawImage, program: &mut DecodedProgram) {
    let mut covered = HashSet::new();
    for &addr in program.instructions.keys() {
        covered.insert(addr);
        covered.insert(addr.wrapping_add(1));
    }

    for off in 0..image.len() {
        let addr = image.base_address() + off as Address;
        if !covered.contains(&addr) {
            if let Some(byte) = image.byte_at(addr) {
                program.data.insert(addr, byte);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PROGRAM_BASE;

    fn image(bytes: &[u8]) -> RawImage {
        RawImage::load(bytes.to_vec(), PROGRAM_BASE)
    }

    #[test]
    fn test_straight_line_until_terminal() {
        // ld V1, 0x05; ld I, 0x300; ret; <unreachable ld>
        let img = image(&[0x61, 0x05, 0xA3, 0x00, 0x00, 0xEE, 0x62, 0x01]);
        let program = run(&img);

        assert_eq!(
            program.instructions.keys().copied().collect::<Vec<_>>(),
            vec![0x200, 0x202, 0x204]
        );
        assert_eq!(
            program.data.keys().copied().collect::<Vec<_>>(),
            vec![0x206, 0x207]
        );
    }

    #[test]
    fn test_skip_pushes_both_successors() {
        // se V1, 0x02; ret; ret
        let img = image(&[0x31, 0x02, 0x00, 0xEE, 0x00, 0xEE]);
        let program = run(&img);

        assert!(program.instructions.contains_key(&0x202));
        assert!(program.instructions.contains_key(&0x204));
    }

    #[test]
    fn test_jump_cycle_terminates() {
        // jp 0x202; jp 0x200
        let img = image(&[0x12, 0x02, 0x12, 0x00]);
        let program = run(&img);

        assert_eq!(program.instruction_count(), 2);
        assert!(program.labels.contains(&0x200));
        assert!(program.labels.contains(&0x202));
    }

    #[test]
    fn test_sys_jump_is_followed_like_an_absolute_jump() {
        // sys 0x204; pad; ret
        let img = image(&[0x02, 0x04, 0x00, 0x00, 0x00, 0xEE]);
        let program = run(&img);

        assert!(program.instructions.contains_key(&0x204));
        assert!(program.is_data(0x202));
    }

    #[test]
    fn test_clear_screen_ends_the_path() {
        // cls; ret unreached
        let img = image(&[0x00, 0xE0, 0x00, 0xEE]);
        let program = run(&img);

        assert_eq!(program.instruction_count(), 1);
        assert!(program.is_data(0x202));
    }

    #[test]
    fn test_out_of_range_target_is_reported_not_followed() {
        // jp 0xFFE lands past the image
        let img = image(&[0x1F, 0xFE]);
        let program = run(&img);

        assert_eq!(program.instruction_count(), 1);
        assert!(program.diagnostics.contains(&Diagnostic::OutOfRangeTarget {
            addr: 0x200,
            target: 0xFFE
        }));
    }

    #[test]
    fn test_unknown_opcode_ends_path() {
        // .word 0xF1FF; ret never reached through it
        let img = image(&[0xF1, 0xFF, 0x00, 0xEE]);
        let program = run(&img);

        assert_eq!(program.instruction_count(), 1);
        assert!(program
            .diagnostics
            .contains(&Diagnostic::UnrecognizedOpcode {
                addr: 0x200,
                word: 0xF1FF
            }));
        assert!(program.is_data(0x202));
    }

    #[test]
    fn test_pending_entries_merge_before_decode() {
        // Two paths bind V0 to different literals and converge on one
        // indirect jump while its address is still pending; the merged set
        // must expand both targets.
        let img = image(&[
            0x31, 0x00, // 0x200: se V1, 0x00    -> 0x202 and 0x204
            0x12, 0x06, // 0x202: jp 0x206
            0x12, 0x0A, // 0x204: jp 0x20A
            0x60, 0x02, // 0x206: ld V0, 0x02
            0x12, 0x0E, // 0x208: jp 0x20E       (queues 0x20E with {2})
            0x60, 0x04, // 0x20A: ld V0, 0x04
            0x12, 0x0E, // 0x20C: jp 0x20E       (merges {4} into pending)
            0xB2, 0x10, // 0x20E: jp V0, 0x210
            0x00, 0x00, // 0x210: pad
            0x00, 0xEE, // 0x212: ret  (0x210 + 2)
            0x00, 0xEE, // 0x214: ret  (0x210 + 4)
        ]);
        let program = run(&img);

        assert!(program.instructions.contains_key(&0x212));
        assert!(program.instructions.contains_key(&0x214));
        assert!(program.unresolved.is_empty());
        assert!(program.is_data(0x210));
    }
}
