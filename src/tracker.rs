//! Abstract value tracking for V0, the register indirect jumps depend on.
//!
//! `jp V0, addr` is the one branch whose target is not encoded in the
//! instruction, so the traversal carries the set of values V0 may hold
//! along each path. The abstraction is deliberately minimal: a bounded
//! exact set with a single top element, joined by set union and widened to
//! [`RegisterValueSet::Unknown`] once the set covers the whole byte domain.
//! It is not a symbolic evaluator; anything written into V0 from a source
//! this module cannot bound clobbers the set.

use std::collections::BTreeSet;

use crate::{Insn, Kind};

/// Widening bound: a set holding every possible byte value carries no
/// information and collapses to `Unknown`.
pub const VALUE_SET_CAP: usize = 256;

/// The possible values of V0 at a program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValueSet {
    /// V0 is one of these values (ordered for deterministic expansion).
    Exact(BTreeSet<u8>),
    /// Top element: nothing is known about V0.
    Unknown,
}

impl RegisterValueSet {
    /// V0 was loaded with a literal.
    pub fn assign_literal(v: u8) -> Self {
        RegisterValueSet::Exact(BTreeSet::from([v]))
    }

    /// V0 was written from a source the tracker cannot bound.
    pub fn assign_unknown() -> Self {
        RegisterValueSet::Unknown
    }

    /// Returns the exact values, if any are known.
    pub fn values(&self) -> Option<&BTreeSet<u8>> {
        match self {
            RegisterValueSet::Exact(vs) => Some(vs),
            RegisterValueSet::Unknown => None,
        }
    }
}

/// Merge the value sets of two paths reaching the same address.
///
/// Commutative and idempotent; widens to `Unknown` past [`VALUE_SET_CAP`].
pub fn join(a: &RegisterValueSet, b: &RegisterValueSet) -> RegisterValueSet {
    match (a, b) {
        (RegisterValueSet::Exact(va), RegisterValueSet::Exact(vb)) => {
            let merged: BTreeSet<u8> = va.union(vb).copied().collect();
            widen(merged)
        }
        _ => RegisterValueSet::Unknown,
    }
}

/// Compute the value set after executing `insn` with V0 in `set`.
///
/// Only writes to V0 matter. Literal loads replace the set, a literal add
/// maps over a known set (bounded propagation), and every other write
/// clobbers to `Unknown` because V0 is the only register tracked.
pub fn apply(insn: &Insn, set: &RegisterValueSet) -> RegisterValueSet {
    let f = &insn.fields;
    match f.u {
        // ld V0, kk
        0x6 if f.x == 0 => RegisterValueSet::assign_literal(f.kk),
        // add V0, kk over a known set stays known and the same size
        0x7 if f.x == 0 => match set {
            RegisterValueSet::Exact(vs) => {
                widen(vs.iter().map(|v| v.wrapping_add(f.kk)).collect())
            }
            RegisterValueSet::Unknown => RegisterValueSet::Unknown,
        },
        // Arithmetic/bitwise/copy results from untracked registers
        0x8 if f.x == 0 && !matches!(insn.kind, Kind::Unknown) => {
            RegisterValueSet::assign_unknown()
        }
        // rnd V0, kk
        0xC if f.x == 0 => RegisterValueSet::assign_unknown(),
        0xF => match f.kk {
            // ld V0, DT / ld V0, K
            0x07 | 0x0A if f.x == 0 => RegisterValueSet::assign_unknown(),
            // ld Vx, [I] fills V0 through Vx, so V0 is always written
            0x65 => RegisterValueSet::assign_unknown(),
            _ => set.clone(),
        },
        _ => set.clone(),
    }
}

fn widen(values: BTreeSet<u8>) -> RegisterValueSet {
    if values.len() >= VALUE_SET_CAP {
        RegisterValueSet::Unknown
    } else {
        RegisterValueSet::Exact(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    fn exact(vs: &[u8]) -> RegisterValueSet {
        RegisterValueSet::Exact(vs.iter().copied().collect())
    }

    #[test]
    fn test_join_unions_exact_sets() {
        let a = exact(&[1, 2]);
        let b = exact(&[2, 3]);

        assert_eq!(join(&a, &b), exact(&[1, 2, 3]));
        // Commutative and idempotent
        assert_eq!(join(&b, &a), join(&a, &b));
        assert_eq!(join(&a, &a), a);
    }

    #[test]
    fn test_join_with_unknown_is_unknown() {
        let a = exact(&[5]);
        assert_eq!(join(&a, &RegisterValueSet::Unknown), RegisterValueSet::Unknown);
        assert_eq!(join(&RegisterValueSet::Unknown, &a), RegisterValueSet::Unknown);
    }

    #[test]
    fn test_join_widens_at_full_byte_domain() {
        let lo = RegisterValueSet::Exact((0..=127).collect());
        let hi = RegisterValueSet::Exact((128..=255).collect());

        assert_eq!(join(&lo, &hi), RegisterValueSet::Unknown);
    }

    #[test]
    fn test_literal_load_replaces_set() {
        let insn = decode(0x200, 0x6005); // ld V0, 0x05
        assert_eq!(apply(&insn, &RegisterValueSet::Unknown), exact(&[5]));
        assert_eq!(apply(&insn, &exact(&[9])), exact(&[5]));
    }

    #[test]
    fn test_literal_add_maps_over_known_set() {
        let insn = decode(0x200, 0x7003); // add V0, 0x03
        assert_eq!(apply(&insn, &exact(&[1, 0xFF])), exact(&[4, 2]));
        assert_eq!(
            apply(&insn, &RegisterValueSet::Unknown),
            RegisterValueSet::Unknown
        );
    }

    #[test]
    fn test_copy_from_untracked_register_clobbers() {
        let insn = decode(0x200, 0x8010); // ld V0, V1
        assert_eq!(apply(&insn, &exact(&[5])), RegisterValueSet::Unknown);
    }

    #[test]
    fn test_random_and_memory_loads_clobber() {
        let rnd = decode(0x200, 0xC0FF); // rnd V0, 0xFF
        assert_eq!(apply(&rnd, &exact(&[5])), RegisterValueSet::Unknown);

        // ld V3, [I] loads V0..V3, clobbering V0 even though x != 0
        let fill = decode(0x200, 0xF365);
        assert_eq!(apply(&fill, &exact(&[5])), RegisterValueSet::Unknown);
    }

    #[test]
    fn test_writes_to_other_registers_carry_through() {
        let set = exact(&[7]);
        for word in [0x6105u16, 0x7102, 0x8120, 0xC1FF, 0xF107, 0xF155] {
            let insn = decode(0x200, word);
            assert_eq!(apply(&insn, &set), set, "word 0x{:04X}", word);
        }
    }
}
