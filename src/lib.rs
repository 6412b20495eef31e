//! Core IR, image model, and diagnostics for the Octograph disassembler.
//!
//! This library reconstructs a readable instruction listing from a raw
//! CHIP-8 ROM image by following control flow instead of scanning the buffer
//! byte-by-byte. The authoritative mode is a worklist-driven recursive
//! traversal that separates code from data and resolves `jp V0, addr`
//! indirect jumps by tracking the possible values of V0; a naive linear
//! sweep is kept as a contrast baseline.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::fs;
//! use octograph::{
//!     RawImage, PROGRAM_BASE,
//!     strategy::Strategy,
//!     format::{ListingFormatter, OutputFormat},
//! };
//!
//! // Read a ROM file
//! let rom = fs::read("path/to/rom.ch8").unwrap();
//!
//! // Load it at the conventional program base
//! let image = RawImage::load(rom, PROGRAM_BASE);
//!
//! // Recursive traversal is the authoritative mode
//! let program = Strategy::Recursive.run(&image);
//!
//! // Render a text listing
//! let formatter = OutputFormat::Text.get_formatter();
//! let listing = formatter.format(&program).unwrap();
//! println!("{}", listing);
//! ```

pub mod decoder;
pub mod tracker;
pub mod strategy;
pub mod format;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Represents an address in the CHIP-8 address space.
pub type Address = u16;

/// Conventional load address for user programs.
pub const PROGRAM_BASE: Address = 0x200;

/// Total addressable memory (4 KiB).
pub const ADDRESS_SPACE: usize = 0x1000;

/// Every instruction is a fixed-width two-byte word.
pub const INSTRUCTION_SIZE: Address = 2;

/// Bitfield extractions from one 16-bit instruction word.
///
/// Naming follows the standard CHIP-8 conventions: `nnn` is the low 12 bits
/// (an address), `kk` the low byte, `n` the low nibble, `x`/`y` the register
/// selectors, and `u` the high nibble (the primary opcode class).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    pub nnn: u16,
    pub n: u8,
    pub x: u8,
    pub y: u8,
    pub kk: u8,
    pub u: u8,
}

impl Fields {
    /// Extract all bitfields from a raw instruction word.
    pub fn extract(word: u16) -> Self {
        Fields {
            nnn: word & 0x0FFF,
            n: (word & 0x000F) as u8,
            x: ((word >> 8) & 0x000F) as u8,
            y: ((word >> 4) & 0x000F) as u8,
            kk: (word & 0x00FF) as u8,
            u: ((word >> 12) & 0x000F) as u8,
        }
    }
}

/// Control-transfer classification of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Falls through to `addr + 2`.
    Sequential,
    /// Falls through to `addr + 2` or `addr + 4`; both successors are live.
    SkipConditional,
    /// Unconditional jump to a literal address (`1nnn`).
    JumpAbsolute { target: Address },
    /// Jump to `base + V0` (`Bnnn`); only resolvable by tracking V0.
    JumpIndirect { base: Address },
    /// Subroutine call (`2nnn`); the callee and the fallthrough are both live.
    Call { target: Address },
    /// Return from subroutine (`00EE`); ends the path.
    Return,
    /// Jump to a machine code routine (`0nnn`); treated as an absolute jump.
    SysCall { target: Address },
    /// Clear screen (`00E0`); overlaps the `0nnn` encoding and is terminal.
    ClearScreen,
    /// Unrecognized bit pattern; ends the path.
    Unknown,
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    /// Address the instruction was decoded at
    pub addr: Address,
    /// Raw big-endian instruction word
    pub word: u16,
    /// Extracted bitfields
    pub fields: Fields,
    /// Control-transfer classification
    pub kind: Kind,
    /// Instruction mnemonic (e.g., "ld", "jp")
    pub mnemonic: &'static str,
    /// Operands as string representation
    pub operands: String,
}

impl Insn {
    /// Returns true if no successor exists past this instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, Kind::Return | Kind::ClearScreen | Kind::Unknown)
    }

    /// Returns the statically known branch or call target, if any.
    pub fn static_target(&self) -> Option<Address> {
        match self.kind {
            Kind::JumpAbsolute { target }
            | Kind::Call { target }
            | Kind::SysCall { target } => Some(target),
            _ => None,
        }
    }

    /// Address of the linear successor.
    pub fn next_addr(&self) -> Address {
        self.addr.wrapping_add(INSTRUCTION_SIZE)
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, self.operands)
        }
    }
}

/// An immutable ROM image placed at a base address.
///
/// Loading never fails: an oversized image is truncated to the addressable
/// program space and the truncation recorded as a [`Diagnostic`], which the
/// strategies fold into the resulting [`DecodedProgram`].
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    base_address: Address,
    load_diagnostics: Vec<Diagnostic>,
}

impl RawImage {
    /// Load an image at `base_address`, truncating to the address space.
    pub fn load(mut bytes: Vec<u8>, base_address: Address) -> Self {
        let mut load_diagnostics = Vec::new();

        let capacity = ADDRESS_SPACE.saturating_sub(base_address as usize);
        if bytes.len() > capacity {
            load_diagnostics.push(Diagnostic::OversizedImage {
                got: bytes.len(),
                kept: capacity,
            });
            bytes.truncate(capacity);
        }

        if bytes.len() % 2 != 0 {
            load_diagnostics.push(Diagnostic::OddTrailingByte {
                addr: base_address + (bytes.len() - 1) as Address,
            });
        }

        RawImage {
            bytes,
            base_address,
            load_diagnostics,
        }
    }

    /// Base address byte 0 lives at.
    pub fn base_address(&self) -> Address {
        self.base_address
    }

    /// Image length in bytes (after truncation).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the image holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One past the last loaded address.
    pub fn end_address(&self) -> Address {
        self.base_address + self.bytes.len() as Address
    }

    /// Warnings recorded while loading.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.load_diagnostics
    }

    /// Fetch the byte at `addr`, if loaded.
    pub fn byte_at(&self, addr: Address) -> Option<u8> {
        let off = addr.checked_sub(self.base_address)? as usize;
        self.bytes.get(off).copied()
    }

    /// Fetch the big-endian instruction word at `addr`, if both bytes are loaded.
    pub fn word_at(&self, addr: Address) -> Option<u16> {
        let hi = self.byte_at(addr)?;
        let lo = self.byte_at(addr.checked_add(1)?)?;
        Some(((hi as u16) << 8) | lo as u16)
    }

    /// Returns true if a full instruction word can be fetched at `addr`.
    pub fn contains_word(&self, addr: Address) -> bool {
        self.word_at(addr).is_some()
    }
}

/// The reconstructed program: decoded instructions, the code/data split,
/// branch-target labels, and the warnings gathered along the way.
///
/// Built incrementally by one strategy, then handed read-only to a
/// formatter. BTree containers keep iteration order deterministic so two
/// runs over the same input produce byte-identical listings.
#[derive(Debug, Clone, Default)]
pub struct DecodedProgram {
    /// Base address of the underlying image
    pub base_address: Address,
    /// Length of the underlying image in bytes
    pub image_len: usize,
    /// One decoded instruction per reached address
    pub instructions: BTreeMap<Address, Insn>,
    /// Bytes classified as data (never reached by traversal), keyed by address
    pub data: BTreeMap<Address, u8>,
    /// Branch and call targets, for listing labels
    pub labels: BTreeSet<Address>,
    /// Addresses of indirect jumps that could not be fully expanded
    pub unresolved: BTreeSet<Address>,
    /// Warnings collected during loading and traversal
    pub diagnostics: Vec<Diagnostic>,
}

impl DecodedProgram {
    /// Create an empty program over `image`, seeded with its load warnings.
    pub fn new(image: &RawImage) -> Self {
        DecodedProgram {
            base_address: image.base_address(),
            image_len: image.len(),
            diagnostics: image.diagnostics().to_vec(),
            ..Default::default()
        }
    }

    /// One past the last image address.
    pub fn end_address(&self) -> Address {
        self.base_address + self.image_len as Address
    }

    /// Number of decoded instructions.
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if `addr` was classified as data.
    pub fn is_data(&self, addr: Address) -> bool {
        self.data.contains_key(&addr)
    }

    /// Returns true if the indirect jump at `addr` was left unresolved.
    pub fn is_unresolved(&self, addr: Address) -> bool {
        self.unresolved.contains(&addr)
    }

    /// Record a warning and mirror it to the log.
    pub fn warn(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Warnings produced while loading or traversing an image.
///
/// None of these abort a run; the disassembler's job is best-effort
/// reconstruction of an unknown program, so every malformed or ambiguous
/// input degrades to a partial, annotated listing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// Image length is not a multiple of the instruction width
    #[error("odd trailing byte at 0x{addr:04x}; rendered as data")]
    OddTrailingByte { addr: Address },

    /// Image does not fit the addressable program space
    #[error("image of {got} bytes exceeds program space; truncated to {kept} bytes")]
    OversizedImage { got: usize, kept: usize },

    /// Bit pattern matched no opcode
    #[error("unrecognized opcode 0x{word:04x} at 0x{addr:04x}")]
    UnrecognizedOpcode { addr: Address, word: u16 },

    /// Indirect jump whose register set widened to unknown
    #[error("indirect jump at 0x{addr:04x} depends on an unknown V0; path ends here")]
    UnresolvedIndirectBranch { addr: Address },

    /// Computed branch or call target outside the loaded image
    #[error("target 0x{target:04x} of the instruction at 0x{addr:04x} is outside the image")]
    OutOfRangeTarget { addr: Address, target: Address },
}

/// Error type for disassembly operations that can genuinely fail.
#[derive(Debug, thiserror::Error)]
pub enum DisassemblyError {
    /// Output serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}
