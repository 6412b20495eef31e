//! Output format module implementation

mod json;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::{Address, DecodedProgram, DisassemblyError, Insn};

/// Data bytes rendered per `.byte` row.
const DATA_ROW_WIDTH: usize = 8;

/// Supported output formats for disassembly results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text listing (default)
    Text,
    /// JSON format (hierarchical)
    Json,
    /// JSON Lines format (one JSON object per line)
    JsonLines,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get the default output format
    pub fn default() -> Self {
        OutputFormat::Text
    }

    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
        ]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn ListingFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
        }
    }
}

/// Formatter trait for decoded programs
pub trait ListingFormatter {
    /// Render a decoded program
    fn format(&self, program: &DecodedProgram) -> Result<String, DisassemblyError>;
}

/// Render a plain text listing, ordered by ascending address: labels before
/// their instruction, one row per instruction with the raw word as a
/// comment, data runs as `.byte` rows, and diagnostics at the end.
pub struct TextFormatter;

/// Format a decoded program in JSON
pub struct JsonFormatter;

/// Format a decoded program in JSON Lines
pub struct JsonLinesFormatter;

impl ListingFormatter for TextFormatter {
    fn format(&self, program: &DecodedProgram) -> Result<String, DisassemblyError> {
        let mut out = String::new();
        out.push_str(&format!(
            "Disassembly of 0x{:04X}..0x{:04X}:\n\n",
            program.base_address,
            program.end_address()
        ));

        // Instruction keys and data addresses are disjoint and each is
        // ordered, so a two-stream merge walks the image in address order.
        let mut insns = program.instructions.values().peekable();
        let mut data = program.data.iter().peekable();

        loop {
            match (insns.peek(), data.peek()) {
                (Some(insn), Some(&(&daddr, _))) if daddr < insn.addr => {
                    emit_data_row(&mut out, &mut data);
                }
                (Some(_), _) => {
                    let insn = insns.next().unwrap();
                    emit_insn_row(&mut out, program, insn);
                }
                (None, Some(_)) => {
                    emit_data_row(&mut out, &mut data);
                }
                (None, None) => break,
            }
        }

        if !program.diagnostics.is_empty() {
            out.push('\n');
            for diagnostic in &program.diagnostics {
                out.push_str(&format!("; warning: {}\n", diagnostic));
            }
        }

        Ok(out)
    }
}

fn emit_insn_row(out: &mut String, program: &DecodedProgram, insn: &Insn) {
    if program.labels.contains(&insn.addr) {
        out.push_str(&format!("L_{:04X}:\n", insn.addr));
    }

    let text = insn.to_string();
    out.push_str(&format!(
        "0x{:04X}: {:<24} ; {:04X}",
        insn.addr, text, insn.word
    ));
    if program.is_unresolved(insn.addr) {
        out.push_str(" ; unresolved indirect target");
    }
    out.push('\n');
}

/// Consume one run of contiguous data bytes and render a `.byte` row.
fn emit_data_row<'a, I>(out: &mut String, data: &mut std::iter::Peekable<I>)
where
    I: Iterator<Item = (&'a Address, &'a u8)>,
{
    let (&start, &first) = data.next().expect("caller peeked a data byte");
    let mut bytes = vec![first];
    let mut prev = start;

    while bytes.len() < DATA_ROW_WIDTH {
        match data.peek() {
            Some(&(&addr, &byte)) if addr == prev.wrapping_add(1) => {
                data.next();
                bytes.push(byte);
                prev = addr;
            }
            _ => break,
        }
    }

    let rendered = bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("0x{:04X}: .byte {}\n", start, rendered));
}
