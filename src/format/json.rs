//! JSON and JSON Lines output formatters

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ListingFormatter;
use crate::{DecodedProgram, DisassemblyError, Insn, Kind};

/// Serializable instruction for JSON output
#[derive(Serialize, Deserialize)]
struct InstructionJson {
    /// Address of the instruction
    address: String,
    /// Raw instruction word as hex string
    word: String,
    /// Mnemonic (e.g., "ld", "jp")
    mnemonic: String,
    /// Operands
    operands: String,
    /// Control-transfer classification
    kind: String,
    /// Whether this is an indirect jump that could not be expanded
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    unresolved: bool,
}

/// Serializable data run for JSON output
#[derive(Serialize, Deserialize)]
struct DataJson {
    /// Address of the first byte
    address: String,
    /// Raw bytes as hex strings
    bytes: Vec<String>,
}

/// Serializable decoded program for JSON output
#[derive(Serialize, Deserialize)]
struct ProgramJson {
    /// Base address of the image
    base_address: String,
    /// Decoded instructions in address order
    instructions: Vec<InstructionJson>,
    /// Bytes classified as data, as contiguous runs
    data: Vec<DataJson>,
    /// Branch and call targets
    labels: Vec<String>,
    /// Warnings collected during the run
    diagnostics: Vec<String>,
}

impl ListingFormatter for super::JsonFormatter {
    fn format(&self, program: &DecodedProgram) -> Result<String, DisassemblyError> {
        let result = ProgramJson {
            base_address: format!("0x{:04x}", program.base_address),
            instructions: program
                .instructions
                .values()
                .map(|insn| instruction_to_json(program, insn))
                .collect(),
            data: data_runs(program),
            labels: program
                .labels
                .iter()
                .map(|addr| format!("0x{:04x}", addr))
                .collect(),
            diagnostics: program.diagnostics.iter().map(|d| d.to_string()).collect(),
        };

        Ok(serde_json::to_string_pretty(&result)?)
    }
}

impl ListingFormatter for super::JsonLinesFormatter {
    fn format(&self, program: &DecodedProgram) -> Result<String, DisassemblyError> {
        let mut output = String::new();

        for insn in program.instructions.values() {
            let line = json!({
                "type": "instruction",
                "address": format!("0x{:04x}", insn.addr),
                "word": format!("{:04x}", insn.word),
                "mnemonic": insn.mnemonic,
                "operands": insn.operands,
                "kind": kind_name(&insn.kind),
                "label": program.labels.contains(&insn.addr),
                "unresolved": program.is_unresolved(insn.addr),
            });
            output.push_str(&serde_json::to_string(&line)?);
            output.push('\n');
        }

        for run in data_runs(program) {
            let line = json!({
                "type": "data",
                "address": run.address,
                "bytes": run.bytes,
            });
            output.push_str(&serde_json::to_string(&line)?);
            output.push('\n');
        }

        for diagnostic in &program.diagnostics {
            let line = json!({
                "type": "diagnostic",
                "message": diagnostic.to_string(),
            });
            output.push_str(&serde_json::to_string(&line)?);
            output.push('\n');
        }

        Ok(output)
    }
}

/// Convert an instruction to JSON format
fn instruction_to_json(program: &DecodedProgram, insn: &Insn) -> InstructionJson {
    InstructionJson {
        address: format!("0x{:04x}", insn.addr),
        word: format!("{:04x}", insn.word),
        mnemonic: insn.mnemonic.to_string(),
        operands: insn.operands.clone(),
        kind: kind_name(&insn.kind).to_string(),
        unresolved: program.is_unresolved(insn.addr),
    }
}

/// Group the data map into contiguous runs.
fn data_runs(program: &DecodedProgram) -> Vec<DataJson> {
    let mut runs: Vec<DataJson> = Vec::new();
    let mut prev = None;

    for (&addr, &byte) in &program.data {
        let contiguous = prev == Some(addr.wrapping_sub(1));
        match runs.last_mut() {
            Some(run) if contiguous => run.bytes.push(format!("{:02x}", byte)),
            _ => runs.push(DataJson {
                address: format!("0x{:04x}", addr),
                bytes: vec![format!("{:02x}", byte)],
            }),
        }
        prev = Some(addr);
    }

    runs
}

fn kind_name(kind: &Kind) -> &'static str {
    match kind {
        Kind::Sequential => "sequential",
        Kind::SkipConditional => "skip",
        Kind::JumpAbsolute { .. } => "jump",
        Kind::JumpIndirect { .. } => "jump_indirect",
        Kind::Call { .. } => "call",
        Kind::Return => "return",
        Kind::SysCall { .. } => "sys",
        Kind::ClearScreen => "cls",
        Kind::Unknown => "unknown",
    }
}
