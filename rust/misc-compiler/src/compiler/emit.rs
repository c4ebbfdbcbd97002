//! Assembly serialization: JSON for tooling, text listing for humans.

use crate::compiler::code::Assembly;

/// Emit the instruction list as pretty-printed JSON.
pub fn emit_json(asm: &Assembly) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&asm.instructions)
}

/// Emit the instruction list as compact JSON.
pub fn emit_compact_json(asm: &Assembly) -> Result<String, serde_json::Error> {
    serde_json::to_string(&asm.instructions)
}

/// Emit the offset-tagged text listing.
pub fn emit_listing(asm: &Assembly) -> String {
    asm.listing()
}
