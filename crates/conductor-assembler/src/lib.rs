//! Credential & tool assembler: turns a user's integrations and
//! requested skill names into the tool/MCP/sub-agent surface an LLM
//! invocation is allowed to use.

mod assembler;
mod decrypt;
mod error;
mod mcp;

pub use assembler::{assemble, AssembledPlan, DEFAULT_ALLOWED_TOOLS};
pub use decrypt::{AeadDecryptor, Decryptor};
pub use error::{AssemblerError, Result};
