//! The constraint layer between the record store and the language model.
//!
//! The model never sees raw records and the user never sees raw model
//! output. Inbound, the context assembler builds a bounded,
//! privacy-trimmed JSON summary from real store queries. Outbound, the
//! response validator parses the model's reply, checks every referenced
//! company against the context it was given, and degrades to a
//! deterministic data-driven answer when the reply fails validation or
//! the model is unreachable. The model is bound on both sides.

pub mod answers;
pub mod chat;
pub mod context;
pub mod error;
pub mod intent;
pub mod llm;
pub mod response_validator;

pub use answers::deterministic_answer;
pub use chat::{Assistant, ChatReply, ChatTurn, SessionStore};
pub use context::{CompactContext, ContextAssembler, ContextCustomer};
pub use error::{BridgeError, BridgeResult};
pub use intent::QueryIntent;
pub use llm::LlmClient;
pub use response_validator::{validate, AssistantReply, ValidationFailure};
