pub mod conversation;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod script;
pub mod setup;
pub mod workflow;
