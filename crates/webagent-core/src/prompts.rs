use crate::protocol::{TERMINATE_OPEN, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use crate::sandbox::Sandbox;
use crate::tools::ToolRegistry;

const PREAMBLE: &str = "You are a web development agent. You build a website inside a project \
directory by calling tools, one step at a time. After each of your messages you receive the \
result of every tool call you made, then you continue.";

/// System prompt: role, protocol, tool catalog and sandbox rules.
pub fn get_system_prompt(registry: &ToolRegistry, sandbox: &Sandbox) -> String {
    let mut prompt = String::new();
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\n# Protocol\n\n");
    prompt.push_str(&format!(
        "To call a tool, write a block containing one JSON object:\n\n\
         {open}{{\"tool\": \"fs.write\", \"args\": {{\"path\": \"index.html\", \"content\": \"...\"}}}}{close}\n\n\
         You may include several tool call blocks in one message; they run in order. \
         Tool results arrive in the next message as `Tool result: {{...}}`. \
         A failed call reports an error kind and message; read it and adapt.\n\n\
         When the task is complete, write {term} on its own. You may give a reason as \
         {term}reason{term_close}.\n",
        open = TOOL_CALL_OPEN,
        close = TOOL_CALL_CLOSE,
        term = TERMINATE_OPEN,
        term_close = crate::protocol::TERMINATE_CLOSE,
    ));

    prompt.push_str("\n# Tools\n\n");
    for definition in registry.definitions() {
        prompt.push_str(&format!("- `{}`: {}\n", definition.signature(), definition.description));
    }

    prompt.push_str("\n# Rules\n\n");
    prompt.push_str("- All paths are relative to the project root. Paths outside it are rejected.\n");
    let protected = sandbox.describe_protected();
    if !protected.is_empty() {
        prompt.push_str(&format!(
            "- These paths are read-only and cannot be written, edited or deleted: {}\n",
            protected.join(", ")
        ));
    }
    prompt.push_str("- Use fs.edit for small changes to existing files and fs.write for new files.\n");

    prompt
}
