use rustyline::{Config, Editor, Result};

pub const PROMPT: &str = "> ";

/// Line editor for chat input; lines starting with a space stay out of history.
pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();
    Editor::with_config(config)
}
