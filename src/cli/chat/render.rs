//! Terminal presentation of chat messages: light markdown with highlighted
//! fenced code blocks.

use crossterm::style::{Color, Stylize, style};
use regex::{Captures, Regex};

use crate::types::{ChatMessage, Role};

const FENCE_PATTERN: &str = r"^\s*```\s*([\w+#.-]*)\s*$";
const HEADING_PATTERN: &str = r"^#{1,6}\s+(.+)$";
const INLINE_CODE_PATTERN: &str = r"`([^`]+)`";
const BOLD_PATTERN: &str = r"\*\*([^*]+)\*\*";

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Prose(String),
    Code {
        language: Option<String>,
        code: String,
    },
}

/// Split message text into prose and fenced code blocks.
///
/// An unterminated fence runs to the end of the text.
pub fn parse_blocks(content: &str) -> Vec<Block> {
    let Ok(fence) = Regex::new(FENCE_PATTERN) else {
        return vec![Block::Prose(content.to_string())];
    };

    let mut blocks = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut code: Option<(Option<String>, Vec<&str>)> = None;

    for line in content.lines() {
        let fence_language = fence.captures(line).map(|caps| caps[1].to_string());

        match code.take() {
            Some((language, lines)) if fence_language.as_deref() == Some("") => {
                blocks.push(Block::Code {
                    language,
                    code: lines.join("\n"),
                });
            }
            Some((language, mut lines)) => {
                lines.push(line);
                code = Some((language, lines));
            }
            None => match fence_language {
                Some(language) => {
                    if !prose.is_empty() {
                        blocks.push(Block::Prose(prose.join("\n")));
                        prose.clear();
                    }
                    code = Some((Some(language).filter(|l| !l.is_empty()), Vec::new()));
                }
                None => prose.push(line),
            },
        }
    }

    if let Some((language, lines)) = code {
        blocks.push(Block::Code {
            language,
            code: lines.join("\n"),
        });
    }
    if !prose.is_empty() {
        blocks.push(Block::Prose(prose.join("\n")));
    }

    blocks
}

pub fn render_message(message: &ChatMessage) -> String {
    let label = match message.role() {
        Role::User => style("You").bold().with(Color::Blue),
        Role::Assistant => style("Assistant").bold().with(Color::Green),
    };

    let mut out = format!("{}\n", label);
    for block in parse_blocks(message.content()) {
        match block {
            Block::Prose(text) => {
                for line in text.lines() {
                    out.push_str(&render_prose_line(line));
                    out.push('\n');
                }
            }
            Block::Code { language, code } => {
                let header = format!("┌─ {}", language.as_deref().unwrap_or("code"));
                out.push_str(&format!("{}\n", style(header).with(Color::DarkGrey)));
                for line in code.lines() {
                    out.push_str(&format!(
                        "{} {}\n",
                        style("│").with(Color::DarkGrey),
                        style(line).with(Color::Cyan)
                    ));
                }
                out.push_str(&format!("{}\n", style("└─").with(Color::DarkGrey)));
            }
        }
    }

    out
}

fn render_prose_line(line: &str) -> String {
    let (Ok(heading), Ok(inline_code), Ok(bold)) = (
        Regex::new(HEADING_PATTERN),
        Regex::new(INLINE_CODE_PATTERN),
        Regex::new(BOLD_PATTERN),
    ) else {
        return line.to_string();
    };

    if let Some(caps) = heading.captures(line) {
        return style(&caps[1]).bold().underlined().to_string();
    }

    let line = inline_code.replace_all(line, |caps: &Captures| {
        style(&caps[1]).with(Color::Yellow).to_string()
    });
    bold.replace_all(&line, |caps: &Captures| style(&caps[1]).bold().to_string())
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_prose_and_fenced_code() {
        let blocks = parse_blocks("Here you go:\n```rust\nfn main() {}\n```\nDone.");
        assert_eq!(
            blocks,
            vec![
                Block::Prose("Here you go:".to_string()),
                Block::Code {
                    language: Some("rust".to_string()),
                    code: "fn main() {}".to_string(),
                },
                Block::Prose("Done.".to_string()),
            ]
        );
    }

    #[test]
    fn fence_without_language_and_unterminated_fence() {
        let blocks = parse_blocks("```\nplain\n```\n```python\nprint(1)");
        assert_eq!(
            blocks,
            vec![
                Block::Code {
                    language: None,
                    code: "plain".to_string(),
                },
                Block::Code {
                    language: Some("python".to_string()),
                    code: "print(1)".to_string(),
                },
            ]
        );
    }

    #[test]
    fn fences_inside_code_keep_their_text() {
        let blocks = parse_blocks("```markdown\n```rust\n```");
        assert_eq!(
            blocks,
            vec![Block::Code {
                language: Some("markdown".to_string()),
                code: "```rust".to_string(),
            }]
        );
    }

    #[test]
    fn rendered_message_keeps_text_and_labels() {
        let message = ChatMessage::assistant("# Title\nUse `cargo` now.\n```sh\ncargo run\n```");
        let rendered = render_message(&message);
        assert!(rendered.contains("Assistant"));
        assert!(rendered.contains("Title"));
        assert!(rendered.contains("cargo"));
        assert!(rendered.contains("┌─ sh"));
        assert!(rendered.contains("cargo run"));
        assert!(!rendered.contains('`'));
    }
}
