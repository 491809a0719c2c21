pub mod client;
pub mod conversation_state;
pub mod prompt;
pub mod render;
pub mod store;
pub mod transport;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use color_print::cformat;
use eyre::Result;

use client::ChatClient;
use render::render_message;
use store::{FileMessageStore, MessageStore};
use transport::{HttpProxyTransport, ProxyTransport};

const WELCOME_TEXT: &str = "
Hi, I'm Benge. Ask me anything.

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Gemini Web Chat

/clear        Clear the conversation history
/help         Show this help dialogue
/quit         Quit the application
";

#[derive(Debug, Clone, Args)]
pub struct ChatArgs {
    /// Base URL of the chat proxy
    #[arg(long, env = "CHAT_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    pub server: String,

    /// File holding the saved conversation
    #[arg(long, env = "CHAT_HISTORY_FILE")]
    pub history_file: Option<PathBuf>,

    /// Input to send to the chat
    #[arg(short, long)]
    pub input: Option<String>,
}

pub struct ChatContext<T, S> {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    client: ChatClient<T, S>,
    shown: usize,
}

impl ChatContext<HttpProxyTransport, FileMessageStore> {
    pub fn from_args(output: Box<dyn Write>, args: &ChatArgs) -> Result<Self> {
        let transport = HttpProxyTransport::new(&args.server)?;
        let store = match &args.history_file {
            Some(path) => FileMessageStore::new(path),
            None => FileMessageStore::default_location()?,
        };
        tracing::debug!("Chat history file: {}", store.path().display());

        let interactive = args.input.is_none();
        Ok(Self::new(
            output,
            args.input.clone(),
            interactive,
            ChatClient::new(transport, store),
        ))
    }
}

impl<T, S> ChatContext<T, S>
where
    T: ProxyTransport,
    S: MessageStore,
{
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        client: ChatClient<T, S>,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            client,
            shown: 0,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.interactive {
            self.print_welcome()?;
            self.show_new_messages()?;
        } else {
            // Only the new exchange is shown for a one-shot query.
            self.shown = self.client.state().messages.len();
        }

        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(match self.client.state().error {
                Some(_) => ExitCode::FAILURE,
                None => ExitCode::SUCCESS,
            });
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let readline = rl.readline(prompt::PROMPT);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if !self.handle_input(&line).await? {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Input closed: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Returns `false` once the user asks to quit.
    async fn handle_input(&mut self, input: &str) -> Result<bool> {
        match input.trim() {
            "/quit" => return Ok(false),
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.client.clear();
                self.shown = 0;
                writeln!(self.output, "Conversation cleared.")?;
            }
            _ => self.process_chat_input(input).await?,
        }

        Ok(true)
    }

    async fn process_chat_input(&mut self, input: &str) -> Result<()> {
        if !self.client.begin_turn(input) {
            return Ok(());
        }

        self.show_new_messages()?;
        writeln!(self.output, "{}", cformat!("<dim>AI is thinking...</>"))?;
        self.output.flush()?;

        self.client.await_reply().await;
        self.show_new_messages()?;

        if let Some(error) = &self.client.state().error {
            writeln!(self.output, "{}", cformat!("<red><bold>Error:</></> {}", error))?;
        }

        Ok(())
    }

    /// Print messages appended since the last call, keeping the newest turn in view.
    fn show_new_messages(&mut self) -> Result<()> {
        let messages = &self.client.state().messages;
        for message in messages.iter().skip(self.shown) {
            writeln!(self.output, "{}", render_message(message))?;
        }
        self.shown = messages.len();
        self.output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::test_support::{FakeUpstream, spawn_proxy};
    use crate::types::ChatMessage;
    use super::store::MemoryMessageStore;

    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl SharedOutput {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Never answers.
    struct StalledTransport;

    #[async_trait]
    impl ProxyTransport for StalledTransport {
        async fn send(
            &self,
            _messages: &[ChatMessage],
        ) -> std::result::Result<String, transport::ClientError> {
            std::future::pending().await
        }
    }

    async fn context(
        reply: Option<&str>,
        store: MemoryMessageStore,
        input: Option<&str>,
    ) -> (ChatContext<HttpProxyTransport, MemoryMessageStore>, SharedOutput) {
        let upstream = match reply {
            Some(text) => FakeUpstream::replying(text),
            None => FakeUpstream::failing(|| crate::gemini_client::UpstreamError::EmptyResponse {
                finish_reason: "OTHER".to_string(),
            }),
        };
        let base = spawn_proxy(Some(upstream)).await;
        let output = SharedOutput::default();
        let client = ChatClient::new(HttpProxyTransport::new(&base).unwrap(), store);
        let interactive = input.is_none();
        let context = ChatContext::new(
            Box::new(output.clone()),
            input.map(str::to_string),
            interactive,
            client,
        );
        (context, output)
    }

    #[tokio::test]
    async fn one_shot_query_prints_the_exchange() {
        let store = MemoryMessageStore::new();
        store.save(&[ChatMessage::user("earlier")]).unwrap();
        let (mut ctx, output) = context(Some("Use `cargo new`."), store.clone(), Some("How?")).await;

        let code = ctx.run().await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let text = output.text();
        assert!(text.contains("AI is thinking..."));
        assert!(text.contains("How?"));
        assert!(text.contains("cargo new"));
        assert!(!text.contains("earlier"));
        assert_eq!(store.snapshot().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_query_reports_error_and_exit_code() {
        let (mut ctx, output) = context(None, MemoryMessageStore::new(), Some("Hello")).await;

        let code = ctx.run().await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);

        let text = output.text();
        assert!(text.contains("Error:"));
        assert!(text.contains("HTTP error! status: 500"));
        assert_eq!(ctx.client.state().messages.len(), 1);
    }

    #[tokio::test]
    async fn commands_are_not_sent_as_chat() {
        let store = MemoryMessageStore::new();
        let (mut ctx, output) = context(Some("Hi!"), store.clone(), None).await;

        assert!(ctx.handle_input("Hello").await.unwrap());
        assert_eq!(ctx.client.state().messages.len(), 2);

        assert!(ctx.handle_input("/help").await.unwrap());
        assert!(output.text().contains("/clear"));

        assert!(ctx.handle_input("  /clear ").await.unwrap());
        assert!(ctx.client.state().messages.is_empty());
        assert_eq!(store.snapshot(), None);
        assert!(output.text().contains("Conversation cleared."));

        assert!(!ctx.handle_input("/quit").await.unwrap());
    }

    #[tokio::test]
    async fn restored_history_is_shown_on_start() {
        let store = MemoryMessageStore::new();
        store
            .save(&[ChatMessage::user("from last time"), ChatMessage::assistant("welcome back")])
            .unwrap();
        let (mut ctx, output) = context(Some("unused"), store, None).await;

        ctx.print_welcome().unwrap();
        ctx.show_new_messages().unwrap();

        let text = output.text();
        assert!(text.contains("from last time"));
        assert!(text.contains("welcome back"));
        assert_eq!(ctx.shown, 2);
    }

    #[tokio::test]
    async fn user_turn_is_shown_while_waiting_for_reply() {
        let output = SharedOutput::default();
        let client = ChatClient::new(StalledTransport, MemoryMessageStore::new());
        let mut ctx = ChatContext::new(Box::new(output.clone()), None, true, client);

        let waited = tokio::time::timeout(Duration::from_millis(100), ctx.handle_input("Hello")).await;
        assert!(waited.is_err());

        let text = output.text();
        let user_turn = text.find("Hello").unwrap();
        let thinking = text.find("AI is thinking...").unwrap();
        assert!(user_turn < thinking);
        assert!(ctx.client.state().is_loading);
        assert_eq!(ctx.shown, 1);

        assert!(ctx.handle_input("again").await.unwrap());
        assert_eq!(ctx.client.state().messages.len(), 1);
    }
}
