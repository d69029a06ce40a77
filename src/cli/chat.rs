//! Interactive loop and one-shot queries

use std::error::Error;
use std::io::{self, IsTerminal, Write};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::debug;

use crate::cli::model_list::{list_all_models, list_models};
use crate::cli::render::{print_error, TerminalSink};
use crate::core::capability::DeliveryMode;
use crate::core::conversation::Conversation;
use crate::core::discovery::DiscoveryResult;
use crate::core::dispatch::{DispatchError, Dispatcher};
use crate::core::error::ConfigurationError;
use crate::core::providers::{ClientBinding, EnvCredentials, ProviderRegistry};
use crate::core::shell::run_shell_command;

/// Commands recognised at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveCommand {
    Quit,
    Clear,
    Help,
    /// `!m` lists models; `!m <model>` switches to one.
    Model(Option<String>),
    /// `!o` lists every provider's models; `!o provider|model` switches.
    AllModels(Option<String>),
    /// `!x <command>` runs a shell command and keeps its output as context.
    Shell(String),
}

impl InteractiveCommand {
    /// `None` for ordinary chat input.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let rest = input.strip_prefix('!')?;
        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        let argument = (!argument.is_empty()).then(|| argument.to_string());

        match name {
            "q" => Some(Self::Quit),
            "c" => Some(Self::Clear),
            "h" | "help" => Some(Self::Help),
            "m" => Some(Self::Model(argument)),
            "o" => Some(Self::AllModels(argument)),
            "x" => argument.map(Self::Shell),
            _ => None,
        }
    }
}

const HELP_TEXT: &str = "\
!q                 quit
!c                 clear the conversation
!m [model]         list models, or switch model
!o [provider|model] list all providers' models, or switch to one
!x <command>       run a shell command and add its output as context
Ctrl-C             cancel the running request or command";

/// One chat with one provider binding and a conversation history.
pub struct ChatSession {
    dispatcher: Dispatcher,
    registry: ProviderRegistry,
    binding: ClientBinding,
    model: String,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(
        dispatcher: Dispatcher,
        registry: ProviderRegistry,
        binding: ClientBinding,
        model: String,
        system_prompt: &str,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            binding,
            model,
            conversation: Conversation::new(system_prompt),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn binding(&self) -> &ClientBinding {
        &self.binding
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn push_context(&mut self, content: impl Into<String>) {
        self.conversation.push_user(content);
    }

    /// Send `prompt` and render the reply. `Ok(None)` means the request was
    /// interrupted before any reply text existed.
    ///
    /// A failed or interrupted turn is removed again, so the next question
    /// does not carry it along.
    pub async fn ask(&mut self, prompt: &str) -> Result<Option<String>, DispatchError> {
        self.conversation.push_user(prompt);

        let mode = self.dispatcher.classify(&self.model);
        let mut sink = TerminalSink::stdout();
        let result = self
            .dispatcher
            .dispatch_with_mode(
                &self.binding,
                self.conversation.messages(),
                &self.model,
                mode,
                &mut sink,
            )
            .await;

        match result {
            Ok(reply) => {
                if mode == DeliveryMode::Blocking {
                    sink.print_reply(&reply).ok();
                }
                sink.finish().ok();
                self.conversation.push_assistant(reply.clone());
                Ok(Some(reply))
            }
            Err(err) => {
                sink.finish().ok();
                self.conversation.discard_last_user();
                if err.is_interrupted() {
                    debug!("request interrupted; dropped pending turn");
                    return Ok(None);
                }
                Err(err)
            }
        }
    }

    pub fn switch_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    /// Rebind to another provider, keeping the conversation.
    pub fn switch_to(&mut self, selection: &DiscoveryResult) -> Result<(), ConfigurationError> {
        let descriptor = self.registry.require(&selection.provider)?;
        self.binding = ClientBinding::bind(descriptor, &EnvCredentials, None)?;
        self.model = selection.model.clone();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    async fn run_shell(&mut self, command: &str) -> Result<(), Box<dyn Error>> {
        let output = run_shell_command(command, self.dispatcher.coordinator(), |line| {
            println!("{line}");
        })
        .await?;
        if output.interrupted {
            println!("\ncommand interrupted");
        }
        self.conversation.push_user(output.to_context_message());
        Ok(())
    }

    /// Handle one `!` command. Returns `false` when the loop should end.
    async fn handle_command(
        &mut self,
        command: InteractiveCommand,
    ) -> Result<bool, Box<dyn Error>> {
        let client = self.dispatcher.client().clone();
        match command {
            InteractiveCommand::Quit => return Ok(false),
            InteractiveCommand::Clear => {
                self.clear();
                println!("conversation cleared");
            }
            InteractiveCommand::Help => println!("{HELP_TEXT}"),
            InteractiveCommand::Model(None) => {
                list_models(
                    &client,
                    &self.registry,
                    &EnvCredentials,
                    &self.binding.provider_id,
                    &self.model,
                )
                .await?;
            }
            InteractiveCommand::Model(Some(model)) => {
                self.switch_model(&model);
                println!("model: {model} ({})", self.dispatcher.classify(&model));
            }
            InteractiveCommand::AllModels(None) => {
                list_all_models(&client, &self.registry, &EnvCredentials).await?;
            }
            InteractiveCommand::AllModels(Some(selection)) => {
                let parsed = DiscoveryResult::parse(&selection)
                    .ok_or_else(|| format!("expected provider|model, got '{selection}'"))?;
                self.switch_to(&parsed)?;
                println!("switched to {parsed}");
            }
            InteractiveCommand::Shell(command) => self.run_shell(&command).await?,
        }
        Ok(true)
    }

    /// Read questions from stdin until `!q` or end of input.
    pub async fn run_interactive(&mut self) -> Result<(), Box<dyn Error>> {
        let styled = io::stdout().is_terminal();
        if styled {
            println!(
                "{} · {} · !h for help",
                self.binding.provider_display_name, self.model
            );
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            if styled {
                print!("❯ ");
                io::stdout().flush()?;
            }
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            if let Some(command) = InteractiveCommand::parse(input) {
                match self.handle_command(command).await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(err) => {
                        print_error(&err.to_string());
                        continue;
                    }
                }
            }

            if let Err(err) = self.ask(input).await {
                print_error(&err.to_string());
            }
        }
        Ok(())
    }
}

/// Everything piped into stdin, or `None` when stdin is a terminal.
pub async fn read_piped_stdin() -> io::Result<Option<String>> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    Ok(Some(input).filter(|text| !text.trim().is_empty()))
}

/// Ask one question and exit. Piped input becomes a context turn ahead of the
/// prompt, or is the question itself when no prompt words were given.
pub async fn run_one_shot(
    session: &mut ChatSession,
    prompt: &str,
    piped: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let question = match (prompt.trim().is_empty(), piped) {
        (true, Some(piped)) => piped,
        (false, Some(piped)) => {
            session.push_context(piped);
            prompt.to_string()
        }
        (_, None) => prompt.to_string(),
    };

    if let Some(command) = InteractiveCommand::parse(&question) {
        session.handle_command(command).await?;
        return Ok(());
    }

    session.ask(&question).await?;
    Ok(())
}
