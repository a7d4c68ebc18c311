use std::collections::HashSet;
use thiserror::Error;

use super::{RecipientId, SubscriberRegistry};

pub const ADD_USER_USAGE: &str = "Use: /adduser <chat_id> <name>";
pub const REMOVE_USER_USAGE: &str = "Use: /removeuser <chat_id>";
pub const DEFAULT_DISPLAY_NAME: &str = "Trader";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddUser { id: RecipientId, name: String },
    RemoveUser { id: RecipientId },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Malformed arguments; the message is the usage line to reply with
    #[error("{0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse a chat message
    ///
    /// `None` for plain text and commands this bot does not handle.
    pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
        let mut tokens = text.split_whitespace();
        let head = tokens.next()?;
        // "/adduser@scan_bot" in group chats
        let name = head.strip_prefix('/')?.split('@').next()?;

        match name {
            "adduser" => {
                let Some(id) = tokens.next() else {
                    return Some(Err(CommandError::Usage(ADD_USER_USAGE)));
                };
                let display_name = tokens.collect::<Vec<_>>().join(" ");
                let display_name = if display_name.is_empty() {
                    DEFAULT_DISPLAY_NAME.to_string()
                } else {
                    display_name
                };
                Some(Ok(Command::AddUser {
                    id: RecipientId::new(id),
                    name: display_name,
                }))
            }
            "removeuser" => match tokens.next() {
                Some(id) => Some(Ok(Command::RemoveUser {
                    id: RecipientId::new(id),
                })),
                None => Some(Err(CommandError::Usage(REMOVE_USER_USAGE))),
            },
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandRejection {
    #[error("{0} is not an admin")]
    NotAdmin(RecipientId),
}

/// Allow-list gate run before any command executes
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    admins: HashSet<RecipientId>,
}

impl AdminPolicy {
    pub fn new<I>(admins: I) -> Self
    where
        I: IntoIterator<Item = RecipientId>,
    {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, sender: &RecipientId) -> bool {
        self.admins.contains(sender)
    }

    pub fn check(&self, sender: &RecipientId) -> Result<(), CommandRejection> {
        if self.is_admin(sender) {
            Ok(())
        } else {
            Err(CommandRejection::NotAdmin(sender.clone()))
        }
    }
}

/// What the bot should send back after a command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Reply to the sender
    pub reply: String,
    /// Message for a newly added subscriber
    pub welcome: Option<(RecipientId, String)>,
}

impl CommandOutcome {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            welcome: None,
        }
    }
}

pub fn welcome_message(name: &str) -> String {
    format!(
        "Welcome {} 🤝\nYou're now part of the Pro Traders list.\nBot access granted.",
        name
    )
}

pub struct CommandHandler {
    policy: AdminPolicy,
    registry: SubscriberRegistry,
}

impl CommandHandler {
    pub fn new(policy: AdminPolicy, registry: SubscriberRegistry) -> Self {
        Self { policy, registry }
    }

    /// Handle one incoming message
    ///
    /// Returns `None` for non-commands and for senders outside the admin
    /// list, who get no reply at all.
    pub fn handle(&self, sender: &RecipientId, text: &str) -> Option<CommandOutcome> {
        let parsed = Command::parse(text)?;

        if let Err(rejection) = self.policy.check(sender) {
            tracing::debug!("Ignoring command: {}", rejection);
            return None;
        }

        let outcome = match parsed {
            Ok(command) => self.execute(command),
            Err(usage) => CommandOutcome::reply(usage.to_string()),
        };
        Some(outcome)
    }

    fn execute(&self, command: Command) -> CommandOutcome {
        match command {
            Command::AddUser { id, name } => {
                match self.registry.add_recipient(id.clone(), name.clone()) {
                    Ok(_) => {
                        tracing::info!("Added subscriber {} ({})", name, id);
                        CommandOutcome {
                            reply: format!("User {} added and welcomed.", name),
                            welcome: Some((id, welcome_message(&name))),
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to add subscriber {}: {}", id, e);
                        CommandOutcome::reply(format!("Failed to add user {}.", name))
                    }
                }
            }
            Command::RemoveUser { id } => match self.registry.remove_recipient(&id) {
                Ok(removed) => {
                    tracing::info!("Removed subscriber {}", id);
                    let name = removed.unwrap_or_else(|| "User".to_string());
                    CommandOutcome::reply(format!("{} removed from access.", name))
                }
                Err(e) => {
                    tracing::error!("Failed to remove subscriber {}: {}", id, e);
                    CommandOutcome::reply(format!("Failed to remove {}.", id))
                }
            },
        }
    }
}
