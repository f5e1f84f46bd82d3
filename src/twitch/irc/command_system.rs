use std::future::Future;
use std::pin::Pin;

use crate::twitch::irc::commands;
use crate::twitch::irc::handler::MessageHandler;
use crate::twitch::models::{ChatEvent, UserRole};

pub struct CommandContext<'a> {
    pub event: &'a ChatEvent,
    pub params: &'a [&'a str],
    pub handler: &'a MessageHandler,
}

pub struct Command {
    pub name: &'static str,
    pub required_role: UserRole,
    pub handler: for<'a> fn(
        &'a CommandContext<'a>,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>
                + Send
                + 'a,
        >,
    >,
    pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
    Command {
        name: "?hello",
        required_role: UserRole::Viewer,
        handler: |ctx| Box::pin(commands::misc::handle_hello(ctx)),
        description: "Introduces the bot",
    },
    Command {
        name: "?goal",
        required_role: UserRole::Viewer,
        handler: |ctx| Box::pin(commands::misc::handle_goal(ctx)),
        description: "Explains what the bot is here for",
    },
    Command {
        name: "?leave",
        required_role: UserRole::Moderator,
        handler: |ctx| Box::pin(commands::misc::handle_leave(ctx)),
        description: "Shuts the bot down",
    },
    Command {
        name: "?fp",
        required_role: UserRole::Viewer,
        handler: |ctx| Box::pin(commands::false_positive::handle_fp(ctx)),
        description: "Cancels a pending ban event: ?fp <name>",
    },
    Command {
        name: "?reload",
        required_role: UserRole::Moderator,
        handler: |ctx| Box::pin(commands::reload::handle_reload(ctx)),
        description: "Reloads the filter config file",
    },
    Command {
        name: "?votebreak",
        required_role: UserRole::Viewer,
        handler: |ctx| Box::pin(commands::vote::handle_votebreak(ctx)),
        description: "Casts a vote for a break",
    },
    Command {
        name: "?gamble",
        required_role: UserRole::Moderator,
        handler: |ctx| Box::pin(commands::gamble::handle_gamble(ctx)),
        description: "Starts a gamble session: ?gamble <count>",
    },
];
