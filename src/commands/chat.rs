use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::error::DomainError;
use crate::events::{self, ChatLine};
use crate::models::types::UserId;
use crate::net::output::Scope;
use crate::success;
use std::sync::Arc;

fn message(args: &Args) -> CommandResult<&str> {
    args.text("message")
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            CommandError::Domain(DomainError::Validation {
                field: "message",
                message: "Say what?".into(),
            })
        })
}

pub async fn global(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let text = message(&args)?;
    let name = ctx.registry.services.character.lock(user_id).await?.name.clone();

    let line = ChatLine::new(name, text);
    ctx.registry.broadcaster.dispatch(Scope::Server, events::chat_global(&line));
    Ok(success!(""))
}

pub async fn say(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let text = message(&args)?;
    let (name, room) = {
        let character = ctx.registry.services.character.lock(user_id).await?;
        (character.name.clone(), character.location.clone())
    };

    let line = ChatLine::new(name, text);
    ctx.registry.broadcaster.dispatch(Scope::Room(room), events::chat_say(&line));
    Ok(success!(""))
}

/// Delivered to the named player's current connection, with an echo to the sender.
pub async fn whisper(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let Some(to) = args.word("name") else {
        return Err(CommandError::Usage("/whisper <name> <message>".into()));
    };
    let text = message(&args)?;
    let characters = &ctx.registry.services.character;

    let from = characters.lock(user_id).await?.name.clone();
    let target = characters.get_by_name(to)?;
    let (target_id, target_name) = {
        let t = target.lock().await;
        (t.user_id, t.name.clone())
    };
    if target_id == user_id {
        return Err(DomainError::Validation {
            field: "name",
            message: "You mumble something to yourself.".into(),
        }
        .into());
    }

    let line = ChatLine::new(from, text).to(target_name);
    let env = events::chat_whisper(&line);
    ctx.registry.broadcaster.dispatch(Scope::User(target_id), env.clone());
    ctx.registry.broadcaster.dispatch(Scope::User(user_id), env);
    Ok(success!(""))
}
