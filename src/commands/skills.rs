use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::models::skill::SkillKind;
use crate::models::types::UserId;
use crate::services::SkillOutcome;
use crate::success;
use std::sync::Arc;

pub async fn hide(ctx: Arc<CmdCtx>, user_id: UserId) -> CommandResult<CommandOutput> {
    let outcome = ctx.registry.services.skills.apply(SkillKind::Hide, user_id, None).await?;
    Ok(success!(describe(outcome)))
}

pub async fn search(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let Some(name) = args.word("name") else {
        return Err(CommandError::Usage("/search <name>".into()));
    };
    let outcome = ctx
        .registry
        .services
        .skills
        .apply(SkillKind::Search, user_id, Some(name))
        .await?;
    Ok(success!(describe(outcome)))
}

fn describe(outcome: SkillOutcome) -> String {
    match outcome {
        SkillOutcome::Hidden(true) => "You slip into the shadows.".to_string(),
        SkillOutcome::Hidden(false) => "You step out of hiding.".to_string(),
        SkillOutcome::Found(name) => format!("You found {name}!"),
        SkillOutcome::NothingFound => "You search around but find no one.".to_string(),
    }
}
