use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::error::DomainError;
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Deposit,
    Withdraw,
}

pub async fn balance(ctx: Arc<CmdCtx>, user_id: UserId) -> CommandResult<CommandOutput> {
    let character = ctx.registry.services.character.lock(user_id).await?;
    Ok(success!(format!(
        "You carry ${} and have ${} in the bank.",
        character.stats.money, character.stats.bank
    )))
}

/// Move money between pocket and bank. Only possible at a structure offering `/bank`.
pub async fn transfer(ctx: Arc<CmdCtx>, user_id: UserId, args: Args, dir: Transfer) -> CommandResult<CommandOutput> {
    let Some(amount) = args.int("amount") else {
        return Err(CommandError::Usage("/deposit <amount>".into()));
    };
    let characters = &ctx.registry.services.character;
    let mut character = characters.lock(user_id).await?;
    let bank = ctx
        .registry
        .services
        .structure
        .get_with_command(&character.location, "/bank", None)
        .map_err(|_| DomainError::PreconditionFailed("There is no bank here.".into()))?;

    let stats = &mut character.stats;
    match dir {
        Transfer::Deposit => {
            if stats.money < amount {
                return Err(DomainError::InsufficientFunds {
                    have: stats.money,
                    need: amount,
                }
                .into());
            }
            stats.money -= amount;
            stats.bank += amount;
        }
        Transfer::Withdraw => {
            if stats.bank < amount {
                return Err(DomainError::InsufficientFunds {
                    have: stats.bank,
                    need: amount,
                }
                .into());
            }
            stats.bank -= amount;
            stats.money += amount;
        }
    }
    characters.publish_stats(&character);
    tracing::debug!(%user_id, bank = %bank.id, ?dir, amount, "bank transfer");

    Ok(success!(match dir {
        Transfer::Deposit => format!("You deposit ${amount} at {}.", bank.name),
        Transfer::Withdraw => format!("You withdraw ${amount} from {}.", bank.name),
    }))
}
