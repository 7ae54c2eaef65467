use crate::Registry;
use crate::commands::validate::{Args, ParamKind, ParamRule, validate};
use crate::error::DomainError;
use crate::input::parser::parse_command;
use crate::models::types::UserId;
use crate::net::output::OutputHandle;
use crate::state::session::Session;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

mod aim;
mod bank;
mod chat;
mod drop;
mod giveitem;
mod go;
mod heal;
mod inventory;
mod look;
mod pickup;
mod shop;
mod skills;
mod travel;
pub mod validate;
mod who;

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl CommandError {
    /// Text sent back to the issuing connection.
    pub fn player_message(&self) -> String {
        match self {
            CommandError::UnknownCommand(key) => format!("Unknown command '/{key}'. Try /help."),
            CommandError::Usage(usage) => format!("Usage: {usage}"),
            CommandError::PermissionDenied => "You are not allowed to do that.".to_string(),
            CommandError::NotLoggedIn => "You are not logged in.".to_string(),
            CommandError::Domain(e) => e.player_message(),
        }
    }
}

/// Command context passed to command handlers
pub struct CmdCtx {
    /// Global service registry
    pub registry: Arc<Registry>,
    /// Player session
    pub sess: Arc<RwLock<Session>>,
    /// Output of the connection the command arrived on
    pub output: OutputHandle,
}

impl CmdCtx {
    pub fn new(registry: Arc<Registry>, output: OutputHandle) -> Self {
        Self {
            sess: Arc::new(RwLock::new(Session::new(output.conn_id()))),
            registry,
            output,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.sess.try_read().is_some_and(|s| s.is_logged_in())
    }

    /// The user acting through this connection. A session whose user has since been bound to
    /// another connection no longer resolves.
    pub fn user_id(&self) -> CommandResult<UserId> {
        let user_id = self.sess.read().user_id().ok_or(CommandError::NotLoggedIn)?;
        if !self.registry.broadcaster.is_bound(user_id, self.output.conn_id()) {
            return Err(CommandError::NotLoggedIn);
        }
        Ok(user_id)
    }
}

pub struct CommandOutput {
    pub message: String,
    pub is_error: bool,
}

#[macro_export]
macro_rules! success {
    ($msg:expr) => {
        $crate::commands::CommandOutput {
            is_error: false,
            message: $msg.to_string(),
        }
    };
}

#[macro_export]
macro_rules! failure {
    ($msg:expr) => {
        $crate::commands::CommandOutput {
            is_error: true,
            message: $msg.to_string(),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Help,
    Who,
    Look,
    Move,
    Inventory,
    Equip,
    Unequip,
    Drop,
    Pickup,
    GiveItem,
    Heal,
    Travel,
    Shop,
    Hide,
    Search,
    Aim,
    Global,
    Say,
    Whisper,
    Balance,
    Deposit,
    Withdraw,
}

/// One row of the command table. Parsing, validation and `/help` all read from it.
pub struct CommandSpec {
    pub kind: CommandKind,
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    pub params: &'static [ParamRule],
    pub help: &'static str,
    /// Only available when the server runs in dev mode
    pub privileged: bool,
    /// Needs a logged in character
    pub in_world: bool,
}

impl CommandSpec {
    pub fn matches(&self, key: &str) -> bool {
        self.key == key || self.aliases.contains(&key)
    }

    pub fn usage(&self) -> String {
        let mut usage = format!("/{}", self.key);
        for p in self.params {
            usage.push(' ');
            usage.push_str(&p.usage());
        }
        usage
    }
}

const AMOUNT: ParamKind = ParamKind::Integer { min: 1, max: 1_000_000 };
const SLOT: ParamRule = ParamRule::required("item", ParamKind::ItemOrSlot);
const MESSAGE: ParamRule = ParamRule::required("message", ParamKind::Text);

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        kind: CommandKind::Help,
        key: "help",
        aliases: &["h", "?"],
        params: &[],
        help: "Show this help",
        privileged: false,
        in_world: false,
    },
    CommandSpec {
        kind: CommandKind::Who,
        key: "who",
        aliases: &[],
        params: &[],
        help: "List online players",
        privileged: false,
        in_world: false,
    },
    CommandSpec {
        kind: CommandKind::Look,
        key: "look",
        aliases: &["l"],
        params: &[],
        help: "Look around",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Move,
        key: "move",
        aliases: &["go", "m"],
        params: &[ParamRule::required("direction", ParamKind::Direction)],
        help: "Walk one cell north, south, east or west",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Inventory,
        key: "inventory",
        aliases: &["inv", "i"],
        params: &[],
        help: "List your inventory",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Equip,
        key: "equip",
        aliases: &[],
        params: &[SLOT],
        help: "Equip an item",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Unequip,
        key: "unequip",
        aliases: &[],
        params: &[SLOT],
        help: "Unequip an item",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Drop,
        key: "drop",
        aliases: &[],
        params: &[SLOT, ParamRule::optional("amount", AMOUNT)],
        help: "Drop an item on the ground",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Pickup,
        key: "pickup",
        aliases: &["get"],
        params: &[
            ParamRule::optional("item", ParamKind::Word),
            ParamRule::optional("amount", AMOUNT),
        ],
        help: "Pick up an item from the ground",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::GiveItem,
        key: "giveitem",
        aliases: &[],
        params: &[
            ParamRule::required("item", ParamKind::ItemTemplate),
            ParamRule::optional("amount", ParamKind::Integer { min: 1, max: 1000 }),
        ],
        help: "Create items out of thin air",
        privileged: true,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Heal,
        key: "heal",
        aliases: &[],
        params: &[
            ParamRule::required("ticks", ParamKind::Integer { min: 1, max: 10_000 }),
            ParamRule::optional("structure", ParamKind::Text),
        ],
        help: "Buy healing at a hospital",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Travel,
        key: "travel",
        aliases: &[],
        params: &[
            ParamRule::required("destination", ParamKind::Word),
            ParamRule::optional("structure", ParamKind::Text),
        ],
        help: "Travel to a destination offered here",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Shop,
        key: "shop",
        aliases: &[],
        params: &[ParamRule::optional("shop", ParamKind::Text)],
        help: "Browse a shop here",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Hide,
        key: "hide",
        aliases: &[],
        params: &[],
        help: "Hide from other players, or come out of hiding",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Search,
        key: "search",
        aliases: &[],
        params: &[ParamRule::required("name", ParamKind::Word)],
        help: "Search for a hidden player",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Aim,
        key: "aim",
        aliases: &["target"],
        params: &[ParamRule::optional("name", ParamKind::Word)],
        help: "Aim at a player here; without a name, lower your aim",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Global,
        key: "global",
        aliases: &["g"],
        params: &[MESSAGE],
        help: "Talk to everyone online",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Say,
        key: "say",
        aliases: &["s"],
        params: &[MESSAGE],
        help: "Talk to everyone here",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Whisper,
        key: "whisper",
        aliases: &["w"],
        params: &[ParamRule::required("name", ParamKind::Word), MESSAGE],
        help: "Talk to one player",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Balance,
        key: "balance",
        aliases: &["bal"],
        params: &[],
        help: "Show your money and bank balance",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Deposit,
        key: "deposit",
        aliases: &[],
        params: &[ParamRule::required("amount", AMOUNT)],
        help: "Put money in the bank",
        privileged: false,
        in_world: true,
    },
    CommandSpec {
        kind: CommandKind::Withdraw,
        key: "withdraw",
        aliases: &[],
        params: &[ParamRule::required("amount", AMOUNT)],
        help: "Take money out of the bank",
        privileged: false,
        in_world: true,
    },
];

pub fn find_command(key: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.matches(key))
}

/// Parse, validate, resolve the actor, run. Nothing is mutated unless every step before the
/// handler succeeded.
pub async fn process_command(raw: &str, ctx: Arc<CmdCtx>) -> CommandResult<CommandOutput> {
    let Some(intent) = parse_command(raw) else {
        return Ok(failure!("Say something, or try /help."));
    };

    let spec = find_command(&intent.key).ok_or_else(|| CommandError::UnknownCommand(intent.key.clone()))?;
    if spec.privileged && !ctx.registry.config.dev_mode {
        return Err(CommandError::PermissionDenied);
    }
    let args = validate(spec.params, &intent, &ctx.registry.catalog, &spec.usage())?;

    let user_id = if spec.in_world {
        let user_id = ctx.user_id()?;
        ctx.registry.cooldowns.cleanup_user(user_id);
        Some(user_id)
    } else {
        None
    };
    tracing::debug!(command = spec.key, user_id = ?user_id, "dispatching command");

    let Some(user_id) = user_id else {
        return match spec.kind {
            CommandKind::Who => who::who(ctx).await,
            _ => Ok(success!(help_text(ctx.registry.config.dev_mode))),
        };
    };

    run(spec.kind, ctx, user_id, args).await
}

async fn run(kind: CommandKind, ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    match kind {
        CommandKind::Help => Ok(success!(help_text(ctx.registry.config.dev_mode))),
        CommandKind::Who => who::who(ctx).await,
        CommandKind::Look => look::look(ctx, user_id).await,
        CommandKind::Move => go::go(ctx, user_id, args).await,
        CommandKind::Inventory => inventory::inventory(ctx, user_id).await,
        CommandKind::Equip => inventory::equip(ctx, user_id, args, true).await,
        CommandKind::Unequip => inventory::equip(ctx, user_id, args, false).await,
        CommandKind::Drop => drop::drop(ctx, user_id, args).await,
        CommandKind::Pickup => pickup::pickup(ctx, user_id, args).await,
        CommandKind::GiveItem => giveitem::giveitem(ctx, user_id, args).await,
        CommandKind::Heal => heal::heal(ctx, user_id, args).await,
        CommandKind::Travel => travel::travel(ctx, user_id, args).await,
        CommandKind::Shop => shop::shop(ctx, user_id, args).await,
        CommandKind::Hide => skills::hide(ctx, user_id).await,
        CommandKind::Search => skills::search(ctx, user_id, args).await,
        CommandKind::Aim => aim::aim(ctx, user_id, args).await,
        CommandKind::Global => chat::global(ctx, user_id, args).await,
        CommandKind::Say => chat::say(ctx, user_id, args).await,
        CommandKind::Whisper => chat::whisper(ctx, user_id, args).await,
        CommandKind::Balance => bank::balance(ctx, user_id).await,
        CommandKind::Deposit => bank::transfer(ctx, user_id, args, bank::Transfer::Deposit).await,
        CommandKind::Withdraw => bank::transfer(ctx, user_id, args, bank::Transfer::Withdraw).await,
    }
}

pub fn help_text(dev_mode: bool) -> String {
    let rows: Vec<(String, &str)> = COMMANDS
        .iter()
        .filter(|c| dev_mode || !c.privileged)
        .map(|c| {
            let mut usage = c.usage();
            for alias in c.aliases {
                usage.push_str(&format!(" | /{alias}"));
            }
            (usage, c.help)
        })
        .collect();
    let width = rows.iter().map(|(u, _)| u.len()).max().unwrap_or(0);

    let mut out = String::from("Available commands\n------------------\n");
    for (usage, help) in rows {
        out.push_str(&format!("  {usage:<width$}  {help}\n"));
    }
    out.push_str("Anything not starting with / is said out loud.\n");
    out
}
