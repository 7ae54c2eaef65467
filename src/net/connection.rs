//! Per-connection message handling, independent of the transport that carries the frames.

use crate::Registry;
use crate::commands::{CmdCtx, process_command};
use crate::error::{DomainError, ErrorKind};
use crate::events;
use crate::models::types::UserId;
use crate::net::output::OutputHandle;
use crate::net::protocol::{self, Inbound};
use std::sync::Arc;

/// Register a fresh connection and build its command context.
pub fn attach(registry: Arc<Registry>, output: OutputHandle) -> Arc<CmdCtx> {
    registry.broadcaster.register_connection(output.clone());
    tracing::debug!(conn_id = %output.conn_id(), "connection attached");
    Arc::new(CmdCtx::new(registry, output))
}

/// Handle one inbound text frame to completion.
pub async fn handle_message(ctx: &Arc<CmdCtx>, text: &str) {
    let conn_id = ctx.output.conn_id();
    let msg = match protocol::decode(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "discarding inbound message");
            return;
        }
    };

    match msg {
        Inbound::Auth { user_id, name } => auth(ctx, user_id, &name).await,
        Inbound::Command(raw) => match process_command(&raw, ctx.clone()).await {
            Ok(out) if out.message.is_empty() => {}
            Ok(out) if out.is_error => {
                ctx.output.error(out.message);
            }
            Ok(out) => {
                ctx.output.system(out.message);
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "command rejected");
                ctx.output.error(e.player_message());
            }
        },
        Inbound::ShopBuy { shop, index, item } => {
            let Ok(user_id) = ctx.user_id() else {
                ctx.output.error(DomainError::NotLoggedIn.player_message());
                return;
            };
            match ctx.registry.services.shop.buy(user_id, &shop, index, &item).await {
                Ok(r) => {
                    ctx.output
                        .system(format!("You buy {} x {} for ${}.", r.quantity, r.item, r.price));
                }
                Err(e) => reject(ctx, "buy", e),
            }
        }
        Inbound::ShopSell { shop, slot, amount } => {
            let Ok(user_id) = ctx.user_id() else {
                ctx.output.error(DomainError::NotLoggedIn.player_message());
                return;
            };
            match ctx.registry.services.shop.sell(user_id, &shop, slot, amount).await {
                Ok(r) => {
                    ctx.output
                        .system(format!("You sell {} x {} for ${}.", r.quantity, r.item, r.price));
                }
                Err(e) => reject(ctx, "sell", e),
            }
        }
        Inbound::Logout => logout(ctx).await,
    }
}

async fn auth(ctx: &Arc<CmdCtx>, user_id: UserId, name: &str) {
    let conn_id = ctx.output.conn_id();
    let bound = ctx.sess.read().user_id();
    if let Some(current) = bound.filter(|u| *u != user_id) {
        tracing::debug!(%conn_id, %current, requested = %user_id, "auth for a different user on a bound connection");
        ctx.output.error("This connection is already logged in.");
        return;
    }

    match ctx.registry.services.character.login(conn_id, user_id, name).await {
        Ok(_) => {
            ctx.sess.write().login(user_id);
        }
        Err(DomainError::AlreadyTaken(name)) => {
            ctx.output.send(events::auth_taken(&name));
        }
        Err(e) => reject(ctx, "auth", e),
    }
}

async fn logout(ctx: &Arc<CmdCtx>) {
    let Ok(user_id) = ctx.user_id() else {
        ctx.output.error(DomainError::NotLoggedIn.player_message());
        return;
    };
    let saved = ctx.registry.services.character.logout(user_id).await;
    ctx.registry.broadcaster.unbind_user(user_id, ctx.output.conn_id());
    ctx.sess.write().logout();
    match saved {
        Ok(()) => {
            ctx.output.send(events::auth_logout());
        }
        Err(e) => reject(ctx, "logout", e),
    }
}

fn reject(ctx: &CmdCtx, op: &'static str, e: DomainError) {
    let conn_id = ctx.output.conn_id();
    match e.kind() {
        ErrorKind::External => tracing::error!(%conn_id, op, error = %e, "request failed"),
        _ => tracing::debug!(%conn_id, op, error = %e, "request rejected"),
    }
    ctx.output.error(e.player_message());
}

/// The transport is gone. A user still bound to this connection is logged out; one that moved to
/// another connection stays online.
pub async fn cleanup(ctx: &Arc<CmdCtx>) {
    let conn_id = ctx.output.conn_id();
    let user_id = ctx.sess.write().logout();
    if let Some(user_id) = user_id.filter(|u| ctx.registry.broadcaster.is_bound(*u, conn_id)) {
        if let Err(e) = ctx.registry.services.character.logout(user_id).await {
            tracing::error!(%user_id, %conn_id, error = %e, "logout on disconnect failed");
        }
        ctx.registry.broadcaster.unbind_user(user_id, conn_id);
    }
    ctx.registry.broadcaster.unregister_connection(conn_id);
    tracing::debug!(%conn_id, "connection detached");
}
