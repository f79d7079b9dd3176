//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{button_press, incoming_message, is_private_press, HandlerDeps, HandlerError};
use crate::core::error::AppError;
use crate::relay::RelayError;
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and can be used in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

/// Rejected callback data is expected noise; anything else goes to the
/// dispatcher's error handler.
fn outcome(what: &str, from: i64, result: Result<(), RelayError>) -> Result<(), HandlerError> {
    match result {
        Ok(()) => Ok(()),
        Err(RelayError::Token(e)) => {
            log::warn!("{} from {}: {}", what, from, e);
            Ok(())
        }
        Err(e) => {
            log::error!("{} from {} failed: {}", what, from, e);
            Err(Box::new(AppError::from(e)))
        }
    }
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(dptree::entry().filter_command::<Command>().endpoint(
            move |msg: Message, cmd: Command| {
                let deps = deps.clone();
                async move {
                    let Some(incoming) = incoming_message(&msg) else {
                        return Ok(());
                    };
                    log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                    let relay = &deps.relay;
                    let result = match &cmd {
                        Command::Start(arg) => relay.start(&incoming, Command::start_argument(arg)).await,
                        Command::Info => relay.info(&incoming).await,
                        Command::Link => relay.link(&incoming).await,
                        Command::Username => relay.manage_handle(&incoming).await,
                    };
                    outcome("Command", incoming.from, result)
                }
            },
        ))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let Some(incoming) = incoming_message(&msg) else {
                    return Ok(());
                };
                let result = deps.relay.text(&incoming).await;
                outcome("Message", incoming.from, result)
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query()
        .filter(|q: CallbackQuery| is_private_press(&q))
        .endpoint(move |q: CallbackQuery| {
            let deps = deps.clone();
            async move {
                let Some(press) = button_press(&q) else {
                    return Ok(());
                };
                let result = deps.relay.press(&press).await;
                outcome("Callback", press.from, result)
            }
        })
}
