//! User-facing strings

pub const WELCOME: &str = "Welcome! Use /link command to get your link!";
pub const INFO: &str = "Anonymous relay bot.\n\nShare your /link, receive anonymous messages, open them and reply without revealing who you are.\n\nManage your handle with /username.";

pub const RECIPIENT_NOT_FOUND: &str = "User not found! Wrong link?";
pub const SELF_ADDRESS: &str = "Do you really want to talk to yourself? So sad! Share your link with someone else instead.";
pub const PARTNER_NOT_FOUND: &str = "Could not find this conversation partner.";
pub const MALFORMED_CALLBACK: &str = "This button is no longer valid.";
pub const CONCURRENT_UPDATE: &str = "Something changed in the meantime, please try again.";
pub const UNKNOWN_COMMAND: &str = "Error: Unknown Command";

pub const MESSAGE_SENT: &str = "Message sent";
pub const MESSAGE_SEEN: &str = "Your message has been seen";
pub const NEW_MESSAGE: &str = "You have a new message.";
pub const NEW_REPLY: &str = "New reply to your message.";
pub const OPEN_BUTTON: &str = "Open Message";
pub const REPLY_BUTTON: &str = "Reply";
pub const OPENED_ANSWER: &str = "Message opened!";
pub const REPLYING_ANSWER: &str = "Replying to message...";
pub const REPLY_PROMPT: &str = "Reply to this message:";
pub const SEEN_REACTION: &str = "👀";

pub const NO_HANDLE: &str = "You don't have a username!";
pub const SET_HANDLE_BUTTON: &str = "Set one";
pub const CHANGE_HANDLE_BUTTON: &str = "Change";
pub const REMOVE_HANDLE_BUTTON: &str = "Remove";
pub const CANCEL_BUTTON: &str = "Cancel";
pub const HANDLE_RULES_PROMPT: &str = "Create a username that starts with a letter, includes 3-20 characters, and may contain letters, numbers, or underscores (_). Usernames are automatically converted to lowercase.\n\nEnter new username:";
pub const SETTING_HANDLE_ANSWER: &str = "Setting username...";
pub const HANDLE_INVALID: &str = "The entered username is not valid. Enter another one:";
pub const HANDLE_TAKEN: &str = "The entered username exists. Enter another one:";
pub const HANDLE_ALREADY_YOURS: &str = "You already own this username silly! If you want to change it, run the /username command once more!";
pub const HANDLE_REMOVED: &str = "Username has been removed!";
pub const HANDLE_REMOVED_ANSWER: &str = "Username removed!";
pub const CANCEL_ANSWER: &str = "Never mind!";

pub fn recipient_prompt(display_name: &str) -> String {
    format!("You are sending message to:\n{}\n\nEnter your message:", display_name)
}

pub fn current_handle(handle: &str) -> String {
    format!("Your current username is: {}", handle)
}

pub fn handle_set(handle: &str) -> String {
    format!("Username has been set: {}", handle)
}

pub fn links(links: &[String]) -> String {
    links.join("\n\nor:\n\n")
}
