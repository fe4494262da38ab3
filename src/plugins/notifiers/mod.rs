pub mod discord;
pub mod log;
pub mod slack;

pub use discord::DiscordNotifier;
pub use log::LogNotifier;
pub use slack::SlackNotifier;
