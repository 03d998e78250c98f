//! Mail gateway: the seam between the engine and a real OAuth2 mailbox
//! provider. `Send`/`List`/`Fetch`/`Profile`.

pub mod error;
pub mod gateway;
pub mod mime;

pub use error::MailError;
pub use gateway::{
    HttpMailGateway, MailGateway, MailboxProfile, MessageDetail, MessageSummary, OutboundMessage,
    SentMessage,
};
