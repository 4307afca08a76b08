pub mod mediator;
pub mod message;

pub use mediator::{Listener, Mediator, Subscription};
pub use message::{BusMessage, Notice, NoticeLevel, Topic};
