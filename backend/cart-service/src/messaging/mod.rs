pub mod consumer;
pub mod dead_letter;
pub mod handler;

pub use consumer::ProductUpdateConsumer;
pub use dead_letter::{DeadLetterOutcome, DeadLetterRouter, DESERIALIZATION_FAILED, REASON_HEADER};
pub use handler::{classify, CartItemSync, HandlerError, ProductUpdateHandler};
