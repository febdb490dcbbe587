pub mod chat_ws;
pub mod context;
pub mod router;
pub mod translate_ws;
pub mod twiml;

pub use router::create_router;
