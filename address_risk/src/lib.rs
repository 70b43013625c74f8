pub mod engine_setup;
pub mod request_io;
pub mod signals;
pub mod vision_response;
