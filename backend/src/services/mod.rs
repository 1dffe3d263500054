pub mod chat_service;
pub mod conversation_service;
pub mod email_service;
pub mod entitlements;
pub mod message_service;
pub mod settings_service;
