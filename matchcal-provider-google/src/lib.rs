//! Google collaborators for matchcal: the Calendar v3 transport, the stored
//! OAuth session that feeds it tokens, and the Gemini event extractor.

pub mod app_config;
pub mod calendar;
pub mod gemini;
pub mod google_event;
pub mod session;

pub use calendar::GoogleCalendar;
pub use gemini::GeminiExtractor;
pub use session::{GoogleSession, SessionData};
