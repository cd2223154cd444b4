//! Shared UI icons and emojis.
//!
//! Common emoji constants used across the UI components for consistent
//! visual styling, with plain-text fallbacks for dumb terminals.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">>");

// File indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "");

// Pipeline indicators
pub static STEP: Emoji<'_, '_> = Emoji("📝 ", "*");
