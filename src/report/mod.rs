//! Obsidian note rendering.

pub mod generator;

pub use generator::{render_note, sanitize_filename, NoteOptions};
