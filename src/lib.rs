//! Rubigene - ruby-gloss subtitles for English learners
//!
//! Reads SRT subtitles, picks out words that are hard for a learner at the
//! configured level, looks up a short gloss for each one through a cached
//! translation service and writes ASS subtitles carrying `r{word|gloss}`
//! ruby markup.

pub mod cli;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod file_utils;
pub mod pipeline;
pub mod ruby;
pub mod setup;
pub mod subtitle;
pub mod tokenize;
pub mod translate;
pub mod workflow;
