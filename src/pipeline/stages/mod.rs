// src/pipeline/stages/mod.rs

//! Built-in stage adapters.

pub mod command;
pub mod include;
pub mod js_lexer;
pub mod lint;
pub mod minify;
pub mod text;

pub use command::CommandStage;
pub use include::IncludeStage;
pub use lint::LintJsStage;
pub use minify::{MinifyCssStage, MinifyJsStage};
pub use text::{InjectStage, RenameStage};
