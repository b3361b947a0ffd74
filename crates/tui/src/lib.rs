pub mod profile_flow;
pub mod prompt;
pub mod render;
pub mod selector;
pub mod terminal;

pub use profile_flow::{choose_profile, FlowError, StartupProfile};
pub use selector::Selector;
pub use terminal::{CrosstermDriver, Key, TerminalDriver};

