mod settings;

pub use settings::{default_log_path, Config, Settings, UiSettings};
