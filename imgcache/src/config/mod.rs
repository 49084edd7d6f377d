//! Configuration: defaults, INI config file, and size parsing.

mod defaults;
mod file;
mod size;

pub use defaults::*;
pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    DownloadSettings, LoggingSettings,
};
pub use size::{format_size, parse_size, Size, SizeParseError};
