pub mod server;

use crate::config::Config;

/// Actions the CLI can dispatch to.
#[derive(Debug)]
pub enum Action {
    Server { config: Box<Config> },
}
