//! Wrapper around `tracing_subscriber` for logging.
//!
//! Configures application-wide logging to go to stderr at the `INFO` level.
//! Set `RUST_LOG=rwf_render=debug` to see templates being compiled, `trace` to see cache hits.
//! If you prefer to use your own logging subscriber, don't initialize the `Logger`.
//!
//! ### Example
//!
//! ```rust
//! use rwf_render::prelude::*;
//!
//! Logger::init();
//! ```
use once_cell::sync::OnceCell;
use tracing_subscriber::{filter::LevelFilter, fmt, util::SubscriberInitExt, EnvFilter};

use std::io::IsTerminal;

use crate::config::RenderConfig;

static INITIALIZED: OnceCell<()> = OnceCell::new();

pub struct Logger;

impl Logger {
    /// Configure logging application-wide.
    ///
    /// Calling this multiple times is safe. Logger will be initialized only once.
    pub fn init() {
        INITIALIZED.get_or_init(setup_logging);
    }

    /// Configure logging and log the render configuration.
    pub fn init_with(config: &RenderConfig) {
        Self::init();
        config.log_info();
    }
}

fn setup_logging() {
    // Another subscriber may already be installed, e.g. by the application's tests.
    let _ = fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_file(false)
        .with_target(false)
        .finish()
        .try_init();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{AppEnv, RenderSettings};

    #[test]
    fn test_init_twice() -> Result<(), crate::Error> {
        let config = RenderSettings::new().build(&AppEnv::new("/app"))?;

        Logger::init();
        Logger::init_with(&config);

        Ok(())
    }
}
