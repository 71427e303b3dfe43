// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Vitrina platform.
//!
//! Provides layered configuration (compiled defaults, `vitrina.toml`,
//! environment keys) with strict `deny_unknown_fields` parsing and a
//! single-pass required-key validation honoring `RELAX_ENV`.
//!
//! # Usage
//!
//! ```no_run
//! let (config, _relaxed) = match vitrina_config::load_and_validate() {
//!     Ok(loaded) => loaded,
//!     Err(issues) => {
//!         vitrina_config::render_issues(&issues);
//!         std::process::exit(1);
//!     }
//! };
//! println!("listening on port {:?}", config.http.port);
//! ```

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::VitrinaConfig;
pub use validation::{validate_config, ConfigIssue};

/// Load configuration from the standard locations and validate it.
///
/// On success, returns the config together with the (possibly empty) list of
/// relaxed issues that should be logged as warnings. On failure, returns the
/// full issue list for rendering before exit.
pub fn load_and_validate() -> Result<(VitrinaConfig, Vec<ConfigIssue>), Vec<ConfigIssue>> {
    let config = loader::load_config().map_err(|e| {
        vec![ConfigIssue {
            env_key: "CONFIG",
            message: e.to_string(),
        }]
    })?;
    let relaxed = validation::validate_config(&config)?;
    Ok((config, relaxed))
}

/// Render configuration issues to stderr, one per line.
pub fn render_issues(issues: &[ConfigIssue]) {
    eprintln!("vitrina: configuration errors:");
    for issue in issues {
        eprintln!("  - {issue}");
    }
}
