//! Bugmine core library: builds a per-method defect dataset for one project.
//!
//! The pipeline resolves the project's versions against release tags, extracts
//! every Java method of every version, links fixed tickets to their fix
//! commits, estimates missing injected versions with the proportion method
//! and labels each method of each version as buggy or clean. The result is
//! stored in SQLite and can be exported as JSON. With the `python` feature
//! the crate is also compiled as the `_bugmine_core` extension module.

pub mod config;
pub mod errors;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod tracker;
pub mod vcs;

#[cfg(feature = "python")]
mod python;
#[cfg(test)]
mod testing;

use config::MinerConfig;
use errors::MinerResult;
use models::Dataset;
use store::DatasetStore;

/// Mine the configured project and replace its rows in the configured database.
pub fn mine_and_store(config: &MinerConfig) -> MinerResult<Dataset> {
    let dataset = pipeline::mine_with_config(config)?;
    let store = DatasetStore::open(&config.output.database)?;
    store.init_schema()?;
    store.save_dataset(&dataset)?;
    Ok(dataset)
}
