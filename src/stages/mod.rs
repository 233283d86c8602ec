//! Pipeline stages
//!
//! Each stage is a plain async function over the shared configuration. The
//! only value passed between stages is the [`ScratchLocation`] from the
//! fetcher to the cleaner; every other stage recomputes paths, keys and
//! table names from the config.

mod clean;
mod fetch;
mod materialize;
mod register;
mod stage;

pub use clean::{clean, clean_file, CleanReport};
pub use fetch::{fetch, FetchedFile, ScratchLocation};
pub use materialize::{materialization, materialize};
pub use register::{external_definition, register};
pub use stage::{stage, StagedObject};
