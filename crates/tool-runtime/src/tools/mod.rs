//! Built-in tool implementations served by the tool executor.
//!
//! - `browse_folder`: directory tree plus numbered source files
//! - `combine_path_dictionary`: concatenate numbered files into one artifact
//! - `checkout_git_repo`: clone a remote repository into scratch space
//! - `server_status`: liveness acknowledgement

pub mod checkout_git_repo;
pub mod combine_path_dictionary;
pub mod browse_folder;
pub mod server_status;
mod symbols;

pub use browse_folder::{scan_directory, BrowseFolderTool, ScanOutput};
pub use checkout_git_repo::{clone_repository, CheckoutGitRepoTool};
pub use combine_path_dictionary::{combine_files, CombineOutput, CombinePathDictionaryTool};
pub use server_status::ServerStatusTool;
