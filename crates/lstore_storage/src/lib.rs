//! # lstore Storage
//!
//! Directory and file API used by the lstore journal.
//!
//! The journal never talks to `std::fs` directly. Every component that needs
//! to list a directory, pre-allocate a file or move a file between pools does
//! so through a [`FileSystem`] handle, which lets tests swap the operating
//! system for an in-memory tree.
//!
//! ## Design Principles
//!
//! - Backends move bytes and directory entries, nothing more
//! - No knowledge of journal record formats or pool layouts
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`OsFileSystem`] - Real files through the OS file APIs
//! - [`InMemoryFileSystem`] - For testing
//!
//! ## Example
//!
//! ```rust
//! use lstore_storage::{FileSystem, InMemoryFileSystem};
//! use std::path::Path;
//!
//! let fs = InMemoryFileSystem::new();
//! fs.create_dir_all(Path::new("/store/efp")).unwrap();
//! fs.create_file(Path::new("/store/efp/a.jrnl"), 16).unwrap();
//! assert_eq!(fs.file_len(Path::new("/store/efp/a.jrnl")).unwrap(), 16);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod fs;
mod memory;
mod os;

pub use error::{StorageError, StorageResult};
pub use fs::{DirEntry, FileSystem};
pub use memory::InMemoryFileSystem;
pub use os::OsFileSystem;
