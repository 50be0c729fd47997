//! Remote access to the device's file system.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use serde_json::{Map, Value};

use crate::runtime::{CommandHandler, JsonObject};

const FILE_NOT_FOUND: &str = "File not found";

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// The device's flash file system. Paths are absolute.
///
/// The file commands share one store; `Rc<RefCell<S>>` implements this trait
/// so the application can hand a clone to each of them.
pub trait FileStore {
    /// Lists the entries of the directory at `path`.
    fn list(&mut self, path: &str) -> Vec<FileEntry>;

    /// Reads a whole file, or `None` if it cannot be opened.
    fn read(&mut self, path: &str) -> Option<String>;

    /// Replaces the contents of a file, creating it if needed. Returns the
    /// number of bytes written, or `None` if the file cannot be opened.
    fn write(&mut self, path: &str, contents: &str) -> Option<usize>;

    /// Deletes a file. Returns `false` if there was nothing to delete.
    fn remove(&mut self, path: &str) -> bool;
}

impl<S: FileStore + ?Sized> FileStore for Rc<RefCell<S>> {
    fn list(&mut self, path: &str) -> Vec<FileEntry> {
        self.borrow_mut().list(path)
    }

    fn read(&mut self, path: &str) -> Option<String> {
        self.borrow_mut().read(path)
    }

    fn write(&mut self, path: &str, contents: &str) -> Option<usize> {
        self.borrow_mut().write(path, contents)
    }

    fn remove(&mut self, path: &str) -> bool {
        self.borrow_mut().remove(path)
    }
}

impl<S: FileStore + ?Sized> FileStore for &mut S {
    fn list(&mut self, path: &str) -> Vec<FileEntry> {
        (**self).list(path)
    }

    fn read(&mut self, path: &str) -> Option<String> {
        (**self).read(path)
    }

    fn write(&mut self, path: &str, contents: &str) -> Option<usize> {
        (**self).write(path, contents)
    }

    fn remove(&mut self, path: &str) -> bool {
        (**self).remove(path)
    }
}

/// The request's `path`, made absolute.
fn request_path(request: &JsonObject) -> String {
    let path = request.get("path").and_then(Value::as_str).unwrap_or_default();
    if path.starts_with('/') {
        String::from(path)
    } else {
        format!("/{}", path)
    }
}

/// Lists the root directory under `files`, with `name`, `size` and `type`
/// (`"dir"` or `"file"`) for every entry.
pub struct FileListCommand<S: FileStore> {
    store: S,
}

impl<S: FileStore> FileListCommand<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: FileStore> CommandHandler for FileListCommand<S> {
    fn handle(&mut self, _request: &JsonObject, response: &mut JsonObject) {
        let files = self
            .store
            .list("/")
            .into_iter()
            .map(|entry| {
                let mut file = Map::new();
                file.insert("name".into(), Value::from(entry.name));
                file.insert("size".into(), Value::from(entry.size));
                file.insert(
                    "type".into(),
                    Value::from(if entry.is_dir { "dir" } else { "file" }),
                );
                Value::Object(file)
            })
            .collect();
        response.insert("files".into(), Value::Array(files));
    }
}

/// Responds with the `size` and `contents` of the file at `path`.
pub struct FileReadCommand<S: FileStore> {
    store: S,
}

impl<S: FileStore> FileReadCommand<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: FileStore> CommandHandler for FileReadCommand<S> {
    fn handle(&mut self, request: &JsonObject, response: &mut JsonObject) {
        let path = request_path(request);
        debug!("Reading {}", path);
        let contents = self.store.read(&path);
        response.insert("path".into(), Value::from(path));
        match contents {
            Some(contents) => {
                response.insert("size".into(), Value::from(contents.len()));
                response.insert("contents".into(), Value::from(contents));
            }
            None => {
                response.insert("error".into(), Value::from(FILE_NOT_FOUND));
            }
        }
    }
}

/// Writes `contents` to the file at `path` and responds with the number of
/// bytes `written`.
pub struct FileWriteCommand<S: FileStore> {
    store: S,
}

impl<S: FileStore> FileWriteCommand<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: FileStore> CommandHandler for FileWriteCommand<S> {
    fn handle(&mut self, request: &JsonObject, response: &mut JsonObject) {
        let path = request_path(request);
        debug!("Writing {}", path);
        let contents = request
            .get("contents")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let written = self.store.write(&path, contents);
        response.insert("path".into(), Value::from(path));
        match written {
            Some(written) => {
                response.insert("written".into(), Value::from(written));
            }
            None => {
                response.insert("error".into(), Value::from(FILE_NOT_FOUND));
            }
        }
    }
}

/// Deletes the file at `path`.
pub struct FileRemoveCommand<S: FileStore> {
    store: S,
}

impl<S: FileStore> FileRemoveCommand<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: FileStore> CommandHandler for FileRemoveCommand<S> {
    fn handle(&mut self, request: &JsonObject, response: &mut JsonObject) {
        let path = request_path(request);
        debug!("Removing {}", path);
        let removed = self.store.remove(&path);
        response.insert("path".into(), Value::from(path));
        if removed {
            response.insert("removed".into(), Value::Bool(true));
        } else {
            response.insert("error".into(), Value::from(FILE_NOT_FOUND));
        }
    }
}
