//! Mutable directory tree built at load time, immutable afterwards.
//!
//! Children are kept in insertion order and deduplicated first-wins: adding
//! a file or directory under a name that already exists returns the existing
//! child untouched.

use crate::name;
use crate::node::FileNode;

/// A directory node: a single path component plus ordered children.
#[derive(Debug, Default)]
pub struct Dir {
    name: String,
    files: Vec<FileNode>,
    dirs: Vec<Dir>,
}

impl Dir {
    pub fn new(name: impl Into<String>) -> Dir {
        Dir {
            name: name.into(),
            files: Vec::new(),
            dirs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn files(&self) -> &[FileNode] {
        &self.files
    }

    pub fn dirs(&self) -> &[Dir] {
        &self.dirs
    }

    pub fn find_file(&self, name: &str) -> Option<&FileNode> {
        self.files.iter().find(|f| f.name() == name)
    }

    pub fn find_dir(&self, name: &str) -> Option<&Dir> {
        self.dirs.iter().find(|d| d.name() == name)
    }

    /// Append `file` unless a child file of the same name exists; returns the
    /// child stored under that name.
    pub fn add_file(&mut self, file: FileNode) -> &FileNode {
        let index = match self.files.iter().position(|f| f.name() == file.name()) {
            Some(existing) => existing,
            None => {
                self.files.push(file);
                self.files.len() - 1
            }
        };
        &self.files[index]
    }

    /// Append `dir` unless a child directory of the same name exists; no
    /// merging takes place.
    pub fn add_dir(&mut self, dir: Dir) -> &mut Dir {
        let index = match self.dirs.iter().position(|d| d.name() == dir.name()) {
            Some(existing) => existing,
            None => {
                self.dirs.push(dir);
                self.dirs.len() - 1
            }
        };
        &mut self.dirs[index]
    }

    /// Find the child directory called `name`, creating an empty one if
    /// missing.
    pub fn add_empty_dir(&mut self, name: &str) -> &mut Dir {
        let index = match self.dirs.iter().position(|d| d.name() == name) {
            Some(existing) => existing,
            None => {
                self.dirs.push(Dir::new(name));
                self.dirs.len() - 1
            }
        };
        &mut self.dirs[index]
    }
}

/// Walk `path` as `/`-separated components from `root`, creating missing
/// directories, and return the deepest one. `""` and `"."` name the root.
pub fn recursive_add_dir<'a>(root: &'a mut Dir, path: &str) -> &'a mut Dir {
    if path.is_empty() || path == "." {
        return root;
    }
    let mut current = root;
    for comp in path.split('/') {
        if comp.is_empty() {
            break;
        }
        current = current.add_empty_dir(comp);
    }
    current
}

/// Resolve `path` to a directory, or `None` on the first missing component.
pub fn recursive_find_dir<'a>(root: &'a Dir, path: &str) -> Option<&'a Dir> {
    if path == root.name() || path == "." {
        return Some(root);
    }
    let mut current = root;
    for comp in path.split('/') {
        current = current.find_dir(comp)?;
    }
    Some(current)
}

/// Resolve `path` to a file: find the parent directory, then the base name.
pub fn recursive_find_file<'a>(root: &'a Dir, path: &str) -> Option<&'a FileNode> {
    let parent = recursive_find_dir(root, name::parent_of(path))?;
    parent.find_file(name::base_of(path))
}
