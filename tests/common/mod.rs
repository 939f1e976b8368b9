//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Path to the compiled binary
pub fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_biblatex2bibtex"))
}

/// A scratch directory holding sources, a tool configuration and the output.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        ws.write("biblatex2bibtex.conf", b"<config/>");
        ws
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn config(&self) -> PathBuf {
        self.path("biblatex2bibtex.conf")
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }
}

/// Writes an executable stand-in for biber that leaves its input untouched
/// and writes the `.blg` log biber would leave next to it.
#[cfg(unix)]
pub fn fake_biber(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-biber");
    fs::write(
        &path,
        "#!/bin/sh\n\
         for arg in \"$@\"; do input=\"$arg\"; done\n\
         echo 'INFO - This is a fake biber' > \"$input.blg\"\n\
         exit 0\n",
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Two small biblatex sources: three entries in total.
pub const FIRST_BIB: &str = r#"@article{smith2020,
  author = {Smith, John},
  title = {On {Rust} Ownership},
  journaltitle = {Journal of Systems},
  pages = {12--34},
  date = {2020},
}

@collection{ed2019,
  editor = {Doe, Jane},
  title = {Edited Volume},
}
"#;

pub const SECOND_BIB: &str = r#"@book{roe1995,
  booktitle = {Collected Essays},
  year = {1990-1995},
}
"#;
